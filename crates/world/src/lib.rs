//! Procedural tile world: biomes, terrain, object placement, creature
//! spawning and chunk streaming.

mod biome;
mod block;
mod chunk;
mod config;
mod error;
mod events;
mod noise;
mod object;
mod persist;
mod placement;
mod spawn;
mod store;
mod streaming;
pub mod terrain;
mod tile;
mod time;
mod worker;
mod world;

pub use biome::*;
pub use block::*;
pub use chunk::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use self::noise::*;
pub use object::*;
pub use persist::*;
pub use placement::*;
pub use spawn::*;
pub use store::*;
pub use streaming::*;
pub use terrain::TerrainGenerator;
pub use tile::*;
pub use time::*;
pub use worker::*;
pub use world::*;
