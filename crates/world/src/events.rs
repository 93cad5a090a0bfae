//! Change notifications published by the world for collaborators such as the
//! network layer. Authoritative and singleplayer worlds emit them; client
//! worlds consume them through `World::apply_remote_event`.

use serde::{Deserialize, Serialize};

use crate::block::PlacedBlock;
use crate::chunk::{ChunkCoord, LocalTile};
use crate::object::{ObjectId, StaticObject};
use crate::spawn::{CreatureId, SpawnedCreature};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    ObjectAdded {
        chunk: ChunkCoord,
        object: StaticObject,
    },
    ObjectRemoved {
        chunk: ChunkCoord,
        id: ObjectId,
    },
    ObjectUpdated {
        chunk: ChunkCoord,
        object: StaticObject,
    },
    BlockPlaced {
        chunk: ChunkCoord,
        block: PlacedBlock,
    },
    BlockRemoved {
        chunk: ChunkCoord,
        position: LocalTile,
    },
    CreatureSpawned(SpawnedCreature),
    CreatureDespawned(CreatureId),
    /// A client asks the server for a chunk it does not hold.
    ChunkRequested(ChunkCoord),
}

impl WorldEvent {
    /// Chunk the event concerns, if it is chunk-scoped.
    pub fn chunk(&self) -> Option<ChunkCoord> {
        match self {
            WorldEvent::ObjectAdded { chunk, .. }
            | WorldEvent::ObjectRemoved { chunk, .. }
            | WorldEvent::ObjectUpdated { chunk, .. }
            | WorldEvent::BlockPlaced { chunk, .. }
            | WorldEvent::BlockRemoved { chunk, .. } => Some(*chunk),
            WorldEvent::CreatureSpawned(creature) => Some(creature.chunk()),
            WorldEvent::ChunkRequested(coord) => Some(*coord),
            WorldEvent::CreatureDespawned(_) => None,
        }
    }

    /// Short label for logs and JSONL traces.
    pub fn kind(&self) -> &'static str {
        match self {
            WorldEvent::ObjectAdded { .. } => "object_added",
            WorldEvent::ObjectRemoved { .. } => "object_removed",
            WorldEvent::ObjectUpdated { .. } => "object_updated",
            WorldEvent::BlockPlaced { .. } => "block_placed",
            WorldEvent::BlockRemoved { .. } => "block_removed",
            WorldEvent::CreatureSpawned(_) => "creature_spawned",
            WorldEvent::CreatureDespawned(_) => "creature_despawned",
            WorldEvent::ChunkRequested(_) => "chunk_requested",
        }
    }
}
