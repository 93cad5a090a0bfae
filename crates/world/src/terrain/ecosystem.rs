//! Local rewrite rules applied after base tile selection.

use tileworld_core::{domain, tile_hash, unit_f64};

use crate::biome::{BiomeId, BiomeTable};
use crate::chunk::Grid;
use crate::tile::{Side, TileCode};

const DECORATE_CHANCE: f64 = 0.08;
const SAND_TO_GRASS_CHANCE: f64 = 0.5;
const SHORE_REACH: i32 = 2;

/// Per-tile coin flip, stable across chunk borders.
fn coin(world_seed: u64, tile_x: i32, tile_y: i32, salt: u64) -> f64 {
    unit_f64(tile_hash(world_seed, tile_x, tile_y, domain::ECOSYSTEM ^ salt))
}

fn orthogonal(tiles: &Grid<TileCode>, x: usize, y: usize) -> impl Iterator<Item = TileCode> + '_ {
    Side::ALL.into_iter().filter_map(move |side| {
        let (dx, dy) = side.offset();
        tiles.get_signed(x as i32 + dx, y as i32 + dy)
    })
}

fn water_within(tiles: &Grid<TileCode>, x: usize, y: usize, reach: i32) -> bool {
    (-reach..=reach).any(|dy| {
        (-reach..=reach).any(|dx| {
            tiles
                .get_signed(x as i32 + dx, y as i32 + dy)
                .is_some_and(TileCode::is_water)
        })
    })
}

/// Apply the ecosystem rules in place:
/// grass surrounded by grass may sprout a decoration, and sand away from
/// water tends to grass over unless the biome is sandy by nature.
pub fn smooth(
    tiles: &mut Grid<TileCode>,
    biomes: &Grid<BiomeId>,
    table: &BiomeTable,
    world_seed: u64,
    origin: (i32, i32),
) -> usize {
    let snapshot = tiles.clone();
    let mut rewrites = 0;

    for (x, y, tile) in snapshot.iter() {
        let biome = table.get(biomes.get(x, y));
        let (wx, wy) = (origin.0 + x as i32, origin.1 + y as i32);

        if tile.is_grass() {
            let isolated = orthogonal(&snapshot, x, y).all(TileCode::is_grass);
            if !isolated || coin(world_seed, wx, wy, 1) >= DECORATE_CHANCE {
                continue;
            }
            let choices = biome.decorations();
            if choices.is_empty() {
                continue;
            }
            let pick = (coin(world_seed, wx, wy, 2) * choices.len() as f64) as usize;
            tiles.set(x, y, choices[pick.min(choices.len() - 1)]);
            rewrites += 1;
        } else if tile.is_sand() {
            if matches!(biome.id, BiomeId::Desert | BiomeId::Beach)
                || water_within(&snapshot, x, y, SHORE_REACH)
            {
                continue;
            }
            let grassy = orthogonal(&snapshot, x, y).filter(|t| t.is_grass()).count();
            if grassy >= 3 && coin(world_seed, wx, wy, 3) < SAND_TO_GRASS_CHANCE {
                tiles.set(x, y, biome.ground_tile());
                rewrites += 1;
            }
        }
    }
    rewrites
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sand_next_to_water_is_kept() {
        let table = BiomeTable::default();
        let biomes = Grid::filled(BiomeId::Plains);
        let mut tiles = Grid::filled(TileCode::Grass);
        tiles.set(5, 5, TileCode::Sand);
        tiles.set(6, 6, TileCode::Water);
        for seed in 0..50 {
            let mut copy = tiles.clone();
            smooth(&mut copy, &biomes, &table, seed, (0, 0));
            assert_eq!(copy.get(5, 5), TileCode::Sand);
        }
    }

    #[test]
    fn inland_sand_sometimes_grasses_over() {
        let table = BiomeTable::default();
        let biomes = Grid::filled(BiomeId::Plains);
        let mut converted = 0;
        for seed in 0..64 {
            let mut tiles = Grid::filled(TileCode::Grass);
            tiles.set(8, 8, TileCode::Sand);
            smooth(&mut tiles, &biomes, &table, seed, (0, 0));
            if tiles.get(8, 8) != TileCode::Sand {
                assert_eq!(tiles.get(8, 8), TileCode::Grass);
                converted += 1;
            }
        }
        assert!(converted > 0 && converted < 64);
    }

    #[test]
    fn decorations_come_from_the_biome() {
        let table = BiomeTable::default();
        let biomes = Grid::filled(BiomeId::Plains);
        let plains = table.get(BiomeId::Plains);
        let mut tiles = Grid::filled(TileCode::Grass);
        let rewrites = smooth(&mut tiles, &biomes, &table, 42, (0, 0));
        assert!(rewrites > 0);
        for (_, _, tile) in tiles.iter() {
            assert!(tile == TileCode::Grass || plains.allows(tile));
        }
    }

    #[test]
    fn rules_are_deterministic() {
        let table = BiomeTable::default();
        let biomes = Grid::filled(BiomeId::Forest);
        let mut a = Grid::filled(TileCode::ForestGrass);
        let mut b = a.clone();
        smooth(&mut a, &biomes, &table, 9, (32, -16));
        smooth(&mut b, &biomes, &table, 9, (32, -16));
        assert_eq!(a, b);
    }
}
