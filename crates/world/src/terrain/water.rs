//! Pond masks and shoreline autotiling.

use crate::chunk::{ElevationBand, Grid, CHUNK_AREA};
use crate::noise::NoiseGenerator;
use crate::tile::{shore, Corner, EdgeDir, Side, TileCode};

/// Cells where pond water forms: eligible, ground level, noise above threshold.
pub fn pond_mask(
    origin: (i32, i32),
    noise: &NoiseGenerator,
    threshold: f64,
    bands: &Grid<ElevationBand>,
    eligible: &Grid<bool>,
    tiles: &Grid<TileCode>,
) -> Grid<bool> {
    let mut mask = Grid::filled(false);
    for (x, y, ok) in eligible.iter() {
        if !ok || bands.get(x, y) != 0 || tiles.get(x, y).is_water() {
            continue;
        }
        let wx = (origin.0 + x as i32) as f64;
        let wy = (origin.1 + y as i32) as f64;
        if noise.sample_unit(wx, wy) > threshold {
            mask.set(x, y, true);
        }
    }
    prune_mask(&mut mask);
    mask
}

fn masked_neighbours(mask: &Grid<bool>, x: usize, y: usize) -> usize {
    Side::ALL
        .iter()
        .filter(|side| {
            let (dx, dy) = side.offset();
            mask.get_signed(x as i32 + dx, y as i32 + dy) == Some(true)
        })
        .count()
}

/// Drop thin spurs and single cells until every cell has two masked neighbours.
fn prune_mask(mask: &mut Grid<bool>) {
    for _ in 0..CHUNK_AREA {
        let snapshot = mask.clone();
        let mut changed = false;
        for (x, y, set) in snapshot.iter() {
            if set && masked_neighbours(&snapshot, x, y) < 2 {
                mask.set(x, y, false);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Write pond interior and edge tiles for every masked cell.
/// Cells beyond the chunk border count as water.
pub fn autotile_ponds(tiles: &mut Grid<TileCode>, mask: &Grid<bool>) {
    for (x, y, set) in mask.iter() {
        if !set {
            continue;
        }
        let land = |dx: i32, dy: i32| mask.get_signed(x as i32 + dx, y as i32 + dy) == Some(false);
        let sides = Side::ALL.map(|side| {
            let (dx, dy) = side.offset();
            land(dx, dy)
        });
        let tile = match sides {
            [false, false, false, false] => Corner::ALL
                .into_iter()
                .find(|corner| {
                    let (dx, dy) = corner.offset();
                    land(dx, dy)
                })
                .map_or(TileCode::Pond, |corner| TileCode::PondEdge(corner.into())),
            [true, true, false, false] => TileCode::PondEdge(EdgeDir::NorthEast),
            [true, false, false, true] => TileCode::PondEdge(EdgeDir::NorthWest),
            [false, true, true, false] => TileCode::PondEdge(EdgeDir::SouthEast),
            [false, false, true, true] => TileCode::PondEdge(EdgeDir::SouthWest),
            _ => Side::ALL
                .into_iter()
                .zip(sides)
                .find(|&(_, is_land)| is_land)
                .map_or(TileCode::Pond, |(side, _)| TileCode::PondEdge(side.into())),
        };
        tiles.set(x, y, tile);
    }
}

/// Turn open water in eligible cells into shore tiles keyed by adjacent land.
/// Water boxed in on all four sides becomes sand.
pub fn autotile_shores(tiles: &mut Grid<TileCode>, eligible: &Grid<bool>, sand: TileCode) {
    let snapshot = tiles.clone();
    for (x, y, tile) in snapshot.iter() {
        if tile != TileCode::Water || !eligible.get(x, y) {
            continue;
        }
        let mut land_mask = 0u8;
        for (side, bit) in Side::ALL
            .into_iter()
            .zip([shore::NORTH, shore::EAST, shore::SOUTH, shore::WEST])
        {
            let (dx, dy) = side.offset();
            if snapshot
                .get_signed(x as i32 + dx, y as i32 + dy)
                .is_some_and(|n| !n.is_water())
            {
                land_mask |= bit;
            }
        }
        let replacement = match land_mask {
            0 => continue,
            shore::ALL => sand,
            mask => TileCode::Shore(mask),
        };
        tiles.set(x, y, replacement);
    }
}
