//! Mountain elevation bands, smoothing and cliff autotiling.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::chunk::{ElevationBand, Grid, CHUNK_AREA, CHUNK_SIZE, MAX_BAND};
use crate::noise::ElevationNoise;
use crate::tile::{CliffCap, CliffPiece, Corner, Side, TileCode};

const SMOOTHING_ROUNDS: usize = 2;
const STAIR_CLEARANCE: i32 = 3;

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Roll how many mountain layers a chunk gets.
pub fn roll_layers<R: Rng>(mountain_chance: f32, rng: &mut R) -> u8 {
    if rng.gen::<f32>() >= mountain_chance {
        return 0;
    }
    match rng.gen::<f32>() {
        r if r < 0.6 => 1,
        r if r < 0.9 => 2,
        _ => 3,
    }
}

/// Elevation needed to reach `layer` when `layers` layers exist.
pub fn band_threshold(layer: u8, layers: u8) -> f64 {
    0.3 + (layer.saturating_sub(1)) as f64 * 0.45 / layers.max(1) as f64
}

/// Build the smoothed band grid for one chunk.
pub fn build_bands<R: Rng>(
    layers: u8,
    origin: (i32, i32),
    noise: &ElevationNoise,
    rng: &mut R,
) -> Grid<ElevationBand> {
    let layers = layers.min(MAX_BAND);
    let mut bands = Grid::filled(0);
    if layers == 0 {
        return bands;
    }

    let peak_count = rng.gen_range(1..=2);
    let peaks: Vec<(f64, f64)> = (0..peak_count)
        .map(|_| {
            let px = CHUNK_SIZE / 4 + rng.gen_range(0..CHUNK_SIZE / 2);
            let py = CHUNK_SIZE / 4 + rng.gen_range(0..CHUNK_SIZE / 2);
            (px as f64, py as f64)
        })
        .collect();
    let radius = 1.25 * CHUNK_SIZE as f64 * (0.3 + 0.1 * layers as f64);

    for y in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            let radial = peaks
                .iter()
                .map(|&(px, py)| {
                    let d = ((x as f64 - px).powi(2) + (y as f64 - py).powi(2)).sqrt();
                    (1.0 - d / radius).max(0.0)
                })
                .fold(0.0, f64::max);
            let wx = (origin.0 + x as i32) as f64;
            let wy = (origin.1 + y as i32) as f64;
            let elevation = (radial + noise.offset(wx, wy)).clamp(0.0, 1.0);
            let jitter = noise.jitter(wx, wy);
            let band = (1..=layers)
                .filter(|&k| elevation >= band_threshold(k, layers) + jitter)
                .count() as ElevationBand;
            bands.set(x, y, band);
        }
    }

    for _ in 0..SMOOTHING_ROUNDS {
        erode(&mut bands, layers, rng);
        cohere(&mut bands);
    }
    let demoted = remove_spikes(&mut bands);
    debug!(layers, peaks = peak_count, demoted, "Built elevation bands");
    bands
}

fn neighbour_counts(bands: &Grid<ElevationBand>, x: usize, y: usize) -> (usize, usize, usize) {
    let band = bands.get(x, y);
    let (mut lower, mut higher, mut same) = (0, 0, 0);
    for (dx, dy) in NEIGHBOURS {
        if let Some(n) = bands.get_signed(x as i32 + dx, y as i32 + dy) {
            match n.cmp(&band) {
                std::cmp::Ordering::Less => lower += 1,
                std::cmp::Ordering::Greater => higher += 1,
                std::cmp::Ordering::Equal => same += 1,
            }
        }
    }
    (lower, higher, same)
}

/// Demote exposed upper tiles, occasionally promote enclosed ones.
fn erode<R: Rng>(bands: &mut Grid<ElevationBand>, layers: u8, rng: &mut R) {
    let snapshot = bands.clone();
    for y in 1..CHUNK_SIZE - 1 {
        for x in 1..CHUNK_SIZE - 1 {
            let band = snapshot.get(x, y);
            if band == 0 {
                continue;
            }
            let (lower, higher, same) = neighbour_counts(&snapshot, x, y);
            if band > 1 && lower >= 6 {
                bands.set(x, y, band - 1);
            } else if band < layers && higher > lower + same && rng.gen::<f64>() < 0.1 {
                bands.set(x, y, band + 1);
            }
        }
    }
}

/// Demote upper tiles with too few same-band tiles around them.
fn cohere(bands: &mut Grid<ElevationBand>) {
    let snapshot = bands.clone();
    for y in 1..CHUNK_SIZE - 1 {
        for x in 1..CHUNK_SIZE - 1 {
            let band = snapshot.get(x, y);
            if band <= 1 {
                continue;
            }
            let (_, _, same) = neighbour_counts(&snapshot, x, y);
            if same + 1 < 4 {
                bands.set(x, y, band - 1);
            }
        }
    }
}

/// Demote band>=2 tiles with no orthogonal support until none remain.
/// Returns the number of demotions.
pub(crate) fn remove_spikes(bands: &mut Grid<ElevationBand>) -> usize {
    let mut demoted = 0;
    for _ in 0..=CHUNK_AREA * MAX_BAND as usize {
        let mut changed = false;
        for y in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let band = bands.get(x, y);
                if band >= 2 && !has_orthogonal_support(bands, x, y) {
                    bands.set(x, y, band - 1);
                    demoted += 1;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    demoted
}

pub(crate) fn has_orthogonal_support(bands: &Grid<ElevationBand>, x: usize, y: usize) -> bool {
    let band = bands.get(x, y);
    Side::ALL.iter().any(|side| {
        let (dx, dy) = side.offset();
        bands
            .get_signed(x as i32 + dx, y as i32 + dy)
            .is_some_and(|n| n >= band)
    })
}

/// Shape of a raised tile. `None` means a flat centre tile.
/// Neighbours outside the chunk count as lower.
pub fn classify(bands: &Grid<ElevationBand>, x: usize, y: usize) -> Option<CliffPiece> {
    let band = bands.get(x, y);
    let lower = |dx: i32, dy: i32| {
        bands
            .get_signed(x as i32 + dx, y as i32 + dy)
            .map_or(true, |n| n < band)
    };
    let drops = Side::ALL.map(|side| {
        let (dx, dy) = side.offset();
        lower(dx, dy)
    });

    match drops {
        [false, false, false, false] => Corner::ALL
            .into_iter()
            .find(|corner| {
                let (dx, dy) = corner.offset();
                lower(dx, dy)
            })
            .map(CliffPiece::InnerCorner),
        [true, true, false, false] => Some(CliffPiece::OuterCorner(Corner::NorthEast)),
        [true, false, false, true] => Some(CliffPiece::OuterCorner(Corner::NorthWest)),
        [false, true, true, false] => Some(CliffPiece::OuterCorner(Corner::SouthEast)),
        [false, false, true, true] => Some(CliffPiece::OuterCorner(Corner::SouthWest)),
        _ => Side::ALL
            .into_iter()
            .zip(drops)
            .find(|&(_, drop)| drop)
            .map(|(side, _)| CliffPiece::Edge(side)),
    }
}

/// Replace every raised tile with its mountain tile.
pub fn assign_tiles(tiles: &mut Grid<TileCode>, bands: &Grid<ElevationBand>) {
    for (x, y, band) in bands.iter() {
        if band == 0 {
            continue;
        }
        let tile = match classify(bands, x, y) {
            None => TileCode::MountainTop,
            Some(piece) => TileCode::Cliff {
                piece,
                cap: CliffCap::for_band(band),
            },
        };
        tiles.set(x, y, tile);
    }
}

fn stair_nearby(tiles: &Grid<TileCode>, x: usize, y: usize) -> bool {
    for dy in -STAIR_CLEARANCE..=STAIR_CLEARANCE {
        for dx in -STAIR_CLEARANCE..=STAIR_CLEARANCE {
            if tiles.get_signed(x as i32 + dx, y as i32 + dy) == Some(TileCode::Stairs) {
                return true;
            }
        }
    }
    false
}

/// Returns the exposed side when `(x, y)` can take a stair climbing to `to`.
fn stair_candidate(
    tiles: &Grid<TileCode>,
    bands: &Grid<ElevationBand>,
    x: usize,
    y: usize,
    to: ElevationBand,
) -> Option<Side> {
    if bands.get(x, y) != to {
        return None;
    }
    let TileCode::Cliff {
        piece: CliffPiece::Edge(side),
        ..
    } = tiles.get(x, y)
    else {
        return None;
    };
    let (dx, dy) = side.offset();
    let exposed = bands.get_signed(x as i32 + dx, y as i32 + dy)?;
    let inward = bands.get_signed(x as i32 - dx, y as i32 - dy)?;
    if exposed + 1 != to || inward != to || stair_nearby(tiles, x, y) {
        return None;
    }
    Some(side)
}

fn put_stair(tiles: &mut Grid<TileCode>, x: usize, y: usize, side: Side) {
    tiles.set(x, y, TileCode::Stairs);
    let (dx, dy) = side.opposite().offset();
    tiles.set(
        (x as i32 + dx) as usize,
        (y as i32 + dy) as usize,
        TileCode::MountainTop,
    );
}

fn side_line(side: Side) -> Vec<(usize, usize)> {
    let inner = 1..CHUNK_SIZE - 1;
    match side {
        Side::North => inner.map(|x| (x, CHUNK_SIZE - 2)).collect(),
        Side::South => inner.map(|x| (x, 1)).collect(),
        Side::East => inner.map(|y| (CHUNK_SIZE - 2, y)).collect(),
        Side::West => inner.map(|y| (1, y)).collect(),
    }
}

/// Cut stairs into the cliff faces between each adjacent band pair.
/// Returns the number of stairs placed.
pub fn place_stairs<R: Rng>(
    tiles: &mut Grid<TileCode>,
    bands: &Grid<ElevationBand>,
    rng: &mut R,
) -> usize {
    let top = bands.cells().iter().copied().max().unwrap_or(0);
    let mut placed = 0;

    for from in 0..top {
        let to = from + 1;
        let quota = if from == 0 { 4 } else { 2 };
        let mut count = 0;

        for side in Side::ALL {
            if count >= quota {
                break;
            }
            let mut line = side_line(side);
            line.shuffle(rng);
            for (x, y) in line {
                if let Some(exposed) = stair_candidate(tiles, bands, x, y, to) {
                    put_stair(tiles, x, y, exposed);
                    count += 1;
                    break;
                }
            }
        }

        if count < quota {
            let mut interior: Vec<(usize, usize)> = (1..CHUNK_SIZE - 1)
                .flat_map(|y| (1..CHUNK_SIZE - 1).map(move |x| (x, y)))
                .collect();
            interior.shuffle(rng);
            for (x, y) in interior {
                if count >= quota {
                    break;
                }
                if let Some(exposed) = stair_candidate(tiles, bands, x, y, to) {
                    put_stair(tiles, x, y, exposed);
                    count += 1;
                }
            }
        }

        if count == 0 {
            debug!(from, to, "No stair candidates for band pair");
        }
        placed += count;
    }
    placed
}

/// True when exactly one orthogonal neighbour is lower and the other three
/// sit on the same band. Neighbours outside the chunk count as lower.
fn is_straight_edge(bands: &Grid<ElevationBand>, x: usize, y: usize) -> bool {
    let band = bands.get(x, y);
    let mut lower = 0;
    for side in Side::ALL {
        let (dx, dy) = side.offset();
        match bands.get_signed(x as i32 + dx, y as i32 + dy) {
            Some(n) if n == band => {}
            Some(n) if n > band => return false,
            _ => lower += 1,
        }
    }
    lower == 1
}

/// Possibly turn one high straight cliff into a cave entrance.
pub fn place_cave<R: Rng>(
    tiles: &mut Grid<TileCode>,
    bands: &Grid<ElevationBand>,
    chance: f64,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if rng.gen::<f64>() >= chance {
        return None;
    }
    let candidates: Vec<(usize, usize)> = tiles
        .iter()
        .filter(|&(x, y, tile)| {
            bands.get(x, y) >= 2
                && matches!(
                    tile,
                    TileCode::Cliff {
                        piece: CliffPiece::Edge(_),
                        ..
                    }
                )
                && is_straight_edge(bands, x, y)
        })
        .map(|(x, y, _)| (x, y))
        .collect();
    let &(x, y) = candidates.choose(rng)?;
    tiles.set(x, y, TileCode::CaveEntrance);
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square(band: ElevationBand, min: usize, max: usize) -> Grid<ElevationBand> {
        let mut bands = Grid::filled(0);
        for y in min..=max {
            for x in min..=max {
                bands.set(x, y, band);
            }
        }
        bands
    }

    #[test]
    fn thresholds_rise_with_layer() {
        assert!((band_threshold(1, 3) - 0.3).abs() < 1e-12);
        assert!((band_threshold(2, 3) - 0.45).abs() < 1e-12);
        assert!((band_threshold(3, 3) - 0.6).abs() < 1e-12);
        assert!((band_threshold(2, 2) - 0.525).abs() < 1e-12);
    }

    #[test]
    fn layer_roll_respects_zero_chance() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(roll_layers(0.0, &mut rng), 0);
        }
        let rolled: Vec<u8> = (0..500).map(|_| roll_layers(1.0, &mut rng)).collect();
        assert!(rolled.iter().all(|&l| (1..=3).contains(&l)));
        assert!(rolled.contains(&1) && rolled.contains(&3));
    }

    #[test]
    fn classify_square_plateau() {
        let bands = square(1, 4, 8);
        assert_eq!(classify(&bands, 6, 6), None);
        assert_eq!(classify(&bands, 6, 8), Some(CliffPiece::Edge(Side::North)));
        assert_eq!(classify(&bands, 4, 6), Some(CliffPiece::Edge(Side::West)));
        assert_eq!(
            classify(&bands, 8, 8),
            Some(CliffPiece::OuterCorner(Corner::NorthEast))
        );
        assert_eq!(
            classify(&bands, 4, 4),
            Some(CliffPiece::OuterCorner(Corner::SouthWest))
        );
    }

    #[test]
    fn classify_inner_corner() {
        let mut bands = square(1, 2, 10);
        bands.set(10, 10, 0);
        assert_eq!(
            classify(&bands, 9, 9),
            Some(CliffPiece::InnerCorner(Corner::NorthEast))
        );
    }

    #[test]
    fn chunk_border_counts_as_lower() {
        let bands = Grid::filled(1);
        assert_eq!(classify(&bands, 5, 0), Some(CliffPiece::Edge(Side::South)));
        assert_eq!(classify(&bands, 5, 5), None);
    }

    #[test]
    fn spikes_are_removed() {
        let mut bands = Grid::filled(1);
        bands.set(5, 5, 3);
        bands.set(9, 9, 2);
        remove_spikes(&mut bands);
        assert_eq!(bands.get(5, 5), 1);
        assert_eq!(bands.get(9, 9), 1);
    }

    #[test]
    fn smoothing_leaves_no_unsupported_tiles() {
        let noise = ElevationNoise::new(5);
        for seed in 0..40u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let layers = (seed % 3) as u8 + 1;
            let bands = build_bands(layers, (seed as i32 * 16, 0), &noise, &mut rng);
            for (x, y, band) in bands.iter() {
                assert!(band <= layers);
                if band >= 2 {
                    assert!(
                        has_orthogonal_support(&bands, x, y),
                        "spike at ({}, {}) seed {}",
                        x,
                        y,
                        seed
                    );
                }
            }
        }
    }

    #[test]
    fn stairs_cut_plateau_edges() {
        let bands = square(1, 3, 12);
        let mut tiles = Grid::filled(TileCode::Grass);
        assign_tiles(&mut tiles, &bands);
        let mut rng = StdRng::seed_from_u64(9);
        let placed = place_stairs(&mut tiles, &bands, &mut rng);
        assert!(placed >= 1 && placed <= 4);

        let stairs: Vec<(usize, usize)> = tiles
            .iter()
            .filter(|(_, _, t)| *t == TileCode::Stairs)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(stairs.len(), placed);
        for &(x, y) in &stairs {
            assert_eq!(bands.get(x, y), 1);
            let touches_ground = Side::ALL.iter().any(|s| {
                let (dx, dy) = s.offset();
                bands.get_signed(x as i32 + dx, y as i32 + dy) == Some(0)
            });
            assert!(touches_ground);
            for &(ox, oy) in &stairs {
                if (ox, oy) != (x, y) {
                    let far = (ox as i32 - x as i32).abs() > STAIR_CLEARANCE
                        || (oy as i32 - y as i32).abs() > STAIR_CLEARANCE;
                    assert!(far, "stairs too close");
                }
            }
        }
    }

    #[test]
    fn cave_needs_high_cliff() {
        let bands = square(1, 3, 12);
        let mut tiles = Grid::filled(TileCode::Grass);
        assign_tiles(&mut tiles, &bands);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(place_cave(&mut tiles, &bands, 1.0, &mut rng), None);

        let high = square(2, 3, 12);
        assign_tiles(&mut tiles, &high);
        let cave = place_cave(&mut tiles, &high, 1.0, &mut rng);
        let (x, y) = cave.unwrap();
        assert_eq!(tiles.get(x, y), TileCode::CaveEntrance);
        assert!(is_straight_edge(&high, x, y));
    }

    #[test]
    fn caves_skip_ridges_and_tips() {
        // A one-wide wall: every tile drops on two opposite sides and both
        // ends drop on three.
        let mut bands = Grid::filled(0);
        for x in 3..=10 {
            bands.set(x, 6, 2);
        }
        let mut tiles = Grid::filled(TileCode::Grass);
        assign_tiles(&mut tiles, &bands);
        assert_eq!(classify(&bands, 10, 6), Some(CliffPiece::Edge(Side::North)));
        assert!(!is_straight_edge(&bands, 6, 6));
        assert!(!is_straight_edge(&bands, 10, 6));

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(place_cave(&mut tiles, &bands, 1.0, &mut rng), None);
        }

        // A tip sticking out of a plateau is rejected, the plateau face is not.
        let mut bands = square(2, 3, 8);
        bands.set(9, 6, 2);
        assert!(!is_straight_edge(&bands, 9, 6));
        assert!(is_straight_edge(&bands, 8, 4));
        assert!(!is_straight_edge(&bands, 8, 6));
    }
}
