//! Property-based tests for chunk records and region framing
//!
//! Critical properties:
//! - Decoders never panic on arbitrary input
//! - Any corrupted byte in a region payload is caught before decoding
//! - Records that break chunk invariants are rejected, valid edits survive

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use tileworld_world::{
    decode_record, decode_region, encode_record, encode_region, BiomeTable, BlockKind, Chunk,
    ChunkCoord, ChunkPipeline, ChunkRecord, LocalTile, Orientation, PlacedBlock, WorldConfig,
    CHUNK_SIZE, MAX_BAND,
};

const BLOCK_KINDS: [BlockKind; 4] = [
    BlockKind::Chest,
    BlockKind::WoodenPlanks,
    BlockKind::WoodenDoor,
    BlockKind::RoofCorner,
];

fn generated_record(seed: u64, x: i32, y: i32) -> ChunkRecord {
    let config = WorldConfig {
        seed,
        ..WorldConfig::default()
    };
    ChunkPipeline::from_config(&config, Arc::new(BiomeTable::default()))
        .build(ChunkCoord::new(x, y))
        .to_record()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: arbitrary bytes never crash the decoders.
    #[test]
    fn arbitrary_bytes_dont_crash(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = decode_record(&bytes);
        let _ = decode_region(&bytes);
    }

    /// Property: flipping any payload byte of a region is detected.
    #[test]
    fn corrupted_region_is_rejected(
        x in -50i32..50,
        y in -50i32..50,
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let record = generated_record(99, x, y);
        let mut data = HashMap::new();
        data.insert(record.coord, encode_record(&record).unwrap());
        let mut bytes = encode_region(&data).unwrap();
        prop_assert!(decode_region(&bytes).is_ok());

        let at = index.index(bytes.len());
        bytes[at] ^= flip;
        prop_assert!(decode_region(&bytes).is_err(), "corruption at byte {} went unnoticed", at);
    }

    /// Property: blocks placed on distinct tiles survive encoding.
    #[test]
    fn edited_records_survive_encoding(
        seed in any::<u64>(),
        cells in prop::collection::btree_set((0..CHUNK_SIZE, 0..CHUNK_SIZE), 0..12),
        kind in 0usize..BLOCK_KINDS.len(),
        payload in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut record = generated_record(seed, 0, 0);
        record.blocks = cells
            .iter()
            .map(|&(x, y)| {
                let local = LocalTile::new(x, y).unwrap();
                PlacedBlock::new(local, BLOCK_KINDS[kind], Orientation::South)
                    .with_payload(payload.clone())
            })
            .collect();

        let decoded = decode_record(&encode_record(&record).unwrap()).unwrap();
        let chunk = Chunk::from_record(decoded).unwrap();
        prop_assert_eq!(chunk.block_count(), cells.len());
        prop_assert_eq!(chunk.to_record(), record);
    }

    /// Property: out-of-range bands and short grids never become chunks.
    #[test]
    fn invalid_records_are_rejected(
        cell in 0usize..CHUNK_SIZE * CHUNK_SIZE,
        band in (MAX_BAND + 1)..=u8::MAX,
        truncate in 1usize..CHUNK_SIZE,
    ) {
        let record = generated_record(7, 1, -1);

        let mut bad_band = record.clone();
        bad_band.bands[cell] = band;
        prop_assert!(Chunk::from_record(bad_band.clone()).is_err());
        prop_assert!(decode_record(&encode_record(&bad_band).unwrap()).is_err());

        let mut short = record;
        let keep = short.tiles.len() - truncate;
        short.tiles.truncate(keep);
        prop_assert!(Chunk::from_record(short).is_err());
    }
}

#[test]
fn duplicate_blocks_are_rejected() {
    let mut record = generated_record(3, 0, 0);
    let local = LocalTile::new(4, 4).unwrap();
    record.blocks = vec![
        PlacedBlock::new(local, BlockKind::Chest, Orientation::North),
        PlacedBlock::new(local, BlockKind::Furnace, Orientation::North),
    ];
    assert!(Chunk::from_record(record).is_err());
}
