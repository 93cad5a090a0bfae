//! Chunk records and region-based persistence with zstd compression.
//!
//! Region files group 32x32 chunks. Each file carries a small header with a
//! CRC32 of the compressed payload so torn or corrupt writes are detected on
//! load and treated as a cache miss by the caller.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::biome::BiomeId;
use crate::block::PlacedBlock;
use crate::chunk::{Chunk, ChunkCoord, ElevationBand, Grid, MAX_BAND};
use crate::error::RecordError;
use crate::object::StaticObject;
use crate::tile::TileCode;

/// Magic number for region file identification ("TWRG").
const REGION_MAGIC: u32 = 0x54575247;

/// Current region file format version.
const REGION_VERSION: u16 = 2;

/// Region size in chunks (32x32 chunks per region).
const REGION_SIZE: i32 = 32;

const HEADER_LEN: usize = 14;

/// Logical snapshot of everything a chunk needs to be rebuilt exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub coord: ChunkCoord,
    pub biome: BiomeId,
    pub tiles: Vec<TileCode>,
    pub bands: Vec<ElevationBand>,
    pub objects: Vec<StaticObject>,
    pub blocks: Vec<PlacedBlock>,
}

impl Chunk {
    /// Snapshot this chunk for persistence or the network.
    pub fn to_record(&self) -> ChunkRecord {
        ChunkRecord {
            coord: self.coord(),
            biome: self.biome(),
            tiles: self.tiles().cells().to_vec(),
            bands: self.bands().cells().to_vec(),
            objects: self.objects().to_vec(),
            blocks: self.blocks().cloned().collect(),
        }
    }

    /// Rebuild a clean chunk from a record.
    pub fn from_record(record: ChunkRecord) -> Result<Chunk, RecordError> {
        let tiles_len = record.tiles.len();
        let tiles = Grid::from_vec(record.tiles).ok_or(RecordError::GridSize {
            grid: "tile",
            len: tiles_len,
        })?;
        let bands_len = record.bands.len();
        let bands = Grid::from_vec(record.bands).ok_or(RecordError::GridSize {
            grid: "band",
            len: bands_len,
        })?;
        if let Some(&band) = bands.cells().iter().find(|&&b| b > MAX_BAND) {
            return Err(RecordError::BandOutOfRange(band));
        }

        let mut blocks = BTreeMap::new();
        for block in record.blocks {
            let (x, y) = (block.position.x, block.position.y);
            if !block.position.is_valid() {
                return Err(RecordError::BlockOutsideChunk { x, y });
            }
            if blocks.insert(block.position, block).is_some() {
                return Err(RecordError::DuplicateBlock { x, y });
            }
        }

        Ok(Chunk::from_parts(
            record.coord,
            record.biome,
            tiles,
            bands,
            record.objects,
            blocks,
        ))
    }
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        chunk.to_record()
    }
}

/// Storage backend for chunk records. Implementations are shared with the
/// worker pool and must tolerate concurrent calls.
pub trait ChunkPersistence: Send + Sync {
    fn save(&self, record: &ChunkRecord) -> Result<()>;

    /// `Ok(None)` when nothing was ever saved for `coord`.
    fn load(&self, coord: ChunkCoord) -> Result<Option<ChunkRecord>>;
}

/// Region file header structure.
#[derive(Debug, Clone)]
struct RegionHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl RegionHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: REGION_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&self.magic.to_le_bytes());
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.crc32.to_le_bytes());
        bytes.extend_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            anyhow::bail!("Region header too short");
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != REGION_MAGIC {
            anyhow::bail!(
                "Invalid region magic: expected 0x{:08X}, got 0x{:08X}",
                REGION_MAGIC,
                magic
            );
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != REGION_VERSION {
            anyhow::bail!(
                "Unsupported region version {} (expected {})",
                version,
                REGION_VERSION
            );
        }
        let crc32 = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload_len = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        Ok(Self {
            magic,
            version,
            crc32,
            payload_len,
        })
    }
}

type RegionData = HashMap<ChunkCoord, Vec<u8>>;

/// Converts chunk position to region coordinates.
fn chunk_to_region(coord: ChunkCoord) -> (i32, i32) {
    (
        coord.x.div_euclid(REGION_SIZE),
        coord.y.div_euclid(REGION_SIZE),
    )
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Serialize, compress and frame a region map.
pub fn encode_region(data: &HashMap<ChunkCoord, Vec<u8>>) -> Result<Vec<u8>> {
    let serialized = bincode::serialize(data).context("Failed to serialize region")?;

    // Compress with zstd (level 3 for balanced speed/compression).
    let compressed = zstd::encode_all(&serialized[..], 3).context("Failed to compress region")?;

    let header = RegionHeader::new(checksum(&compressed), compressed.len() as u32);
    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Inverse of [`encode_region`]. Fails on any framing, checksum or decode error.
pub fn decode_region(bytes: &[u8]) -> Result<HashMap<ChunkCoord, Vec<u8>>> {
    let header = RegionHeader::from_bytes(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        anyhow::bail!(
            "Region payload length mismatch: header says {}, found {}",
            header.payload_len,
            payload.len()
        );
    }

    let computed_crc = checksum(payload);
    if computed_crc != header.crc32 {
        anyhow::bail!(
            "CRC32 mismatch: expected {:08X}, got {:08X}",
            header.crc32,
            computed_crc
        );
    }

    let decompressed = zstd::decode_all(payload).context("Failed to decompress region")?;
    bincode::deserialize(&decompressed).context("Failed to deserialize region")
}

/// Encode one chunk record (bincode).
pub fn encode_record(record: &ChunkRecord) -> Result<Vec<u8>> {
    bincode::serialize(record).context("Failed to serialize chunk record")
}

/// Decode one chunk record and check that it describes a valid chunk.
pub fn decode_record(bytes: &[u8]) -> Result<ChunkRecord> {
    let record: ChunkRecord =
        bincode::deserialize(bytes).context("Failed to deserialize chunk record")?;
    Chunk::from_record(record.clone()).context("Chunk record failed validation")?;
    Ok(record)
}

/// Region file manager for saving/loading chunks.
pub struct RegionStore {
    world_dir: PathBuf,
    /// Serializes read-modify-write cycles on region files.
    io_lock: Mutex<()>,
    bytes_written: AtomicU64,
}

impl RegionStore {
    /// Create a new region store rooted at the given world directory.
    pub fn new<P: AsRef<Path>>(world_dir: P) -> Result<Self> {
        let world_dir = world_dir.as_ref().to_path_buf();
        fs::create_dir_all(&world_dir).context("Failed to create world directory")?;
        Ok(Self {
            world_dir,
            io_lock: Mutex::new(()),
            bytes_written: AtomicU64::new(0),
        })
    }

    pub fn world_dir(&self) -> &Path {
        &self.world_dir
    }

    /// Total region bytes written since this store was opened.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Get the path to a region file for the given region coordinates.
    fn region_path(&self, region_x: i32, region_y: i32) -> PathBuf {
        self.world_dir.join(format!("r.{}.{}.rg", region_x, region_y))
    }

    /// Load an entire region file; `None` when the file does not exist yet.
    fn read_region(&self, region_x: i32, region_y: i32) -> Result<Option<RegionData>> {
        let region_path = self.region_path(region_x, region_y);
        if !region_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&region_path).context("Failed to open region file")?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .context("Failed to read region file")?;
        decode_region(&bytes)
            .with_context(|| format!("Region file {} is unreadable", region_path.display()))
            .map(Some)
    }

    /// Write an entire region file to disk. The new contents go to a
    /// sibling temp file first and replace the region in one rename.
    fn write_region(&self, region_x: i32, region_y: i32, data: &RegionData) -> Result<()> {
        let region_path = self.region_path(region_x, region_y);
        let temp_path = region_path.with_extension("rg.tmp");
        let bytes = encode_region(data)?;

        let mut file = File::create(&temp_path).context("Failed to create region temp file")?;
        file.write_all(&bytes)
            .context("Failed to write region temp file")?;
        file.sync_all().context("Failed to sync region temp file")?;
        drop(file);
        fs::rename(&temp_path, &region_path).context("Failed to replace region file")?;

        self.bytes_written
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Check if the region holding `coord` exists on disk.
    pub fn region_exists(&self, coord: ChunkCoord) -> bool {
        let (region_x, region_y) = chunk_to_region(coord);
        self.region_path(region_x, region_y).exists()
    }
}

impl ChunkPersistence for RegionStore {
    fn save(&self, record: &ChunkRecord) -> Result<()> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| anyhow!("Region store lock poisoned"))?;
        let (region_x, region_y) = chunk_to_region(record.coord);

        // A corrupt region is replaced rather than blocking every later save.
        let mut region_data = match self.read_region(region_x, region_y) {
            Ok(data) => data.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(
                    region_x,
                    region_y,
                    error = %err,
                    "Discarding unreadable region before save"
                );
                RegionData::new()
            }
        };
        region_data.insert(record.coord, encode_record(record)?);
        self.write_region(region_x, region_y, &region_data)
    }

    fn load(&self, coord: ChunkCoord) -> Result<Option<ChunkRecord>> {
        let _guard = self
            .io_lock
            .lock()
            .map_err(|_| anyhow!("Region store lock poisoned"))?;
        let (region_x, region_y) = chunk_to_region(coord);
        let Some(region_data) = self.read_region(region_x, region_y)? else {
            return Ok(None);
        };
        match region_data.get(&coord) {
            Some(bytes) => {
                let record = decode_record(bytes)?;
                if record.coord != coord {
                    anyhow::bail!("Record for {} stored under {}", record.coord, coord);
                }
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// In-memory backend for tests and tools.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<ChunkCoord, ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.records
            .lock()
            .map(|r| r.contains_key(&coord))
            .unwrap_or(false)
    }
}

impl ChunkPersistence for MemoryStore {
    fn save(&self, record: &ChunkRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?
            .insert(record.coord, record.clone());
        Ok(())
    }

    fn load(&self, coord: ChunkCoord) -> Result<Option<ChunkRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?
            .get(&coord)
            .cloned())
    }
}

/// Backend that keeps nothing. Used in client role, where the server owns state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl ChunkPersistence for NullStore {
    fn save(&self, _record: &ChunkRecord) -> Result<()> {
        Ok(())
    }

    fn load(&self, _coord: ChunkCoord) -> Result<Option<ChunkRecord>> {
        Ok(None)
    }
}
