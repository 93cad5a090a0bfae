//! Distance-prioritized chunk request scheduling.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::Serialize;

use crate::chunk::ChunkCoord;
use crate::config::StreamingConfig;

/// Priority entry for the request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkPriority {
    coord: ChunkCoord,
    /// Squared chunk distance from the player; lower goes first.
    distance_sq: i64,
}

impl Ord for ChunkPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering: nearer chunks pop first, ties in coordinate order.
        other
            .distance_sq
            .cmp(&self.distance_sq)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for ChunkPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Streaming counters for monitoring and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamingMetrics {
    /// Load jobs handed to the workers.
    pub requests_submitted: u64,
    pub chunks_generated: u64,
    pub chunks_loaded: u64,
    /// Chunks restored from the hot cache without a worker round-trip.
    pub chunks_restored: u64,
    /// Chunks received from a server.
    pub chunks_received: u64,
    pub saves_completed: u64,
    pub saves_failed: u64,
    pub evictions: u64,
    /// Completions that arrived after their chunk left the interest set.
    pub late_arrivals: u64,
    /// Current queue size.
    pub queue_size: usize,
}

/// Chunks within `radius` of `center`, nearest first.
pub fn interest_set(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
    let radius = radius.max(0);
    let limit = (radius as i64) * (radius as i64);
    let mut coords: Vec<ChunkCoord> = (-radius..=radius)
        .flat_map(|dy| (-radius..=radius).map(move |dx| center.offset(dx, dy)))
        .filter(|coord| coord.distance_sq(center) <= limit)
        .collect();
    coords.sort_by_key(|coord| (coord.distance_sq(center), *coord));
    coords
}

/// Keeps the request queue ordered around the player.
pub struct StreamingScheduler {
    config: StreamingConfig,
    center: ChunkCoord,
    queue: BinaryHeap<ChunkPriority>,
    queued: HashSet<ChunkCoord>,
}

impl StreamingScheduler {
    pub fn new(config: StreamingConfig) -> Self {
        Self {
            config,
            center: ChunkCoord::new(0, 0),
            queue: BinaryHeap::new(),
            queued: HashSet::new(),
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Rebuild the queue for a new player chunk. `needs` says whether a
    /// coordinate still has to be requested.
    pub fn plan(&mut self, center: ChunkCoord, needs: impl Fn(ChunkCoord) -> bool) -> usize {
        self.center = center;
        self.queue.clear();
        self.queued.clear();
        for coord in interest_set(center, self.config.interest_radius) {
            if needs(coord) {
                self.enqueue(coord);
            }
        }
        self.queue.len()
    }

    /// Queue one coordinate. Returns false if it is already queued.
    pub fn enqueue(&mut self, coord: ChunkCoord) -> bool {
        if !self.queued.insert(coord) {
            return false;
        }
        self.queue.push(ChunkPriority {
            coord,
            distance_sq: coord.distance_sq(self.center),
        });
        true
    }

    /// Next coordinate to request.
    pub fn pop(&mut self) -> Option<ChunkCoord> {
        let entry = self.queue.pop()?;
        self.queued.remove(&entry.coord);
        Some(entry.coord)
    }

    pub fn is_wanted(&self, coord: ChunkCoord) -> bool {
        let r = self.config.interest_radius as i64;
        coord.distance_sq(self.center) <= r * r
    }

    /// True once `coord` has left the interest radius plus hysteresis.
    pub fn should_evict(&self, coord: ChunkCoord) -> bool {
        let keep = (self.config.interest_radius + self.config.hysteresis.max(0)) as i64;
        coord.distance_sq(self.center) > keep * keep
    }
}
