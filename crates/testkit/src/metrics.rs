//! Standardized metrics collection and reporting for CI integration.
//!
//! Worldtests and the debug tool export one [`MetricsReport`] per run as
//! pretty JSON. Every subsystem section is optional so a test only fills in
//! what it measured.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Top-level metrics report containing all subsystem metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Test or tool run identifier
    pub test_name: String,

    /// Timestamp when metrics were collected (RFC 3339)
    pub timestamp: String,

    /// World seed the run used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Overall test result
    pub result: TestResult,

    /// Terrain generation metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terrain: Option<TerrainMetrics>,

    /// Object placement metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementMetrics>,

    /// Creature spawning metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawning: Option<SpawningMetrics>,

    /// Chunk streaming metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingReport>,

    /// Persistence/save metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceMetrics>,

    /// Test execution metrics
    pub test_execution: TestExecutionMetrics,
}

/// Overall test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    /// Test passed all validations
    Pass,
    /// Test failed
    Fail,
    /// Test was skipped
    Skip,
}

/// Terrain generation performance and composition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainMetrics {
    /// Total chunks generated
    pub chunks_generated: usize,

    /// Average generation time per chunk (microseconds)
    pub avg_gen_time_us: f64,

    /// Max generation time (microseconds)
    pub max_gen_time_us: u128,

    /// Chunks per second throughput
    pub chunks_per_second: f64,

    /// Chunks with at least one raised elevation band
    pub mountain_chunks: usize,

    /// Water tiles across all generated chunks
    pub water_tiles: usize,

    /// Dominant biome counts, keyed by biome name
    pub biomes: BTreeMap<String, usize>,
}

/// Object placement results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementMetrics {
    /// Objects placed across all chunks
    pub objects_placed: usize,

    /// Trees among them
    pub trees: usize,

    /// Average objects per chunk
    pub avg_objects_per_chunk: f64,

    /// Average placement time per chunk (microseconds)
    pub avg_place_time_us: f64,

    /// Counts keyed by object kind
    pub by_kind: BTreeMap<String, usize>,
}

/// Creature spawn manager counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawningMetrics {
    /// Spawn checks run
    pub checks: u64,

    /// Single creatures spawned
    pub singles: u64,

    /// Packs spawned
    pub packs: u64,

    /// Creatures despawned
    pub despawned: u64,

    /// Creatures alive at end of run
    pub alive: usize,

    /// Candidates rejected for any reason
    pub rejected: u64,
}

/// Chunk streaming counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamingReport {
    /// Load requests handed to workers
    pub requests_submitted: u64,

    /// Chunks produced by generation
    pub chunks_generated: u64,

    /// Chunks read back from storage
    pub chunks_loaded: u64,

    /// Chunks restored from the hot cache
    pub chunks_restored: u64,

    /// Chunks evicted
    pub evictions: u64,

    /// Ticks until the interest set was fully resident
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks_to_converge: Option<u64>,
}

/// Persistence and save/load metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceMetrics {
    /// Chunks saved
    pub chunks_saved: usize,

    /// Chunks loaded
    pub chunks_loaded: usize,

    /// Save failures
    pub save_failures: usize,

    /// Total bytes written
    pub bytes_written: u64,
}

/// Test execution and infrastructure metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestExecutionMetrics {
    /// Total test duration (seconds)
    pub duration_seconds: f64,

    /// Simulation ticks run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u64>,

    /// Number of assertions checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertions_checked: Option<usize>,
}

/// Builder for constructing metrics reports
pub struct MetricsReportBuilder {
    report: MetricsReport,
}

impl MetricsReportBuilder {
    /// Create a new builder with test name
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            report: MetricsReport {
                test_name: test_name.into(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                seed: None,
                result: TestResult::Pass,
                terrain: None,
                placement: None,
                spawning: None,
                streaming: None,
                persistence: None,
                test_execution: TestExecutionMetrics::default(),
            },
        }
    }

    /// Set test result
    pub fn result(mut self, result: TestResult) -> Self {
        self.report.result = result;
        self
    }

    /// Set world seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.report.seed = Some(seed);
        self
    }

    /// Set terrain metrics
    pub fn terrain(mut self, metrics: TerrainMetrics) -> Self {
        self.report.terrain = Some(metrics);
        self
    }

    /// Set placement metrics
    pub fn placement(mut self, metrics: PlacementMetrics) -> Self {
        self.report.placement = Some(metrics);
        self
    }

    /// Set spawning metrics
    pub fn spawning(mut self, metrics: SpawningMetrics) -> Self {
        self.report.spawning = Some(metrics);
        self
    }

    /// Set streaming metrics
    pub fn streaming(mut self, metrics: StreamingReport) -> Self {
        self.report.streaming = Some(metrics);
        self
    }

    /// Set persistence metrics
    pub fn persistence(mut self, metrics: PersistenceMetrics) -> Self {
        self.report.persistence = Some(metrics);
        self
    }

    /// Set test execution metrics
    pub fn execution(mut self, metrics: TestExecutionMetrics) -> Self {
        self.report.test_execution = metrics;
        self
    }

    /// Build the metrics report
    pub fn build(self) -> MetricsReport {
        self.report
    }
}

/// Sink for writing metrics reports to JSON files
pub struct MetricsSink {
    path: std::path::PathBuf,
}

impl MetricsSink {
    /// Create a new metrics sink at the specified path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Write metrics report to file
    pub fn write(&self, report: &MetricsReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn metrics_report_roundtrip() {
        let mut biomes = BTreeMap::new();
        biomes.insert("Plains".to_string(), 12);
        biomes.insert("Forest".to_string(), 4);

        let report = MetricsReportBuilder::new("test_example")
            .seed(42)
            .terrain(TerrainMetrics {
                chunks_generated: 16,
                avg_gen_time_us: 850.0,
                max_gen_time_us: 2100,
                chunks_per_second: 1176.0,
                mountain_chunks: 3,
                water_tiles: 90,
                biomes,
            })
            .spawning(SpawningMetrics {
                checks: 40,
                singles: 6,
                packs: 1,
                ..SpawningMetrics::default()
            })
            .execution(TestExecutionMetrics {
                duration_seconds: 2.5,
                ticks: Some(600),
                assertions_checked: Some(50),
            })
            .build();

        let json = serde_json::to_string_pretty(&report).unwrap();
        let parsed: MetricsReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.test_name, "test_example");
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.result, TestResult::Pass);
        assert_eq!(parsed.terrain.as_ref().unwrap().biomes["Plains"], 12);
        assert_eq!(parsed.spawning.as_ref().unwrap().packs, 1);
        assert!(parsed.placement.is_none());
        assert!(!json.contains("\"streaming\""));
    }

    #[test]
    fn metrics_sink_writes_file() {
        let path = std::env::temp_dir().join(format!(
            "metrics-{}.json",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));

        let report = MetricsReportBuilder::new("sink_test")
            .result(TestResult::Pass)
            .streaming(StreamingReport {
                requests_submitted: 9,
                chunks_generated: 9,
                ticks_to_converge: Some(14),
                ..StreamingReport::default()
            })
            .build();

        let sink = MetricsSink::create(&path).unwrap();
        sink.write(&report).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sink_test"));
        assert!(contents.contains("\"result\": \"pass\""));
        assert!(contents.contains("ticks_to_converge"));

        fs::remove_file(&path).ok();
    }
}
