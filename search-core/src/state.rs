//! `StateManager` (SPEC_FULL.md §4.10): scoped checkpoint persistence. Loads
//! on start, writes atomically on a timer and on orchestrator exit.
//!
//! spec.md §6 describes the checkpoint as "seen measurements, keyed by a
//! deterministic fingerprint" plus "per-generator cursor state". This crate
//! keeps the fingerprint-keyed `seen_measurements` map (for dedup lookup and
//! for the byte-identical-round-trip guarantee, which wants sorted keys) but
//! replaces the opaque per-generator cursor blob with `measurement_log`: the
//! same measurements in the exact order `RunSearch` originally fed them to
//! the generator. Every generator here is a pure function of the sequence of
//! `set_last_results` calls it receives, so replaying `measurement_log`
//! through the same generator reconstructs identical cursor state
//! (batch-size/parameter indices, neighborhood home) without needing
//! generator-specific deserialization logic. `seen_measurements` alone
//! cannot drive replay because a `BTreeMap` sorts by fingerprint, not by the
//! order measurements were taken — that order is exactly what a hill-climb
//! like `QuickRunConfigGenerator` depends on. `generator_state` is kept only
//! as a place for a generator to stash diagnostic info it wants to survive a
//! restart (e.g. the current `magnitude_scaler`), never load-bearing for
//! correctness.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use search_types::{RunConfigMeasurement, SearchError, SearchResult};

use crate::coordinate::CoordinateEntrySnapshot;

/// Default interval between `save_checkpoint_if_due` writes (spec.md §5:
/// "the orchestrator writes between the end of one measurement and the
/// start of the next", bounded here to avoid a write per measurement).
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// A serialized snapshot of orchestrator + generator state (spec.md §6
/// Checkpoint format). `serde_json`'s pretty-printer over `BTreeMap`-backed
/// fields keeps key order stable, which is what makes testable property #10
/// (save -> load -> save is byte-identical) hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchCheckpoint {
    /// `RunConfig` fingerprint -> the measurement it produced (`None` for a
    /// failed run). Sorted by fingerprint (`BTreeMap`), so this is a dedup
    /// index, not a replay order — see `measurement_log` for that.
    pub seen_measurements: BTreeMap<String, Option<RunConfigMeasurement>>,
    /// The same measurements as `seen_measurements`, in the order `RunSearch`
    /// originally produced them. This is what resume actually replays.
    #[serde(default)]
    pub measurement_log: Vec<Option<RunConfigMeasurement>>,
    /// Global (cross-neighborhood) coordinate bookkeeping for quick/optuna
    /// searches; empty for brute searches, which have no coordinate space.
    pub coordinate_data: Vec<(Vec<i64>, CoordinateEntrySnapshot)>,
    /// Opaque, generator-populated diagnostic state. Not required for
    /// correct resume (see module docs); `serde_json::Value::Null` when a
    /// generator doesn't use it.
    #[serde(default)]
    pub generator_state: serde_json::Value,
}

/// Resolves a checkpoint file deterministically from a run identifier
/// (model set + search mode, mirroring the original's per-model-set
/// checkpoint naming) and persists `SearchCheckpoint` snapshots to it.
pub struct StateManager {
    path: PathBuf,
    save_interval: Duration,
    last_saved: Option<Instant>,
}

impl StateManager {
    pub fn new(checkpoint_dir: impl AsRef<Path>, run_identifier: &str) -> Self {
        let mut path = checkpoint_dir.as_ref().to_path_buf();
        path.push(format!("{run_identifier}.checkpoint.json"));
        Self {
            path,
            save_interval: DEFAULT_SAVE_INTERVAL,
            last_saved: None,
        }
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deserializes the checkpoint at `path` if present, else an empty one.
    /// A parse failure is `StateCorruption`, fatal per spec.md §7: the user
    /// must clear checkpoints rather than have the search silently restart.
    pub fn load_or_default(&self) -> SearchResult<SearchCheckpoint> {
        if !self.path.exists() {
            return Ok(SearchCheckpoint::default());
        }
        let bytes = std::fs::read(&self.path)?;
        serde_json::from_slice(&bytes).map_err(|e| SearchError::StateCorruption {
            reason: format!("failed to parse checkpoint {}: {e}", self.path.display()),
        })
    }

    /// Writes only if `save_interval` has elapsed since the last write (or
    /// this is the first write this process has made).
    pub fn save_checkpoint_if_due(&mut self, checkpoint: &SearchCheckpoint) -> SearchResult<()> {
        let due = self
            .last_saved
            .map(|t| t.elapsed() >= self.save_interval)
            .unwrap_or(true);
        if due {
            self.write_atomic(checkpoint)?;
        }
        Ok(())
    }

    /// Always writes, regardless of the interval. Called once on orchestrator
    /// exit, normal or cancelled.
    pub fn save_checkpoint_final(&mut self, checkpoint: &SearchCheckpoint) -> SearchResult<()> {
        self.write_atomic(checkpoint)
    }

    /// Serialize to a temp file in the same directory, then rename over the
    /// target, so a reader never observes a partially-written checkpoint.
    fn write_atomic(&mut self, checkpoint: &SearchCheckpoint) -> SearchResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(checkpoint)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        self.last_saved = Some(Instant::now());
        info!(path = %self.path.display(), "checkpoint written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_types::{Constraints, ModelConfigSummary, ModelMeasurement, Objectives};
    use std::collections::BTreeMap as Map;

    fn measurement(throughput: f64) -> RunConfigMeasurement {
        let mut metrics = Map::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        RunConfigMeasurement::new(vec![ModelMeasurement {
            model_name: "m".to_string(),
            config: ModelConfigSummary {
                max_batch_size: 1,
                instance_count: 1,
                concurrency: Some(1),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints::default(),
        }])
    }

    #[test]
    fn missing_checkpoint_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StateManager::new(dir.path(), "model_a+quick");
        let checkpoint = manager.load_or_default().unwrap();
        assert_eq!(checkpoint, SearchCheckpoint::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = StateManager::new(dir.path(), "model_a+quick");
        let mut checkpoint = SearchCheckpoint::default();
        checkpoint
            .seen_measurements
            .insert("cfg-1".to_string(), Some(measurement(10.0)));
        checkpoint.seen_measurements.insert("cfg-2".to_string(), None);

        manager.save_checkpoint_final(&checkpoint).unwrap();
        let loaded = manager.load_or_default().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[test]
    fn save_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = StateManager::new(dir.path(), "model_a+quick");
        let mut checkpoint = SearchCheckpoint::default();
        checkpoint
            .seen_measurements
            .insert("cfg-1".to_string(), Some(measurement(5.0)));

        manager.save_checkpoint_final(&checkpoint).unwrap();
        let first_bytes = std::fs::read(manager.path()).unwrap();

        let loaded = manager.load_or_default().unwrap();
        manager.save_checkpoint_final(&loaded).unwrap();
        let second_bytes = std::fs::read(manager.path()).unwrap();

        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn corrupted_checkpoint_is_state_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StateManager::new(dir.path(), "model_a+quick");
        std::fs::write(manager.path(), b"not json").unwrap();
        assert!(matches!(
            manager.load_or_default(),
            Err(SearchError::StateCorruption { .. })
        ));
    }

    #[test]
    fn save_if_due_skips_within_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager =
            StateManager::new(dir.path(), "model_a+quick").with_save_interval(Duration::from_secs(3600));
        let checkpoint = SearchCheckpoint::default();
        manager.save_checkpoint_final(&checkpoint).unwrap();
        let mtime_first = std::fs::metadata(manager.path()).unwrap().modified().unwrap();

        // A due-check right after a final write should be a no-op (interval
        // not elapsed), leaving the file untouched.
        manager.save_checkpoint_if_due(&checkpoint).unwrap();
        let mtime_second = std::fs::metadata(manager.path()).unwrap().modified().unwrap();
        assert_eq!(mtime_first, mtime_second);
    }
}
