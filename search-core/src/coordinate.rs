//! `Coordinate` / `CoordinateData`: an integer vector in dimension-index
//! space, and the persistent per-coordinate bookkeeping (measurement, visit
//! count, measured flag) that makes the search idempotent and
//! failure-tolerant.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use search_types::{RunConfigMeasurement, SearchError, SearchResult};

/// Rounding policy used throughout the search: round-half-away-from-zero,
/// matching the behavior of a plain `round()` on the positive values this
/// system produces.
pub fn round_half_away_from_zero(x: f64) -> i64 {
    if x >= 0.0 {
        (x + 0.5).floor() as i64
    } else {
        (x - 0.5).ceil() as i64
    }
}

/// Ordered integer vector in dimension-index space. Length is fixed at
/// construction; all arithmetic between two coordinates requires equal
/// length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate(Vec<i64>);

impl Coordinate {
    pub fn new(values: Vec<i64>) -> Self {
        Self(values)
    }

    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, i64> {
        self.0.iter()
    }

    pub fn get(&self, i: usize) -> Option<i64> {
        self.0.get(i).copied()
    }

    fn check_len(&self, other: &Coordinate) -> SearchResult<()> {
        if self.len() != other.len() {
            return Err(SearchError::DimensionMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }

    /// Elementwise addition; fails with `DimensionMismatch` on unequal length.
    pub fn checked_add(&self, other: &Coordinate) -> SearchResult<Coordinate> {
        self.check_len(other)?;
        Ok(Coordinate(
            self.0.iter().zip(other.0.iter()).map(|(a, b)| a + b).collect(),
        ))
    }

    /// Elementwise subtraction; fails with `DimensionMismatch` on unequal length.
    pub fn checked_sub(&self, other: &Coordinate) -> SearchResult<Coordinate> {
        self.check_len(other)?;
        Ok(Coordinate(
            self.0.iter().zip(other.0.iter()).map(|(a, b)| a - b).collect(),
        ))
    }

    /// Scalar-multiplied float vector, rounded with `round_half_away_from_zero`.
    pub fn scale_rounded(&self, factor: f64) -> Coordinate {
        Coordinate(
            self.0
                .iter()
                .map(|v| round_half_away_from_zero(*v as f64 * factor))
                .collect(),
        )
    }

    /// Euclidean distance to `other` in index space.
    pub fn distance(&self, other: &Coordinate) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = (a - b) as f64;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Coordinate with the largest absolute component, used by the
    /// neighborhood's clipping step.
    pub fn max_abs_component(&self) -> i64 {
        self.0.iter().map(|v| v.abs()).max().unwrap_or(0)
    }
}

impl Add for &Coordinate {
    type Output = Coordinate;
    fn add(self, rhs: &Coordinate) -> Coordinate {
        self.checked_add(rhs).expect("coordinate length mismatch in +")
    }
}

impl Sub for &Coordinate {
    type Output = Coordinate;
    fn sub(self, rhs: &Coordinate) -> Coordinate {
        self.checked_sub(rhs).expect("coordinate length mismatch in -")
    }
}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coordinate {
    /// Lexicographic ordering: the first differing index determines it.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// One coordinate's bookkeeping: whether it has been measured (even as a
/// failure), its stored measurement (absent on failure), and its visit count.
#[derive(Debug, Clone, Default)]
struct CoordinateEntry {
    measured: bool,
    measurement: Option<RunConfigMeasurement>,
    visit_count: u64,
}

/// Three persistent maps keyed by coordinate, with independent reset
/// semantics: visit counts must survive a neighborhood rebuild, measurements
/// may be scoped to one neighborhood, and the measured flag distinguishes
/// "never tried" from "tried and failed".
#[derive(Debug, Clone, Default)]
pub struct CoordinateData {
    entries: BTreeMap<Vec<i64>, CoordinateEntry>,
}

impl CoordinateData {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(c: &Coordinate) -> Vec<i64> {
        c.0.clone()
    }

    pub fn get_measurement(&self, c: &Coordinate) -> Option<&RunConfigMeasurement> {
        self.entries.get(&Self::key(c)).and_then(|e| e.measurement.as_ref())
    }

    /// Records `m` (possibly `None` for a failed run) and marks `c` measured.
    /// Idempotent: a later call simply replaces the stored value.
    pub fn set_measurement(&mut self, c: &Coordinate, m: Option<RunConfigMeasurement>) {
        let entry = self.entries.entry(Self::key(c)).or_default();
        entry.measured = true;
        entry.measurement = m;
    }

    pub fn is_measured(&self, c: &Coordinate) -> bool {
        self.entries.get(&Self::key(c)).map(|e| e.measured).unwrap_or(false)
    }

    pub fn has_valid_measurement(&self, c: &Coordinate) -> bool {
        self.entries
            .get(&Self::key(c))
            .map(|e| e.measured && e.measurement.is_some())
            .unwrap_or(false)
    }

    pub fn increment_visit_count(&mut self, c: &Coordinate) {
        self.entries.entry(Self::key(c)).or_default().visit_count += 1;
    }

    pub fn get_visit_count(&self, c: &Coordinate) -> u64 {
        self.entries.get(&Self::key(c)).map(|e| e.visit_count).unwrap_or(0)
    }

    /// Clears stored measurements only; visit counts and measured flags
    /// survive.
    pub fn reset_measurements(&mut self) {
        for entry in self.entries.values_mut() {
            entry.measurement = None;
            entry.measured = false;
        }
    }

    /// Merge another map's visit counts into this one, taking the max per
    /// coordinate. Used when a `QuickRunConfigGenerator` rebuilds its
    /// neighborhood but must carry the global visit history forward.
    pub fn merge_visit_counts_from(&mut self, other: &CoordinateData) {
        for (key, entry) in &other.entries {
            let mine = self.entries.entry(key.clone()).or_default();
            mine.visit_count = mine.visit_count.max(entry.visit_count);
        }
    }

    pub fn visited_coordinates(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.visit_count > 0)
            .map(|(k, _)| Coordinate::new(k.clone()))
    }

    /// A serializable, order-stable snapshot of every entry, used by
    /// `StateManager` to persist coordinate bookkeeping into a checkpoint.
    /// A `Vec` of `(key, entry)` pairs rather than a map, since `serde_json`
    /// cannot key an object by a non-string type and a stringly-keyed map
    /// would lose the coordinate's structure.
    pub fn to_snapshot(&self) -> Vec<(Vec<i64>, CoordinateEntrySnapshot)> {
        self.entries
            .iter()
            .map(|(k, e)| {
                (
                    k.clone(),
                    CoordinateEntrySnapshot {
                        measured: e.measured,
                        measurement: e.measurement.clone(),
                        visit_count: e.visit_count,
                    },
                )
            })
            .collect()
    }

    /// Inverse of `to_snapshot`.
    pub fn from_snapshot(snapshot: Vec<(Vec<i64>, CoordinateEntrySnapshot)>) -> Self {
        let entries = snapshot
            .into_iter()
            .map(|(k, s)| {
                (
                    k,
                    CoordinateEntry {
                        measured: s.measured,
                        measurement: s.measurement,
                        visit_count: s.visit_count,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

/// Wire form of one `CoordinateEntry`, as stored in a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinateEntrySnapshot {
    pub measured: bool,
    pub measurement: Option<RunConfigMeasurement>,
    pub visit_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_types::ModelMeasurement;

    fn dummy_measurement(throughput: f64) -> RunConfigMeasurement {
        let mut metrics = std::collections::BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        RunConfigMeasurement::new(vec![ModelMeasurement {
            model_name: "m".to_string(),
            config: search_types::ModelConfigSummary {
                max_batch_size: 1,
                instance_count: 1,
                concurrency: Some(1),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: search_types::Objectives::single("perf_throughput"),
            constraints: search_types::Constraints::default(),
        }])
    }

    #[test]
    fn add_then_subtract_is_identity() {
        let a = Coordinate::new(vec![1, 2, 3]);
        let b = Coordinate::new(vec![4, -1, 2]);
        let sum = (&a).checked_add(&b).unwrap();
        let back = sum.checked_sub(&b).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn mismatched_length_arithmetic_errors() {
        let a = Coordinate::new(vec![1, 2]);
        let b = Coordinate::new(vec![1, 2, 3]);
        assert!(matches!(
            a.checked_add(&b),
            Err(SearchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn lexicographic_ordering() {
        let a = Coordinate::new(vec![1, 5]);
        let b = Coordinate::new(vec![1, 6]);
        let c = Coordinate::new(vec![2, 0]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn round_half_away_from_zero_matches_python_round() {
        assert_eq!(round_half_away_from_zero(2.5), 3);
        assert_eq!(round_half_away_from_zero(-2.5), -3);
        assert_eq!(round_half_away_from_zero(2.4), 2);
        assert_eq!(round_half_away_from_zero(0.0), 0);
    }

    #[test]
    fn visit_count_is_monotonic_and_unseen_is_zero() {
        let mut data = CoordinateData::new();
        let c = Coordinate::new(vec![0, 0]);
        assert_eq!(data.get_visit_count(&c), 0);
        data.increment_visit_count(&c);
        data.increment_visit_count(&c);
        assert_eq!(data.get_visit_count(&c), 2);
    }

    #[test]
    fn idempotent_measurement_storage() {
        let mut data = CoordinateData::new();
        let c = Coordinate::new(vec![1, 1]);
        let m = dummy_measurement(10.0);
        data.set_measurement(&c, Some(m.clone()));
        data.set_measurement(&c, Some(m.clone()));
        assert!(data.is_measured(&c));
        assert_eq!(data.get_measurement(&c), Some(&m));
    }

    #[test]
    fn failed_measurement_is_measured_but_not_valid() {
        let mut data = CoordinateData::new();
        let c = Coordinate::new(vec![1, 1]);
        data.set_measurement(&c, None);
        assert!(data.is_measured(&c));
        assert!(!data.has_valid_measurement(&c));
        assert!(data.get_measurement(&c).is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let mut data = CoordinateData::new();
        let c = Coordinate::new(vec![2, 3]);
        data.increment_visit_count(&c);
        data.increment_visit_count(&c);
        data.set_measurement(&c, Some(dummy_measurement(7.0)));
        data.set_measurement(&Coordinate::new(vec![0, 0]), None);

        let restored = CoordinateData::from_snapshot(data.to_snapshot());
        assert_eq!(restored.get_visit_count(&c), 2);
        assert_eq!(restored.get_measurement(&c), data.get_measurement(&c));
        assert!(restored.is_measured(&Coordinate::new(vec![0, 0])));
        assert!(!restored.has_valid_measurement(&Coordinate::new(vec![0, 0])));
    }

    #[test]
    fn reset_measurements_preserves_visit_counts() {
        let mut data = CoordinateData::new();
        let c = Coordinate::new(vec![0]);
        data.increment_visit_count(&c);
        data.set_measurement(&c, Some(dummy_measurement(5.0)));
        data.reset_measurements();
        assert_eq!(data.get_visit_count(&c), 1);
        assert!(!data.is_measured(&c));
        assert!(data.get_measurement(&c).is_none());
    }
}
