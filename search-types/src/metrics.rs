use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numerical floor used wherever a comparison would otherwise divide by zero.
pub const EPSILON: f64 = 1e-6;

/// Whether a metric is better when it goes up (throughput) or down (latency,
/// memory). Unknown metrics default to `Maximize`, matching the original's
/// treatment of custom/user-declared metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

/// Look up the natural direction of a well-known metric name. Metrics not in
/// this table (e.g. user-defined custom metrics) default to `Maximize`.
pub fn metric_direction(name: &str) -> Direction {
    match name {
        "perf_latency_p99"
        | "perf_latency_p95"
        | "perf_latency_p90"
        | "perf_latency_avg"
        | "cpu_used_ram"
        | "gpu_used_memory"
        | "gpu_power_usage" => Direction::Minimize,
        _ => Direction::Maximize,
    }
}

/// `metric -> weight` map, normalized so weights sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Objectives(pub BTreeMap<String, f64>);

impl Objectives {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            return Self(weights);
        }
        let normalized = weights
            .into_iter()
            .map(|(k, v)| (k, v / total))
            .collect();
        Self(normalized)
    }

    /// A single objective with weight 1.0.
    pub fn single(metric: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(metric.into(), 1.0);
        Self(map)
    }

    pub fn uniform(metrics: impl IntoIterator<Item = String>) -> Self {
        let metrics: Vec<String> = metrics.into_iter().collect();
        let weight = if metrics.is_empty() {
            0.0
        } else {
            1.0 / metrics.len() as f64
        };
        Self(metrics.into_iter().map(|m| (m, weight)).collect())
    }
}

/// A single numeric bound a measurement must satisfy to be "passing".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ConstraintBound {
    /// Metric must be <= bound.
    Max(f64),
    /// Metric must be >= bound.
    Min(f64),
}

impl ConstraintBound {
    /// Relative amount by which `actual` exceeds this bound. Zero if passing.
    fn excess(&self, actual: f64) -> f64 {
        match *self {
            ConstraintBound::Max(bound) => ((actual - bound).max(0.0)) / bound.abs().max(EPSILON),
            ConstraintBound::Min(bound) => ((bound - actual).max(0.0)) / bound.abs().max(EPSILON),
        }
    }

    fn is_passing(&self, actual: f64) -> bool {
        match *self {
            ConstraintBound::Max(bound) => actual <= bound,
            ConstraintBound::Min(bound) => actual >= bound,
        }
    }
}

/// `metric -> bound` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraints(pub BTreeMap<String, ConstraintBound>);

impl Constraints {
    pub fn is_passing(&self, metrics: &BTreeMap<String, f64>) -> bool {
        self.0.iter().all(|(metric, bound)| {
            metrics
                .get(metric)
                .map(|actual| bound.is_passing(*actual))
                .unwrap_or(true)
        })
    }

    pub fn total_excess(&self, metrics: &BTreeMap<String, f64>) -> f64 {
        self.0
            .iter()
            .map(|(metric, bound)| {
                metrics
                    .get(metric)
                    .map(|actual| bound.excess(*actual))
                    .unwrap_or(0.0)
            })
            .sum()
    }
}

/// Per-GPU telemetry captured during one profiling run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GpuMetrics {
    pub memory_used_bytes: f64,
    pub utilization_percent: f64,
    pub power_watts: f64,
}

/// Server-side configuration summary attached to a measurement, used for
/// display and checkpoint fingerprinting (not re-derived from `RunConfig`
/// because measurements must remain meaningful after a generator has moved
/// on from the config that produced them).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfigSummary {
    pub max_batch_size: u32,
    pub instance_count: u32,
    pub concurrency: Option<u32>,
    pub request_rate: Option<u32>,
}

/// One model's contribution to a `RunConfigMeasurement`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMeasurement {
    pub model_name: String,
    pub config: ModelConfigSummary,
    pub non_gpu_metrics: BTreeMap<String, f64>,
    pub gpu_metrics: BTreeMap<String, GpuMetrics>,
    pub objectives: Objectives,
    pub constraints: Constraints,
}

impl ModelMeasurement {
    pub fn is_passing_constraints(&self) -> bool {
        self.constraints.is_passing(&self.non_gpu_metrics)
    }

    pub fn get_non_gpu_metric(&self, name: &str) -> Option<f64> {
        self.non_gpu_metrics.get(name).copied()
    }

    /// Continuous, signed score of `self` against `other` under this model's
    /// objectives: positive means `self` is better.
    fn score(&self, other: &ModelMeasurement) -> f64 {
        self.objectives
            .0
            .iter()
            .map(|(metric, weight)| {
                let a = self.non_gpu_metrics.get(metric).copied().unwrap_or(0.0);
                let b = other.non_gpu_metrics.get(metric).copied().unwrap_or(0.0);
                let scale = a.abs().max(b.abs()).max(EPSILON);
                let delta = (a - b) / scale;
                let signed = match metric_direction(metric) {
                    Direction::Maximize => delta,
                    Direction::Minimize => -delta,
                };
                weight * signed
            })
            .sum()
    }

    fn total_excess(&self) -> f64 {
        self.constraints.total_excess(&self.non_gpu_metrics)
    }
}

/// An immutable record summarizing one profiling run across every model in
/// the `RunConfig` that produced it. A failed/unparseable run is represented
/// as `None` by the caller (see `CoordinateData`), never as a variant here —
/// every `RunConfigMeasurement` in existence is a valid, complete result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfigMeasurement {
    pub models: Vec<ModelMeasurement>,
    /// Per-model weight used to combine scores/feasibility. Defaults to
    /// uniform (`1/n`) when omitted by the caller.
    pub model_weights: Vec<f64>,
}

impl RunConfigMeasurement {
    pub fn new(models: Vec<ModelMeasurement>) -> Self {
        let n = models.len().max(1);
        let model_weights = vec![1.0 / n as f64; models.len()];
        Self {
            models,
            model_weights,
        }
    }

    pub fn with_weights(models: Vec<ModelMeasurement>, model_weights: Vec<f64>) -> Self {
        assert_eq!(models.len(), model_weights.len());
        Self {
            models,
            model_weights,
        }
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.model_name.as_str()).collect()
    }

    /// Aggregate feasibility: AND across every model.
    pub fn is_passing_constraints(&self) -> bool {
        self.models.iter().all(|m| m.is_passing_constraints())
    }

    pub fn get_non_gpu_metric_value(&self, model_index: usize, name: &str) -> Option<f64> {
        self.models.get(model_index).and_then(|m| m.get_non_gpu_metric(name))
    }

    /// Single-model convenience accessor, used heavily by the generators
    /// (which only ever measure one model's throughput at a time).
    pub fn perf_throughput(&self) -> f64 {
        self.models
            .iter()
            .filter_map(|m| m.get_non_gpu_metric("perf_throughput"))
            .sum()
    }

    /// Weighted sum of per-model continuous scores. Positive means `self` is
    /// better than `other`. This is the *continuous* quantity promoted out of
    /// `compare_measurements` per the objective-weight Open Question in
    /// spec.md §9 — used directly as a weight by the neighborhood's
    /// objective-driven step branch.
    pub fn score(&self, other: &RunConfigMeasurement) -> f64 {
        self.models
            .iter()
            .zip(other.models.iter())
            .zip(self.model_weights.iter())
            .map(|((a, b), w)| w * a.score(b))
            .sum()
    }

    /// Strict total order, feasibility first, then the continuous score's
    /// sign. Returns -1, 0, or +1.
    pub fn compare_measurements(&self, other: &RunConfigMeasurement) -> i8 {
        let self_pass = self.is_passing_constraints();
        let other_pass = other.is_passing_constraints();

        if self_pass && !other_pass {
            return 1;
        }
        if !self_pass && other_pass {
            return -1;
        }

        let score = self.score(other);
        if score > EPSILON {
            1
        } else if score < -EPSILON {
            -1
        } else {
            0
        }
    }

    /// Degree to which `self` is closer to passing constraints than `other`.
    /// Only meaningful when both measurements are failing; a value > 1 means
    /// `self` is closer to passing.
    pub fn compare_constraints(&self, other: &RunConfigMeasurement) -> f64 {
        let self_excess: f64 = self
            .models
            .iter()
            .zip(self.model_weights.iter())
            .map(|(m, w)| w * m.total_excess())
            .sum();
        let other_excess: f64 = other
            .models
            .iter()
            .zip(other.model_weights.iter())
            .map(|(m, w)| w * m.total_excess())
            .sum();

        other_excess / self_excess.max(EPSILON)
    }
}
