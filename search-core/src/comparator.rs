//! `MeasurementComparator` (spec.md §4.4): a value-typed, explicitly
//! parameterized wrapper around the objective/constraint algebra in
//! `search_types::metrics`. The original threads objectives and constraints
//! as global state through every comparison; this type is constructed once
//! from the user's config and passed by reference to every comparison
//! instead (spec.md §9 Design Notes).

use std::collections::BTreeMap;

use search_types::{Constraints, ModelConfigSummary, ModelMeasurement, Objectives, RunConfigMeasurement};

/// One model's objective weights, constraints, and aggregate weight, bundled
/// so `MeasurementComparator::measure` can attach them to raw metric values
/// coming back from the profiler.
#[derive(Debug, Clone)]
pub struct ModelComparatorSpec {
    pub model_name: String,
    pub objectives: Objectives,
    pub constraints: Constraints,
    pub weight: f64,
}

/// Constructed once per search from the resolved per-model config (global
/// objectives/constraints overridden per model), then shared by reference
/// across the whole run.
#[derive(Debug, Clone)]
pub struct MeasurementComparator {
    specs: Vec<ModelComparatorSpec>,
}

impl MeasurementComparator {
    pub fn new(specs: Vec<ModelComparatorSpec>) -> Self {
        Self { specs }
    }

    pub fn model_specs(&self) -> &[ModelComparatorSpec] {
        &self.specs
    }

    /// Attach this comparator's objectives/constraints/weights to a set of
    /// raw per-model metric readings, producing the immutable
    /// `RunConfigMeasurement` the rest of the engine operates on.
    pub fn measure(
        &self,
        per_model: Vec<(ModelConfigSummary, BTreeMap<String, f64>, BTreeMap<String, search_types::GpuMetrics>)>,
    ) -> RunConfigMeasurement {
        assert_eq!(per_model.len(), self.specs.len(), "measurement arity must match comparator arity");
        let mut weights = Vec::with_capacity(self.specs.len());
        let models = self
            .specs
            .iter()
            .zip(per_model.into_iter())
            .map(|(spec, (config, non_gpu_metrics, gpu_metrics))| {
                weights.push(spec.weight);
                ModelMeasurement {
                    model_name: spec.model_name.clone(),
                    config,
                    non_gpu_metrics,
                    gpu_metrics,
                    objectives: spec.objectives.clone(),
                    constraints: spec.constraints.clone(),
                }
            })
            .collect();
        RunConfigMeasurement::with_weights(models, weights)
    }

    /// Strict total order, feasibility first, matching spec.md §4.4 and
    /// testable property #6.
    pub fn compare(&self, a: &RunConfigMeasurement, b: &RunConfigMeasurement) -> i8 {
        a.compare_measurements(b)
    }

    pub fn compare_constraints(&self, a: &RunConfigMeasurement, b: &RunConfigMeasurement) -> f64 {
        a.compare_constraints(b)
    }
}
