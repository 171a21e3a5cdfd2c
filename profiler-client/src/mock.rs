//! `MockProfiler`: a deterministic fake `Profiler` for tests and demos that
//! don't have a real inference server to point `perf_analyzer` at. Computes
//! throughput/latency as a closed-form function of the requested config so
//! tests can assert on search behavior without depending on process
//! scheduling or I/O timing.

use std::collections::BTreeMap;

use search_types::{
    Constraints, ModelConfigSummary, ModelMeasurement, Objectives, RunConfig, RunConfigMeasurement,
    SearchResult,
};

use crate::Profiler;

/// A model's synthetic performance curve: throughput rises with batch size
/// and instance count (diminishing returns via a saturating log curve) and
/// with client concurrency up to `concurrency_saturation`, past which added
/// concurrency buys nothing and latency keeps climbing.
#[derive(Debug, Clone)]
pub struct SyntheticModel {
    pub model_name: String,
    pub base_throughput: f64,
    pub concurrency_saturation: u32,
    pub base_latency_us: f64,
    pub objectives: Objectives,
    pub constraints: Constraints,
}

impl SyntheticModel {
    fn measure(&self, max_batch_size: u32, instance_count: u32, load_units: u32) -> ModelMeasurement {
        let capacity = (max_batch_size as f64).ln_1p() * instance_count as f64;
        let effective_load = load_units.min(self.concurrency_saturation.max(1)) as f64;
        let throughput = self.base_throughput * capacity.max(0.1) * effective_load.sqrt();
        let overload = (load_units as f64 - self.concurrency_saturation as f64).max(0.0);
        let latency = self.base_latency_us * (1.0 + overload * 0.15) / capacity.max(0.1);

        let mut metrics = BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        metrics.insert("perf_latency_p99".to_string(), latency);

        ModelMeasurement {
            model_name: self.model_name.clone(),
            config: ModelConfigSummary {
                max_batch_size,
                instance_count,
                concurrency: Some(load_units),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: self.objectives.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

/// Drives one `SyntheticModel` per registered model name; a `RunConfig`
/// naming a model with no registered curve is a programmer error (panics),
/// matching the generators' own `assert!` discipline for malformed input.
#[derive(Debug, Clone, Default)]
pub struct MockProfiler {
    models: BTreeMap<String, SyntheticModel>,
}

impl MockProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: SyntheticModel) -> Self {
        self.models.insert(model.model_name.clone(), model);
        self
    }
}

impl Profiler for MockProfiler {
    async fn profile(&mut self, config: &RunConfig) -> SearchResult<RunConfigMeasurement> {
        let n = config.model_run_configs.len().max(1);
        let mut models = Vec::with_capacity(config.model_run_configs.len());
        for run_config in &config.model_run_configs {
            let synthetic = self
                .models
                .get(&run_config.model_name)
                .unwrap_or_else(|| panic!("MockProfiler has no SyntheticModel for '{}'", run_config.model_name));

            let (max_batch_size, instance_count) = match &run_config.server_config {
                search_types::ModelConfigVariant::Default => (run_config.client_config.batch_size, 1),
                search_types::ModelConfigVariant::Explicit(s) => {
                    (s.max_batch_size, s.instance_group.iter().map(|g| g.count).sum::<u32>().max(1))
                }
            };
            let load_units = match run_config.client_config.load {
                search_types::LoadSpec::Concurrency(c) => c,
                search_types::LoadSpec::RequestRate(r) => r,
            };

            models.push(synthetic.measure(max_batch_size, instance_count, load_units));
        }
        Ok(RunConfigMeasurement::with_weights(models, vec![1.0 / n as f64; n]))
    }
}
