//! `CommandLineProfiler`: the real `Profiler`, spawning `perf_analyzer` as a
//! subprocess per model in a `RunConfig` (grounded in
//! `perf_analyzer.py`'s `PerfAnalyzer.run_job`/`_run_perf_analyzer`, which
//! shells out via `subprocess.check_output` and reads back the `-f` CSV
//! report). Applying the server-side config to the inference server itself
//! is out of scope here — this profiler only drives the client-side load
//! generator and assumes the server is already serving the requested
//! config.

use std::path::PathBuf;

use tracing::{debug, warn};

use search_types::{
    Constraints, ModelConfigSummary, ModelMeasurement, Objectives, RunConfig, RunConfigMeasurement,
    SearchError, SearchResult,
};

use crate::args::{build_args, PerfAnalyzerSettings};
use crate::csv_parse::parse_csv_report;
use crate::Profiler;

/// Per-model objective/constraint declaration, supplied once at CLI startup
/// from the profile config and reused for every `RunConfig` the search
/// engine drives through this profiler.
#[derive(Debug, Clone)]
pub struct ProfilerModelSpec {
    pub model_name: String,
    pub objectives: Objectives,
    pub constraints: Constraints,
}

/// Drives the real `perf_analyzer` binary, one subprocess per model per
/// `RunConfig`, parsing its CSV report into a `RunConfigMeasurement`.
pub struct CommandLineProfiler {
    binary_path: PathBuf,
    settings: PerfAnalyzerSettings,
    model_specs: Vec<ProfilerModelSpec>,
}

impl CommandLineProfiler {
    pub fn new(
        binary_path: impl Into<PathBuf>,
        settings: PerfAnalyzerSettings,
        model_specs: Vec<ProfilerModelSpec>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            settings,
            model_specs,
        }
    }

    fn spec_for(&self, model_name: &str) -> SearchResult<&ProfilerModelSpec> {
        self.model_specs
            .iter()
            .find(|s| s.model_name == model_name)
            .ok_or_else(|| SearchError::InvalidConfiguration {
                reason: format!("no ProfilerModelSpec registered for model '{model_name}'"),
                fingerprint: model_name.to_string(),
            })
    }
}

impl Profiler for CommandLineProfiler {
    async fn profile(&mut self, config: &RunConfig) -> SearchResult<RunConfigMeasurement> {
        let n = config.model_run_configs.len().max(1);
        let mut models = Vec::with_capacity(config.model_run_configs.len());
        let mut weights = Vec::with_capacity(config.model_run_configs.len());

        for run_config in &config.model_run_configs {
            let spec = self.spec_for(&run_config.model_name)?;
            let args = build_args(&run_config.model_name, &run_config.client_config, &self.settings);

            debug!(model = %run_config.model_name, ?args, "spawning perf_analyzer");

            let output = tokio::process::Command::new(&self.binary_path)
                .args(&args)
                .output()
                .await
                .map_err(|e| SearchError::MeasurementFailure {
                    fingerprint: config.fingerprint(),
                    reason: format!("failed to spawn perf_analyzer: {e}"),
                })?;

            if !output.status.success() {
                warn!(
                    model = %run_config.model_name,
                    status = ?output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "perf_analyzer exited non-zero"
                );
                return Err(SearchError::MeasurementFailure {
                    fingerprint: config.fingerprint(),
                    reason: format!(
                        "perf_analyzer exited with {:?} for model '{}'",
                        output.status, run_config.model_name
                    ),
                });
            }

            let report = tokio::fs::read_to_string(&self.settings.latency_report_file)
                .await
                .map_err(|e| SearchError::MeasurementFailure {
                    fingerprint: config.fingerprint(),
                    reason: format!("failed to read perf_analyzer report: {e}"),
                })?;
            let non_gpu_metrics = parse_csv_report(&report, &config.fingerprint())?;

            let instance_count = match &run_config.server_config {
                search_types::ModelConfigVariant::Default => 1,
                search_types::ModelConfigVariant::Explicit(s) => {
                    s.instance_group.iter().map(|g| g.count).sum::<u32>().max(1)
                }
            };
            let max_batch_size = match &run_config.server_config {
                search_types::ModelConfigVariant::Default => run_config.client_config.batch_size,
                search_types::ModelConfigVariant::Explicit(s) => s.max_batch_size,
            };
            let (concurrency, request_rate) = match run_config.client_config.load {
                search_types::LoadSpec::Concurrency(c) => (Some(c), None),
                search_types::LoadSpec::RequestRate(r) => (None, Some(r)),
            };

            models.push(ModelMeasurement {
                model_name: run_config.model_name.clone(),
                config: ModelConfigSummary {
                    max_batch_size,
                    instance_count,
                    concurrency,
                    request_rate,
                },
                non_gpu_metrics,
                gpu_metrics: Default::default(),
                objectives: spec.objectives.clone(),
                constraints: spec.constraints.clone(),
            });
            weights.push(1.0 / n as f64);
        }

        Ok(RunConfigMeasurement::with_weights(models, weights))
    }
}
