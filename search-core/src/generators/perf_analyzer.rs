//! `PerfAnalyzerConfigGenerator`: the client-side concurrency/request-rate ×
//! batch-size sweep for a single model.

use std::collections::BTreeMap;

use search_types::{ClientConfig, LoadSpec, RunConfigMeasurement};
use tracing::info;

use super::{throughput_gain_valid, ConfigGenerator};

/// Minimum consecutive parameter tries before an early exit is considered.
pub const N_PARAMETER: usize = 4;
/// Minimum consecutive batch-size tries before an early exit is considered.
pub const N_BATCH_SIZE: usize = 4;
/// Minimum relative throughput gain an early exit requires to keep going.
pub const GAIN_THRESHOLD: f64 = 0.05;

/// Whether `parameters` holds concurrency values or request-rate values.
/// Mutually exclusive; concurrency is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Concurrency,
    RequestRate,
}

pub struct PerfAnalyzerConfigGenerator {
    batch_sizes: Vec<u32>,
    parameters: Vec<u32>,
    parameter_kind: ParameterKind,
    early_exit_enable: bool,
    extra_flags: BTreeMap<String, String>,

    i_bs: usize,
    i_p: usize,
    parameter_throughput_history: Vec<f64>,
    batch_size_best_history: Vec<f64>,
    done: bool,
}

impl PerfAnalyzerConfigGenerator {
    pub fn new(
        batch_sizes: Vec<u32>,
        parameters: Vec<u32>,
        parameter_kind: ParameterKind,
        early_exit_enable: bool,
        extra_flags: BTreeMap<String, String>,
    ) -> Self {
        assert!(!batch_sizes.is_empty(), "batch_sizes must be non-empty");
        assert!(!parameters.is_empty(), "parameters must be non-empty");
        Self {
            batch_sizes,
            parameters,
            parameter_kind,
            early_exit_enable,
            extra_flags,
            i_bs: 0,
            i_p: 0,
            parameter_throughput_history: Vec::new(),
            batch_size_best_history: Vec::new(),
            done: false,
        }
    }

    fn load_spec(&self, parameter: u32) -> LoadSpec {
        match self.parameter_kind {
            ParameterKind::Concurrency => LoadSpec::Concurrency(parameter),
            ParameterKind::RequestRate => LoadSpec::RequestRate(parameter),
        }
    }

    fn current_config(&self) -> Option<ClientConfig> {
        let bs = *self.batch_sizes.get(self.i_bs)?;
        let p = *self.parameters.get(self.i_p)?;
        Some(ClientConfig {
            batch_size: bs,
            load: self.load_spec(p),
            extra_flags: self.extra_flags.clone(),
        })
    }

    /// The full batch_size × parameter product this generator would walk
    /// with early exit disabled. Used by `BruteRunConfigGenerator` to build
    /// its per-model sweep without driving this generator's adaptive cursor.
    pub fn all_client_configs(&self) -> Vec<ClientConfig> {
        let mut out = Vec::with_capacity(self.batch_sizes.len() * self.parameters.len());
        for bs in &self.batch_sizes {
            for p in &self.parameters {
                out.push(ClientConfig {
                    batch_size: *bs,
                    load: self.load_spec(*p),
                    extra_flags: self.extra_flags.clone(),
                });
            }
        }
        out
    }

    fn finish_parameter_sweep(&mut self) {
        let best = self
            .parameter_throughput_history
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        if best.is_finite() {
            self.batch_size_best_history.push(best);
        }
        self.parameter_throughput_history.clear();
        self.i_p = 0;
        self.i_bs += 1;

        let gain_ok = throughput_gain_valid(&self.batch_size_best_history, N_BATCH_SIZE, GAIN_THRESHOLD);
        if self.i_bs >= self.batch_sizes.len() || (self.early_exit_enable && !gain_ok) {
            if self.early_exit_enable && !gain_ok && self.i_bs < self.batch_sizes.len() {
                info!("perf-analyzer sweep early-exit: batch-size throughput gain below threshold");
            }
            self.done = true;
        }
    }
}

impl ConfigGenerator for PerfAnalyzerConfigGenerator {
    type Output = ClientConfig;

    fn next_config(&mut self) -> Option<ClientConfig> {
        if self.done {
            return None;
        }
        self.current_config()
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn set_last_results(&mut self, results: &[Option<RunConfigMeasurement>]) {
        if self.done {
            return;
        }
        let best = results
            .iter()
            .flatten()
            .map(RunConfigMeasurement::perf_throughput)
            .fold(None, |acc: Option<f64>, t| {
                Some(acc.map_or(t, |a| a.max(t)))
            });

        match best {
            Some(t) => {
                self.parameter_throughput_history.push(t);
                self.i_p += 1;
                let gain_ok =
                    throughput_gain_valid(&self.parameter_throughput_history, N_PARAMETER, GAIN_THRESHOLD);
                if self.i_p >= self.parameters.len() || (self.early_exit_enable && !gain_ok) {
                    self.finish_parameter_sweep();
                }
            }
            None => {
                // Erroneous last result: the sub-sweep ends here.
                self.finish_parameter_sweep();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_types::{Constraints, ModelConfigSummary, ModelMeasurement, Objectives};

    fn flat_measurement(throughput: f64) -> Option<RunConfigMeasurement> {
        let mut metrics = BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        Some(RunConfigMeasurement::new(vec![ModelMeasurement {
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
        }]))
    }

    #[test]
    fn scenario_d_flat_throughput_early_exit() {
        let mut gen = PerfAnalyzerConfigGenerator::new(
            vec![1, 2, 4, 8],
            vec![1, 2, 4, 8],
            ParameterKind::Concurrency,
            true,
            BTreeMap::new(),
        );
        let mut measurements = 0;
        while !gen.is_done() {
            let cfg = gen.next_config();
            if cfg.is_none() {
                break;
            }
            gen.set_last_results(&[flat_measurement(100.0)]);
            measurements += 1;
            assert!(measurements <= 16, "must not exceed the full product");
        }
        assert!(gen.is_done());
        assert_eq!(measurements, 16);
    }

    #[test]
    fn erroneous_result_ends_sweep_early() {
        let mut gen = PerfAnalyzerConfigGenerator::new(
            vec![1, 2],
            vec![1, 2, 4, 8],
            ParameterKind::Concurrency,
            false,
            BTreeMap::new(),
        );
        let _ = gen.next_config();
        gen.set_last_results(&[flat_measurement(10.0)]);
        let _ = gen.next_config();
        gen.set_last_results(&[None]);
        // Erroneous result at i_p=1 should end this batch size's sweep and
        // move on, not retry the same parameter.
        assert_eq!(gen.i_bs, 1);
        assert_eq!(gen.i_p, 0);
    }

    #[test]
    fn without_early_exit_runs_full_product() {
        let mut gen = PerfAnalyzerConfigGenerator::new(
            vec![1, 2],
            vec![1, 2, 4],
            ParameterKind::Concurrency,
            false,
            BTreeMap::new(),
        );
        let mut measurements = 0;
        while !gen.is_done() {
            if gen.next_config().is_none() {
                break;
            }
            gen.set_last_results(&[flat_measurement(100.0)]);
            measurements += 1;
        }
        assert_eq!(measurements, 6);
    }
}
