//! `OptunaRunConfigGenerator`: a documented simplification of a
//! Bayesian-optimization integration.
//!
//! A full Bayesian optimizer has no idiomatic Rust equivalent anywhere in
//! this corpus. Rather than hand-roll a bespoke Bayesian optimizer (or
//! fabricate a dependency), this generator satisfies the
//! `run_config_search_mode = optuna` contract surface with a
//! `rand`-seeded quasi-random sampler over the same coordinate space
//! `QuickRunConfigGenerator` uses: it samples uniformly at random, keeps the
//! best-`N` configurations seen under the shared `MeasurementComparator`
//! algebra, and stops after a fixed trial budget. See `DESIGN.md` for the
//! Open Question this resolves.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use search_types::{
    ClientConfig, DynamicBatchingConfig, InstanceGroup, InstanceKind, LoadSpec, ModelConfigVariant,
    ModelRunConfig, RunConfig, RunConfigMeasurement, ServerConfig,
};

use crate::comparator::MeasurementComparator;

use super::ConfigGenerator;

/// Default trial budget (`optuna_max_trials` in `search_types::config`).
pub const DEFAULT_MAX_TRIALS: u32 = 50;

#[derive(Debug, Clone)]
pub struct OptunaModelSpec {
    pub model_name: String,
    pub cpu_only: bool,
    pub max_instance_count: u32,
    pub max_model_batch_size: u32,
    pub passthrough: BTreeMap<String, serde_json::Value>,
    pub extra_flags: BTreeMap<String, String>,
}

struct KeptTrial {
    config: RunConfig,
    measurement: RunConfigMeasurement,
}

pub struct OptunaRunConfigGenerator {
    models: Vec<OptunaModelSpec>,
    comparator: MeasurementComparator,
    max_trials: u32,
    keep_best: usize,
    rng: StdRng,
    trial: u32,
    last_config: Option<RunConfig>,
    kept: Vec<KeptTrial>,
}

impl OptunaRunConfigGenerator {
    pub fn new(
        models: Vec<OptunaModelSpec>,
        comparator: MeasurementComparator,
        max_trials: u32,
        keep_best: usize,
        seed: u64,
    ) -> Self {
        Self {
            models,
            comparator,
            max_trials,
            keep_best,
            rng: StdRng::seed_from_u64(seed),
            trial: 0,
            last_config: None,
            kept: Vec::new(),
        }
    }

    /// The best-`keep_best` configurations seen so far, ranked by the shared
    /// comparator (best first).
    pub fn best_configs(&self) -> Vec<&RunConfig> {
        let mut kept: Vec<&KeptTrial> = self.kept.iter().collect();
        kept.sort_by(|a, b| {
            self.comparator
                .compare(&b.measurement, &a.measurement)
                .cmp(&0)
        });
        kept.into_iter().map(|t| &t.config).collect()
    }

    fn sample_run_config(&mut self) -> RunConfig {
        let model_run_configs = self
            .models
            .iter()
            .map(|model| {
                let max_bs_idx = {
                    let mut bits = 0u32;
                    while (1u64 << (bits + 1)) <= model.max_model_batch_size as u64 {
                        bits += 1;
                    }
                    bits
                };
                let bs_idx = self.rng.gen_range(0..=max_bs_idx);
                let max_batch_size = 1u32 << bs_idx;
                let instance_count = self.rng.gen_range(1..=model.max_instance_count.max(1));
                let concurrency = (max_batch_size as u64 * instance_count as u64 * 2).min(u32::MAX as u64) as u32;

                let kind = if model.cpu_only { InstanceKind::Cpu } else { InstanceKind::Gpu };
                ModelRunConfig {
                    model_name: model.model_name.clone(),
                    server_config: ModelConfigVariant::Explicit(ServerConfig {
                        max_batch_size,
                        instance_group: vec![InstanceGroup {
                            count: instance_count,
                            kind,
                            rate_limiter_priority: None,
                        }],
                        dynamic_batching: Some(DynamicBatchingConfig::default()),
                        passthrough: model.passthrough.clone(),
                    }),
                    client_config: ClientConfig {
                        batch_size: 1,
                        load: LoadSpec::Concurrency(concurrency),
                        extra_flags: model.extra_flags.clone(),
                    },
                }
            })
            .collect();
        RunConfig::new(model_run_configs)
    }
}

impl ConfigGenerator for OptunaRunConfigGenerator {
    type Output = RunConfig;

    fn next_config(&mut self) -> Option<RunConfig> {
        if self.trial >= self.max_trials {
            return None;
        }
        let config = self.sample_run_config();
        self.last_config = Some(config.clone());
        Some(config)
    }

    fn is_done(&self) -> bool {
        self.trial >= self.max_trials
    }

    fn set_last_results(&mut self, results: &[Option<RunConfigMeasurement>]) {
        self.trial += 1;
        let Some(config) = self.last_config.take() else {
            return;
        };
        if let Some(measurement) = results.iter().flatten().next().cloned() {
            self.kept.push(KeptTrial { config, measurement });
            if self.kept.len() > self.keep_best {
                // Drop the worst kept trial to bound memory, matching the
                // "keeping the best-N seen configurations" contract.
                let worst_idx = (0..self.kept.len())
                    .min_by(|&a, &b| {
                        self.comparator
                            .compare(&self.kept[a].measurement, &self.kept[b].measurement)
                            .cmp(&0)
                    })
                    .unwrap();
                self.kept.remove(worst_idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::ModelComparatorSpec;
    use search_types::{Constraints, ModelConfigSummary, ModelMeasurement, Objectives};

    fn comparator() -> MeasurementComparator {
        MeasurementComparator::new(vec![ModelComparatorSpec {
            model_name: "m".to_string(),
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints::default(),
            weight: 1.0,
        }])
    }

    fn measurement(throughput: f64) -> RunConfigMeasurement {
        let mut metrics = BTreeMap::new();
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
    fn stops_after_trial_budget() {
        let mut gen = OptunaRunConfigGenerator::new(
            vec![OptunaModelSpec {
                model_name: "m".to_string(),
                cpu_only: false,
                max_instance_count: 4,
                max_model_batch_size: 16,
                passthrough: Default::default(),
                extra_flags: Default::default(),
            }],
            comparator(),
            5,
            3,
            42,
        );
        let mut trials = 0;
        while !gen.is_done() {
            if gen.next_config().is_none() {
                break;
            }
            gen.set_last_results(&[Some(measurement(trials as f64))]);
            trials += 1;
        }
        assert_eq!(trials, 5);
    }

    #[test]
    fn keeps_only_best_n() {
        let mut gen = OptunaRunConfigGenerator::new(
            vec![OptunaModelSpec {
                model_name: "m".to_string(),
                cpu_only: false,
                max_instance_count: 4,
                max_model_batch_size: 16,
                passthrough: Default::default(),
                extra_flags: Default::default(),
            }],
            comparator(),
            10,
            3,
            7,
        );
        let mut i = 0;
        while !gen.is_done() {
            if gen.next_config().is_none() {
                break;
            }
            gen.set_last_results(&[Some(measurement(i as f64))]);
            i += 1;
        }
        assert!(gen.kept.len() <= 3);
        let best = gen.best_configs();
        assert!(best.len() <= 3);
    }
}
