//! `BruteRunConfigGenerator`: the full Cartesian product of
//! `ModelConfigGenerator` outputs × `PerfAnalyzerConfigGenerator` outputs for
//! each model, outer-producted across models. Early exit is disabled by
//! default at this level — each model's `PerfAnalyzerConfigGenerator` is
//! built with `early_exit_enable = false`, which degenerates its adaptive
//! cursor into a complete enumeration (its gain check never fires), so the
//! per-model combo list below is exactly what that generator would walk.

use search_types::{ModelConfigVariant, ModelRunConfig, RunConfig, RunConfigMeasurement};

use super::model_config::ModelConfigGenerator;
use super::perf_analyzer::PerfAnalyzerConfigGenerator;
use super::ConfigGenerator;

/// One model's flattened `(server variant, client config)` product.
struct PerModelSweep {
    model_name: String,
    combos: Vec<(ModelConfigVariant, search_types::ClientConfig)>,
}

pub struct BruteRunConfigGenerator {
    sweeps: Vec<PerModelSweep>,
    /// Mixed-radix cursor, one digit per model, each in `[0,
    /// sweeps[i].combos.len())`.
    cursor: Vec<usize>,
    done: bool,
}

impl BruteRunConfigGenerator {
    pub fn new(
        per_model: Vec<(String, ModelConfigGenerator, PerfAnalyzerConfigGenerator)>,
    ) -> Self {
        let sweeps: Vec<PerModelSweep> = per_model
            .into_iter()
            .map(|(model_name, model_gen, perf_gen)| {
                let variants = model_gen.variants().to_vec();
                let client_configs = perf_gen.all_client_configs();
                let mut combos = Vec::with_capacity(variants.len() * client_configs.len());
                for v in &variants {
                    for c in &client_configs {
                        combos.push((v.clone(), c.clone()));
                    }
                }
                PerModelSweep { model_name, combos }
            })
            .collect();

        let done = sweeps.iter().any(|s| s.combos.is_empty());
        let cursor = vec![0; sweeps.len()];
        Self { sweeps, cursor, done }
    }

    fn current_run_config(&self) -> RunConfig {
        let model_run_configs = self
            .sweeps
            .iter()
            .zip(self.cursor.iter())
            .map(|(sweep, &idx)| {
                let (server_config, client_config) = sweep.combos[idx].clone();
                ModelRunConfig {
                    model_name: sweep.model_name.clone(),
                    server_config,
                    client_config,
                }
            })
            .collect();
        RunConfig::new(model_run_configs)
    }

    /// Odometer increment over the mixed-radix cursor; returns `false` once
    /// every combination has been produced.
    fn advance_cursor(&mut self) -> bool {
        for i in (0..self.cursor.len()).rev() {
            self.cursor[i] += 1;
            if self.cursor[i] < self.sweeps[i].combos.len() {
                return true;
            }
            self.cursor[i] = 0;
        }
        false
    }
}

impl ConfigGenerator for BruteRunConfigGenerator {
    type Output = RunConfig;

    fn next_config(&mut self) -> Option<RunConfig> {
        if self.done {
            return None;
        }
        Some(self.current_run_config())
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn set_last_results(&mut self, _results: &[Option<RunConfigMeasurement>]) {
        if self.done {
            return;
        }
        if !self.advance_cursor() {
            self.done = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::perf_analyzer::ParameterKind;
    use std::collections::BTreeMap;

    #[test]
    fn single_model_product_size() {
        let model_gen = ModelConfigGenerator::automatic(2, 8, false); // 3 variants (2 + default)
        let perf_gen = PerfAnalyzerConfigGenerator::new(
            vec![1, 2],
            vec![1, 2, 4],
            ParameterKind::Concurrency,
            false,
            BTreeMap::new(),
        );
        let mut gen = BruteRunConfigGenerator::new(vec![("m".to_string(), model_gen, perf_gen)]);
        let mut count = 0;
        while !gen.is_done() {
            if gen.next_config().is_none() {
                break;
            }
            gen.set_last_results(&[None]);
            count += 1;
        }
        assert_eq!(count, 3 * 2 * 3);
    }

    #[test]
    fn multi_model_outer_product() {
        let a_model = ModelConfigGenerator::remote(); // 1 variant
        let a_perf = PerfAnalyzerConfigGenerator::new(
            vec![1],
            vec![1, 2],
            ParameterKind::Concurrency,
            false,
            BTreeMap::new(),
        );
        let b_model = ModelConfigGenerator::remote();
        let b_perf = PerfAnalyzerConfigGenerator::new(
            vec![1, 2],
            vec![1],
            ParameterKind::Concurrency,
            false,
            BTreeMap::new(),
        );
        let mut gen = BruteRunConfigGenerator::new(vec![
            ("a".to_string(), a_model, a_perf),
            ("b".to_string(), b_model, b_perf),
        ]);
        let mut count = 0;
        while !gen.is_done() {
            if gen.next_config().is_none() {
                break;
            }
            gen.set_last_results(&[None]);
            count += 1;
        }
        // a: 1*2 = 2 combos, b: 2*1 = 2 combos -> outer product = 4
        assert_eq!(count, 4);
    }
}
