//! Dispatches `SearchMode` to one of the three top-level `ConfigGenerator`s
//! behind a single `Output = RunConfig` type, so `RunSearch<G, P>` stays
//! monomorphic over a single concrete `G` regardless of which mode the
//! config file selects.

use search_core::generators::brute::BruteRunConfigGenerator;
use search_core::generators::optuna::OptunaRunConfigGenerator;
use search_core::generators::quick::QuickRunConfigGenerator;
use search_core::{ConfigGenerator, MeasurementComparator};
use search_types::{ProfileConfig, RunConfig, RunConfigMeasurement, SearchMode};

use crate::config;

/// Default neighborhood radius.
pub const DEFAULT_RADIUS: f64 = 2.0;
/// Default minimum-initialized threshold before a step may be taken.
pub const DEFAULT_MIN_INITIALIZED: usize = 3;
/// Default step magnitude before `magnitude_scaler` decay.
pub const DEFAULT_BASE_MAGNITUDE: f64 = 5.0;
/// Default clip bound for `calculate_new_coordinate`'s step vector.
pub const DEFAULT_CLIP_VALUE: i64 = 2;
/// Default kept-best count for Optuna mode.
pub const DEFAULT_OPTUNA_KEEP_BEST: usize = 10;

pub enum SearchGenerator {
    Quick(QuickRunConfigGenerator),
    Brute(BruteRunConfigGenerator),
    Optuna(OptunaRunConfigGenerator),
}

impl ConfigGenerator for SearchGenerator {
    type Output = RunConfig;

    fn next_config(&mut self) -> Option<RunConfig> {
        match self {
            SearchGenerator::Quick(g) => g.next_config(),
            SearchGenerator::Brute(g) => g.next_config(),
            SearchGenerator::Optuna(g) => g.next_config(),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            SearchGenerator::Quick(g) => g.is_done(),
            SearchGenerator::Brute(g) => g.is_done(),
            SearchGenerator::Optuna(g) => g.is_done(),
        }
    }

    fn set_last_results(&mut self, results: &[Option<RunConfigMeasurement>]) {
        match self {
            SearchGenerator::Quick(g) => g.set_last_results(results),
            SearchGenerator::Brute(g) => g.set_last_results(results),
            SearchGenerator::Optuna(g) => g.set_last_results(results),
        }
    }
}

/// Builds the generator for `config.global.run_config_search_mode`, wiring
/// each model's resolved parameters via the `search-cli::config` helpers.
pub fn build(config: &ProfileConfig, comparator: &MeasurementComparator) -> SearchGenerator {
    match config.global.run_config_search_mode {
        SearchMode::Quick => {
            let models = config
                .models
                .iter()
                .map(|m| self::config::quick_model_spec(config, &m.model_name))
                .collect();
            SearchGenerator::Quick(QuickRunConfigGenerator::new(
                models,
                DEFAULT_RADIUS,
                DEFAULT_MIN_INITIALIZED,
                DEFAULT_BASE_MAGNITUDE,
                true,
                DEFAULT_CLIP_VALUE,
            ))
        }
        SearchMode::Brute => {
            let per_model = config
                .models
                .iter()
                .map(|m| {
                    let model_gen = self::config::model_config_generator(config, &m.model_name);
                    let perf_gen = self::config::perf_analyzer_generator(config, &m.model_name);
                    (m.model_name.clone(), model_gen, perf_gen)
                })
                .collect();
            SearchGenerator::Brute(BruteRunConfigGenerator::new(per_model))
        }
        SearchMode::Optuna => {
            let models = config
                .models
                .iter()
                .map(|m| self::config::optuna_model_spec(config, &m.model_name))
                .collect();
            SearchGenerator::Optuna(OptunaRunConfigGenerator::new(
                models,
                comparator.clone(),
                config.global.optuna_max_trials,
                DEFAULT_OPTUNA_KEEP_BEST,
                42,
            ))
        }
    }
}
