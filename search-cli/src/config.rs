//! YAML configuration surface.
//!
//! `search-core` never parses YAML; this module is the one place a
//! [`search_types::ProfileConfig`] gets validated and turned into the
//! concrete generator, comparator, and profiler wiring `RunSearch` drives.
//! Full schema validation (every key, every type) is out of scope here, but
//! the documented invalid combinations are rejected with
//! `SearchError::InvalidConfiguration`.

use std::collections::BTreeMap;
use std::path::Path;

use search_core::comparator::ModelComparatorSpec;
use search_core::generators::model_config::ModelConfigGenerator;
use search_core::generators::optuna::OptunaModelSpec;
use search_core::generators::perf_analyzer::{ParameterKind, PerfAnalyzerConfigGenerator};
use search_core::generators::quick::QuickModelSpec;
use search_core::MeasurementComparator;
use search_types::{ProfileConfig, SearchError, SearchMode, SearchResult};

/// Loads and parses a `ProfileConfig` from a YAML file, then validates it;
/// an invalid config is fatal at startup.
pub fn load(path: &Path) -> anyhow::Result<ProfileConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let config: ProfileConfig = serde_yaml::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse YAML config {}: {e}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

/// Rejects combinations the core search engine cannot honor: quick mode
/// cannot sweep an explicit concurrency/request-rate list (it derives
/// concurrency from the coordinate, never from a user list), and quick mode
/// cannot search a remote-mode model (it has no server-side config to move).
fn validate(config: &ProfileConfig) -> SearchResult<()> {
    if config.models.is_empty() {
        return Err(SearchError::InvalidConfiguration {
            reason: "at least one model is required".to_string(),
            fingerprint: "<config>".to_string(),
        });
    }

    for model in &config.models {
        if model.model_name.is_empty() {
            return Err(SearchError::InvalidConfiguration {
                reason: "model_name must not be empty".to_string(),
                fingerprint: "<config>".to_string(),
            });
        }
        if !model.parameters.concurrency.is_empty() && !model.parameters.request_rate.is_empty() {
            return Err(SearchError::InvalidConfiguration {
                reason: "concurrency and request_rate are mutually exclusive".to_string(),
                fingerprint: model.model_name.clone(),
            });
        }
        if config.global.run_config_search_mode == SearchMode::Quick {
            if !model.parameters.concurrency.is_empty() || !model.parameters.request_rate.is_empty()
            {
                return Err(SearchError::InvalidConfiguration {
                    reason: "quick search mode derives concurrency from the coordinate and cannot accept an explicit top-level concurrency/request_rate list".to_string(),
                    fingerprint: model.model_name.clone(),
                });
            }
            if model.remote_mode {
                return Err(SearchError::InvalidConfiguration {
                    reason: "quick search mode requires server-side config control and cannot search a remote_mode model".to_string(),
                    fingerprint: model.model_name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// `[1, 2, 4, ..]` up to and including `max_value` — the default sweep when
/// no explicit parameter list is given.
pub fn doubled_list(max_value: u32) -> Vec<u32> {
    let mut out = Vec::new();
    let mut v = 1u32;
    while v <= max_value {
        out.push(v);
        v = v.saturating_mul(2);
    }
    out
}

/// One model's resolved objectives/constraints/weight, falling back to the
/// global declaration when the model does not override it.
pub fn comparator_spec(config: &ProfileConfig, model_name: &str) -> ModelComparatorSpec {
    let model = config
        .models
        .iter()
        .find(|m| m.model_name == model_name)
        .expect("model_name must be present in ProfileConfig.models");
    ModelComparatorSpec {
        model_name: model.model_name.clone(),
        objectives: model.objectives.clone().unwrap_or_else(|| config.global.objectives.clone()),
        constraints: model.constraints.clone().unwrap_or_else(|| config.global.constraints.clone()),
        weight: model.weight,
    }
}

pub fn build_comparator(config: &ProfileConfig) -> MeasurementComparator {
    let specs = config
        .models
        .iter()
        .map(|m| comparator_spec(config, &m.model_name))
        .collect();
    MeasurementComparator::new(specs)
}

/// Per-model spec for `QuickRunConfigGenerator`.
pub fn quick_model_spec(config: &ProfileConfig, model_name: &str) -> QuickModelSpec {
    let model = config
        .models
        .iter()
        .find(|m| m.model_name == model_name)
        .expect("model_name must be present in ProfileConfig.models");
    QuickModelSpec {
        model_name: model.model_name.clone(),
        cpu_only: model.cpu_only,
        max_instance_count: config.global.run_config_search_max_instance_count,
        max_model_batch_size: config.global.run_config_search_max_model_batch_size,
        passthrough: BTreeMap::new(),
        extra_flags: model.perf_analyzer_flags.clone(),
    }
}

pub fn optuna_model_spec(config: &ProfileConfig, model_name: &str) -> OptunaModelSpec {
    let quick = quick_model_spec(config, model_name);
    OptunaModelSpec {
        model_name: quick.model_name,
        cpu_only: quick.cpu_only,
        max_instance_count: quick.max_instance_count,
        max_model_batch_size: quick.max_model_batch_size,
        passthrough: quick.passthrough,
        extra_flags: quick.extra_flags,
    }
}

/// Builds the `ModelConfigGenerator` (automatic / manual / remote) for one
/// model in brute-search mode.
pub fn model_config_generator(config: &ProfileConfig, model_name: &str) -> ModelConfigGenerator {
    let model = config
        .models
        .iter()
        .find(|m| m.model_name == model_name)
        .expect("model_name must be present in ProfileConfig.models");

    if model.remote_mode {
        return ModelConfigGenerator::remote();
    }
    if config.global.run_config_search_disable {
        return ModelConfigGenerator::remote();
    }
    match &model.model_config_parameters {
        Some(variants) => ModelConfigGenerator::manual(variants.clone()),
        None => ModelConfigGenerator::automatic(
            config.global.run_config_search_max_instance_count,
            config.global.run_config_search_max_model_batch_size,
            model.cpu_only,
        ),
    }
}

/// Builds the `PerfAnalyzerConfigGenerator` for one model: user-specified
/// `batch_sizes`/`concurrency`/`request_rate` lists when given, else the
/// doubled-list default swept up to the global max.
pub fn perf_analyzer_generator(config: &ProfileConfig, model_name: &str) -> PerfAnalyzerConfigGenerator {
    let model = config
        .models
        .iter()
        .find(|m| m.model_name == model_name)
        .expect("model_name must be present in ProfileConfig.models");

    let batch_sizes = if model.parameters.batch_sizes.is_empty() {
        vec![1]
    } else {
        model.parameters.batch_sizes.clone()
    };

    let (parameters, kind) = if model.parameters.is_request_rate_specified() {
        (model.parameters.request_rate.clone(), ParameterKind::RequestRate)
    } else if !model.parameters.concurrency.is_empty() {
        (model.parameters.concurrency.clone(), ParameterKind::Concurrency)
    } else {
        (
            doubled_list(config.global.run_config_search_max_concurrency),
            ParameterKind::Concurrency,
        )
    };

    PerfAnalyzerConfigGenerator::new(
        batch_sizes,
        parameters,
        kind,
        config.global.early_exit_enable,
        model.perf_analyzer_flags.clone(),
    )
}
