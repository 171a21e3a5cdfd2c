use serde::{Deserialize, Serialize};

use crate::metrics::{Constraints, Objectives};
use crate::run_config::ServerConfig;

/// `run_config_search_mode` (§6 configuration file surface).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Quick,
    Brute,
    Optuna,
}

/// Global `run_config_search_*` knobs plus the early-exit switch. Per-model
/// overrides live on `ModelProfileSpec` and win when present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalSearchConfig {
    pub run_config_search_mode: SearchMode,
    pub run_config_search_disable: bool,
    pub run_config_search_min_concurrency: u32,
    pub run_config_search_max_concurrency: u32,
    pub run_config_search_min_request_rate: u32,
    pub run_config_search_max_request_rate: u32,
    pub run_config_search_max_instance_count: u32,
    pub run_config_search_max_model_batch_size: u32,
    pub early_exit_enable: bool,
    pub objectives: Objectives,
    pub constraints: Constraints,
    /// Trial cap for `OptunaRunConfigGenerator` before it falls back to
    /// uniform sampling (§4.8b).
    pub optuna_max_trials: u32,
}

impl Default for GlobalSearchConfig {
    fn default() -> Self {
        Self {
            run_config_search_mode: SearchMode::default(),
            run_config_search_disable: false,
            run_config_search_min_concurrency: 1,
            run_config_search_max_concurrency: 1024,
            run_config_search_min_request_rate: 1,
            run_config_search_max_request_rate: 1024,
            run_config_search_max_instance_count: 5,
            run_config_search_max_model_batch_size: 128,
            early_exit_enable: true,
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints::default(),
            optuna_max_trials: 50,
        }
    }
}

/// Per-model constraints for the client-side sweep: `batch_sizes`,
/// `concurrency`, and `request_rate` mirror the original's
/// `model_parameters` dict. `concurrency` and `request_rate` are mutually
/// exclusive; an empty list means "let the search engine generate one".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModelParameters {
    pub batch_sizes: Vec<u32>,
    pub concurrency: Vec<u32>,
    pub request_rate: Vec<u32>,
}

impl ModelParameters {
    pub fn is_request_rate_specified(&self) -> bool {
        !self.request_rate.is_empty()
    }
}

/// Full per-model profiling spec: which parameters to sweep, whether the
/// model is CPU-only or served remotely, manual server-config overrides, and
/// any per-model objective/constraint/weight overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelProfileSpec {
    pub model_name: String,
    pub cpu_only: bool,
    pub remote_mode: bool,
    pub parameters: ModelParameters,
    pub model_config_parameters: Option<Vec<ServerConfig>>,
    pub perf_analyzer_flags: std::collections::BTreeMap<String, String>,
    pub objectives: Option<Objectives>,
    pub constraints: Option<Constraints>,
    pub weight: f64,
}

impl Default for ModelProfileSpec {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            cpu_only: false,
            remote_mode: false,
            parameters: ModelParameters::default(),
            model_config_parameters: None,
            perf_analyzer_flags: Default::default(),
            objectives: None,
            constraints: None,
            weight: 1.0,
        }
    }
}

/// Top-level profiling request: the models to search, plus global search
/// settings. This is the contract `search-cli` deserializes from YAML and
/// the contract `search-core`'s orchestrator consumes; `search-core` never
/// parses YAML itself (§1 out-of-scope collaborators).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProfileConfig {
    pub global: GlobalSearchConfig,
    pub models: Vec<ModelProfileSpec>,
}
