use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InstanceKind {
    Gpu,
    Cpu,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceGroup {
    pub count: u32,
    pub kind: InstanceKind,
    pub rate_limiter_priority: Option<u32>,
}

/// Empty `preferred_batch_size` means "dynamic batching enabled with
/// defaults", matching the original's `dynamic_batching: {}` sentinel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DynamicBatchingConfig {
    pub preferred_batch_size: Vec<u32>,
}

/// One server-side model configuration. `None` (see `ModelConfigVariant`)
/// represents "use the model's default config as-is".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub max_batch_size: u32,
    pub instance_group: Vec<InstanceGroup>,
    pub dynamic_batching: Option<DynamicBatchingConfig>,
    /// Fields the generator did not model explicitly (e.g. rate limiting
    /// resources, optimization hints) carried through unmodified from the
    /// model's base config.
    pub passthrough: BTreeMap<String, serde_json::Value>,
}

impl ServerConfig {
    pub fn fingerprint(&self) -> String {
        let instance_count: u32 = self.instance_group.iter().map(|g| g.count).sum();
        let mut s = format!(
            "max_batch_size={},instance_count={}",
            self.max_batch_size, instance_count
        );
        if let Some(db) = &self.dynamic_batching {
            if !db.preferred_batch_size.is_empty() {
                s.push_str(&format!(
                    ",preferred_batch_size={:?}",
                    db.preferred_batch_size
                ));
            } else {
                s.push_str(",dynamic_batching=enabled");
            }
        }
        for (k, v) in &self.passthrough {
            s.push_str(&format!(",{}={}", k, v));
        }
        s
    }
}

/// `ModelConfigVariant::Default` is the "use the model's base config as-is"
/// sentinel the original represents as a bare `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ModelConfigVariant {
    Default,
    Explicit(ServerConfig),
}

impl ModelConfigVariant {
    pub fn fingerprint(&self) -> String {
        match self {
            ModelConfigVariant::Default => "default".to_string(),
            ModelConfigVariant::Explicit(c) => c.fingerprint(),
        }
    }
}

/// Client-side load specification; concurrency and request-rate are mutually
/// exclusive, matching `PerfAnalyzerConfigGenerator`'s parameter list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum LoadSpec {
    Concurrency(u32),
    RequestRate(u32),
}

impl LoadSpec {
    pub fn fingerprint(&self) -> String {
        match self {
            LoadSpec::Concurrency(c) => format!("concurrency={}", c),
            LoadSpec::RequestRate(r) => format!("request_rate={}", r),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub batch_size: u32,
    pub load: LoadSpec,
    /// Extra load-generator flags, keyed by flag name without leading dashes.
    /// These override any core-computed flag with the same key (§6).
    pub extra_flags: BTreeMap<String, String>,
}

impl ClientConfig {
    pub fn fingerprint(&self) -> String {
        format!("batch_size={},{}", self.batch_size, self.load.fingerprint())
    }
}

/// Pairs one server-side configuration with one client-side load
/// specification for a single model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRunConfig {
    pub model_name: String,
    pub server_config: ModelConfigVariant,
    pub client_config: ClientConfig,
}

impl ModelRunConfig {
    pub fn fingerprint(&self) -> String {
        format!(
            "model={};server={};client={}",
            self.model_name,
            self.server_config.fingerprint(),
            self.client_config.fingerprint()
        )
    }
}

/// A fully-specified profiling job: one `ModelRunConfig` per model in the
/// search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub model_run_configs: Vec<ModelRunConfig>,
}

impl RunConfig {
    pub fn new(model_run_configs: Vec<ModelRunConfig>) -> Self {
        Self { model_run_configs }
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.model_run_configs
            .iter()
            .map(|c| c.model_name.as_str())
            .collect()
    }

    /// Deterministic fingerprint used as the checkpoint lookup key (§6):
    /// per-model fingerprints concatenated in declaration order.
    pub fn fingerprint(&self) -> String {
        self.model_run_configs
            .iter()
            .map(|c| c.fingerprint())
            .collect::<Vec<_>>()
            .join("|")
    }
}
