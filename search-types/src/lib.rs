//! Shared domain types for the configuration search engine: run configs,
//! measurements, the configuration-file surface, and the crate-wide error
//! taxonomy. `search-core` and `profiler-client` both depend on this crate
//! instead of each other, so the search engine never has to know how a
//! `RunConfig` gets turned into a command line, and the profiler client never
//! has to know how a `RunConfig` gets generated.

pub mod config;
pub mod error;
pub mod metrics;
pub mod run_config;

pub use config::{GlobalSearchConfig, ModelParameters, ModelProfileSpec, ProfileConfig, SearchMode};
pub use error::{SearchError, SearchResult};
pub use metrics::{
    Constraints, ConstraintBound, Direction, GpuMetrics, ModelConfigSummary, ModelMeasurement,
    Objectives, RunConfigMeasurement,
};
pub use run_config::{
    ClientConfig, DynamicBatchingConfig, InstanceGroup, InstanceKind, LoadSpec, ModelConfigVariant,
    ModelRunConfig, RunConfig, ServerConfig,
};
