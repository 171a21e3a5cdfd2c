//! The external-collaborator boundary: turning a `RunConfig` into a
//! load-generator command line and a `RunConfigMeasurement`. Model
//! repository manipulation and inference-server process supervision stay out
//! of scope — only the request/response contract is implemented here.
//!
//! Two `Profiler` implementations ship: `CommandLineProfiler`, which spawns
//! the real `perf_analyzer` binary via `tokio::process::Command`, and
//! `MockProfiler`, a deterministic fake used by `search-core`'s tests and by
//! demos that don't have an inference server handy.

pub mod args;
pub mod command_line;
pub mod csv_parse;
pub mod mock;

pub use args::{MeasurementMode, PerfAnalyzerSettings, Protocol, SslSettings};
pub use command_line::{CommandLineProfiler, ProfilerModelSpec};
pub use mock::{MockProfiler, SyntheticModel};

use search_types::{RunConfig, RunConfigMeasurement, SearchResult};

/// The profiling collaborator `search-core::orchestrator::RunSearch` drives:
/// apply the server-side config, run the load generator, and return a
/// measurement or a failure.
pub trait Profiler {
    /// Applies `config`'s server-side settings and runs the load generator
    /// against them, returning the resulting measurement. An `Err` is
    /// surfaced by the orchestrator as a `MeasurementFailure` and degrades
    /// the active generator's current sub-sweep.
    async fn profile(&mut self, config: &RunConfig) -> SearchResult<RunConfigMeasurement>;
}
