//! Thin binary wiring: loads a YAML profiling config, builds a
//! `MeasurementComparator` and generator per the configured search mode, and
//! drives `RunSearch` to completion against a `Profiler`, printing a ranked
//! summary of the best configurations found.
//!
//! CSV/PDF export and full YAML schema validation stay out of scope — this
//! binary accepts the documented key set (`search_cli::config`) and prints a
//! plain-text ranked summary.

mod config;
mod generator;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use profiler_client::{CommandLineProfiler, MockProfiler, ProfilerModelSpec, SyntheticModel};
use search_core::{CancellationToken, RunSearch, StateManager};
use search_types::ProfileConfig;

#[derive(Parser, Debug)]
#[command(name = "search-cli")]
#[command(about = "Search runtime configurations for ML inference models served by an inference server")]
#[command(version)]
struct Args {
    /// Path to the YAML profiling config (search_cli::config::load).
    #[arg(short, long)]
    config: PathBuf,

    /// Directory checkpoints are read from / written to.
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,

    /// Path to the perf_analyzer binary. When absent, a deterministic
    /// MockProfiler drives the search instead of a real load generator —
    /// useful for dry runs and demos without an inference server handy.
    #[arg(long)]
    perf_analyzer_bin: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "search_cli=info,search_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let profile_config = config::load(&args.config)?;

    if profile_config.global.run_config_search_disable {
        info!("run_config_search_disable is set: nothing to search");
        return Ok(());
    }

    let comparator = config::build_comparator(&profile_config);
    let generator = generator::build(&profile_config, &comparator);
    let run_identifier = run_identifier(&profile_config);
    let state = StateManager::new(&args.checkpoint_dir, &run_identifier);
    let cancellation = CancellationToken::new();
    spawn_signal_handler(cancellation.clone());

    let outcome = match args.perf_analyzer_bin {
        Some(bin) => {
            let profiler = CommandLineProfiler::new(bin, Default::default(), profiler_model_specs(&profile_config));
            let mut search = RunSearch::new(generator, profiler, state, cancellation)?;
            search.run().await?
        }
        None => {
            info!("no --perf-analyzer-bin given: driving the search with a synthetic MockProfiler");
            let profiler = mock_profiler(&profile_config);
            let mut search = RunSearch::new(generator, profiler, state, cancellation)?;
            let outcome = search.run().await?;
            print_summary(&profile_config, search.checkpoint());
            outcome
        }
    };

    info!(?outcome, "search finished");
    Ok(())
}

/// Deterministic checkpoint-scope key: the model set plus the active search
/// mode.
fn run_identifier(config: &ProfileConfig) -> String {
    let models = config
        .models
        .iter()
        .map(|m| m.model_name.as_str())
        .collect::<Vec<_>>()
        .join("+");
    format!("{models}+{:?}", config.global.run_config_search_mode).to_lowercase()
}

fn profiler_model_specs(config: &ProfileConfig) -> Vec<ProfilerModelSpec> {
    config
        .models
        .iter()
        .map(|m| ProfilerModelSpec {
            model_name: m.model_name.clone(),
            objectives: m.objectives.clone().unwrap_or_else(|| config.global.objectives.clone()),
            constraints: m.constraints.clone().unwrap_or_else(|| config.global.constraints.clone()),
        })
        .collect()
}

/// A synthetic profiler standing in for a real inference server, so the CLI
/// is runnable end to end without one (demos, the "no --perf-analyzer-bin"
/// path above). Curve parameters are arbitrary but deterministic.
fn mock_profiler(config: &ProfileConfig) -> MockProfiler {
    let mut profiler = MockProfiler::new();
    for (i, model) in config.models.iter().enumerate() {
        profiler = profiler.with_model(SyntheticModel {
            model_name: model.model_name.clone(),
            base_throughput: 80.0 + i as f64 * 10.0,
            concurrency_saturation: 16,
            base_latency_us: 4000.0,
            objectives: model.objectives.clone().unwrap_or_else(|| config.global.objectives.clone()),
            constraints: model.constraints.clone().unwrap_or_else(|| config.global.constraints.clone()),
        });
    }
    profiler
}

/// Prints a one-line-per-model ranked summary of what the search found,
/// standing in for a full CSV/PDF report generator, which is out of scope.
fn print_summary(config: &ProfileConfig, checkpoint: &search_core::SearchCheckpoint) {
    let mut best_throughput: BTreeMap<&str, f64> = BTreeMap::new();
    for measurement in checkpoint.seen_measurements.values().flatten() {
        if !measurement.is_passing_constraints() {
            continue;
        }
        for model in &measurement.models {
            let entry = best_throughput.entry(model.model_name.as_str()).or_insert(f64::MIN);
            if let Some(t) = model.get_non_gpu_metric("perf_throughput") {
                if t > *entry {
                    *entry = t;
                }
            }
        }
    }

    println!("search mode: {:?}", config.global.run_config_search_mode);
    println!("configurations measured: {}", checkpoint.seen_measurements.len());
    for model in &config.models {
        match best_throughput.get(model.model_name.as_str()) {
            Some(t) => println!("  {}: best perf_throughput = {:.2}", model.model_name, t),
            None => println!("  {}: no passing configuration found", model.model_name),
        }
    }
}

/// Installs a `ctrl_c` watcher that signals `cancellation`. A second Ctrl-C
/// within the process lifetime escalates to the immediate-exit path via
/// `CancellationToken`'s own counter.
fn spawn_signal_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                break;
            }
            cancellation.signal();
        }
    });
}
