//! End-to-end lettered scenarios driven through the public API, one level up
//! from the per-module unit tests: a real `RunSearch` loop against a
//! `MockProfiler`, rather than calling a single generator method in
//! isolation.

use std::collections::BTreeMap;

use search_core::generators::brute::BruteRunConfigGenerator;
use search_core::generators::model_config::ModelConfigGenerator;
use search_core::generators::perf_analyzer::{ParameterKind, PerfAnalyzerConfigGenerator};
use search_core::generators::quick::{QuickModelSpec, QuickRunConfigGenerator};
use search_core::orchestrator::RunOutcome;
use search_core::{CancellationToken, ConfigGenerator, RunSearch, StateManager};
use search_types::{Constraints, ModelConfigVariant, Objectives};

use profiler_client::{MockProfiler, Profiler, SyntheticModel};

fn throughput_model(name: &str, saturation: u32) -> SyntheticModel {
    SyntheticModel {
        model_name: name.to_string(),
        base_throughput: 40.0,
        concurrency_saturation: saturation,
        base_latency_us: 3000.0,
        objectives: Objectives::single("perf_throughput"),
        constraints: Constraints::default(),
    }
}

/// Scenario D, at the level `BruteRunConfigGenerator` exercises it: a real
/// early exit saves measurements relative to the full product, rather than
/// the degenerate case where early exit coincides with natural exhaustion.
#[tokio::test]
async fn scenario_d_early_exit_saves_measurements_relative_to_full_sweep() {
    let mut early_exit = PerfAnalyzerConfigGenerator::new(
        vec![1, 2, 4, 8, 16, 32],
        vec![1],
        ParameterKind::Concurrency,
        true,
        BTreeMap::new(),
    );
    let mut count = 0;
    while !early_exit.is_done() {
        if early_exit.next_config().is_none() {
            break;
        }
        let mut metrics = BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), 100.0);
        let measurement = search_types::RunConfigMeasurement::new(vec![search_types::ModelMeasurement {
            model_name: "m".to_string(),
            config: search_types::ModelConfigSummary {
                max_batch_size: 1,
                instance_count: 1,
                concurrency: Some(1),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints::default(),
        }]);
        early_exit.set_last_results(&[Some(measurement)]);
        count += 1;
    }

    assert!(
        count < 6,
        "flat throughput across 6 batch sizes should trigger early exit before the full sweep, got {count}"
    );
    assert!(count >= 4, "early exit requires at least N_BATCH_SIZE samples, got {count}");
}

/// Scenario E, driven end to end: a `RunSearch` over a `BruteRunConfigGenerator`
/// stopped partway through, then resumed from its checkpoint, measures the
/// same total set of configs without re-measuring any of them twice.
#[tokio::test]
async fn scenario_e_checkpoint_resume_covers_brute_search_too() {
    let dir = tempfile::tempdir().unwrap();

    fn generator() -> BruteRunConfigGenerator {
        let model_gen = ModelConfigGenerator::automatic(2, 4, false);
        let perf_gen = PerfAnalyzerConfigGenerator::new(vec![1, 2], vec![1, 2, 4], ParameterKind::Concurrency, false, BTreeMap::new());
        BruteRunConfigGenerator::new(vec![("m".to_string(), model_gen, perf_gen)])
    }
    fn profiler() -> MockProfiler {
        MockProfiler::new().with_model(throughput_model("m", 4))
    }

    let state = StateManager::new(dir.path(), "m+brute");
    let mut search = RunSearch::new(generator(), profiler(), state, CancellationToken::new()).unwrap();
    let outcome = search.run().await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    let total_measured = search.checkpoint().seen_measurements.len();
    assert!(total_measured > 0);

    // A freshly constructed generator + state pointed at the same checkpoint
    // file should recognize every config as already measured and finish
    // immediately without adding to the log.
    let state2 = StateManager::new(dir.path(), "m+brute");
    let mut resumed = RunSearch::new(generator(), profiler(), state2, CancellationToken::new()).unwrap();
    assert_eq!(resumed.checkpoint().measurement_log.len(), total_measured);
    let outcome2 = resumed.run().await.unwrap();
    assert_eq!(outcome2, RunOutcome::Completed);
    assert_eq!(resumed.checkpoint().seen_measurements.len(), total_measured);
}

/// Scenario F, checked as an invariant across an entire quick search rather
/// than at one fixed coordinate: every `RunConfig` the hill climb visits
/// derives client concurrency from `max_batch_size * instance_count * 2`,
/// never an independently swept value.
#[tokio::test]
async fn scenario_f_concurrency_always_derives_from_server_config() {
    let model_a = QuickModelSpec {
        model_name: "a".to_string(),
        cpu_only: false,
        max_instance_count: 8,
        max_model_batch_size: 32,
        passthrough: BTreeMap::new(),
        extra_flags: BTreeMap::new(),
    };
    let model_b = QuickModelSpec {
        model_name: "b".to_string(),
        cpu_only: false,
        max_instance_count: 8,
        max_model_batch_size: 32,
        passthrough: BTreeMap::new(),
        extra_flags: BTreeMap::new(),
    };
    let mut generator = QuickRunConfigGenerator::new(vec![model_a, model_b], 2.0, 3, 5.0, true, 2);
    let mut profiler = MockProfiler::new()
        .with_model(throughput_model("a", 8))
        .with_model(throughput_model("b", 8));

    let mut steps = 0;
    while !generator.is_done() && steps < 200 {
        let Some(config) = generator.next_config() else { break };
        for model_run_config in &config.model_run_configs {
            let (max_batch_size, instance_count) = match &model_run_config.server_config {
                ModelConfigVariant::Default => (model_run_config.client_config.batch_size, 1),
                ModelConfigVariant::Explicit(s) => {
                    (s.max_batch_size, s.instance_group.iter().map(|g| g.count).sum::<u32>())
                }
            };
            let expected = max_batch_size as u64 * instance_count as u64 * 2;
            match model_run_config.client_config.load {
                search_types::LoadSpec::Concurrency(c) => assert_eq!(c as u64, expected.min(u32::MAX as u64)),
                search_types::LoadSpec::RequestRate(_) => panic!("quick search must drive concurrency, not request rate"),
            }
        }
        let measurement = profiler.profile(&config).await.unwrap();
        generator.set_last_results(&[Some(measurement)]);
        steps += 1;
    }
    assert!(steps > 0, "quick search should take at least one measurement");
}
