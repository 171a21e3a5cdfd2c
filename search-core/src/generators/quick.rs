//! `QuickRunConfigGenerator`: the neighborhood-driven hill climb over a
//! coordinate space built from every model's `[max_batch_size,
//! instance_count]` axes.

use std::collections::BTreeMap;
use std::sync::Arc;

use search_types::{
    ClientConfig, DynamicBatchingConfig, InstanceGroup, InstanceKind, LoadSpec, ModelConfigVariant,
    ModelRunConfig, RunConfig, RunConfigMeasurement, ServerConfig,
};
use tracing::{debug, info};

use crate::coordinate::Coordinate;
use crate::dimension::{Growth, SearchDimension, SearchDimensions};
use crate::neighborhood::{Neighborhood, NeighborhoodConfig};

use super::ConfigGenerator;

/// Default magnitude-decay factor applied when a step returns to home;
/// exposed as a configuration knob via `with_magnitude_decay`.
pub const DEFAULT_MAGNITUDE_DECAY: f64 = 0.5;
/// Below this, the search declares itself done rather than loop forever on
/// vanishing step sizes.
pub const DEFAULT_MAGNITUDE_FLOOR: f64 = 1.0 / 1024.0;

/// Per-model static data needed to turn a coordinate into a `RunConfig`:
/// the model's name, whether it is CPU-only, and any passthrough
/// server-config fields / perf-analyzer flags to preserve.
#[derive(Debug, Clone)]
pub struct QuickModelSpec {
    pub model_name: String,
    pub cpu_only: bool,
    pub max_instance_count: u32,
    pub max_model_batch_size: u32,
    pub passthrough: BTreeMap<String, serde_json::Value>,
    pub extra_flags: BTreeMap<String, String>,
}

pub struct QuickRunConfigGenerator {
    models: Vec<QuickModelSpec>,
    dimensions: Arc<SearchDimensions>,
    radius: f64,
    min_initialized: usize,
    base_magnitude: f64,
    magnitude_scaler: f64,
    magnitude_decay: f64,
    magnitude_floor: f64,
    enable_clipping: bool,
    clip_value: i64,

    current_neighborhood: Neighborhood,
    global_visits: crate::coordinate::CoordinateData,
    coordinate_to_measure: Option<Coordinate>,
    done: bool,
}

fn max_batch_size_bits(max_model_batch_size: u32) -> i64 {
    // exponential dimension: value_at(i) = 2^i, so the top index is
    // floor(log2(max)).
    let mut bits = 0i64;
    while (1u64 << (bits + 1)) <= max_model_batch_size as u64 {
        bits += 1;
    }
    bits
}

fn build_dimensions(models: &[QuickModelSpec]) -> SearchDimensions {
    let mut dims = SearchDimensions::new();
    for m in models {
        let max_bs_idx = max_batch_size_bits(m.max_model_batch_size);
        dims.push(
            m.model_name.clone(),
            SearchDimension::new("max_batch_size", Growth::Exponential, 0, max_bs_idx),
        );
        dims.push(
            m.model_name.clone(),
            SearchDimension::new(
                "instance_count",
                Growth::Linear,
                0,
                (m.max_instance_count.max(1) as i64) - 1,
            ),
        );
    }
    dims
}

impl QuickRunConfigGenerator {
    pub fn new(
        models: Vec<QuickModelSpec>,
        radius: f64,
        min_initialized: usize,
        base_magnitude: f64,
        enable_clipping: bool,
        clip_value: i64,
    ) -> Self {
        assert!(!models.is_empty(), "quick search needs at least one model");
        let dimensions = Arc::new(build_dimensions(&models));
        let home = Coordinate::zeros(dimensions.len());
        let neighborhood_config = Arc::new(NeighborhoodConfig {
            dimensions: dimensions.clone(),
            radius,
            min_initialized,
        });
        let current_neighborhood = Neighborhood::new(neighborhood_config, home);
        Self {
            models,
            dimensions,
            radius,
            min_initialized,
            base_magnitude,
            magnitude_scaler: 1.0,
            magnitude_decay: DEFAULT_MAGNITUDE_DECAY,
            magnitude_floor: DEFAULT_MAGNITUDE_FLOOR,
            enable_clipping,
            clip_value,
            current_neighborhood,
            global_visits: crate::coordinate::CoordinateData::new(),
            coordinate_to_measure: None,
            done: false,
        }
    }

    pub fn with_magnitude_decay(mut self, decay: f64, floor: f64) -> Self {
        self.magnitude_decay = decay;
        self.magnitude_floor = floor;
        self
    }

    fn neighborhood_config(&self, home: Coordinate) -> Neighborhood {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: self.dimensions.clone(),
            radius: self.radius,
            min_initialized: self.min_initialized,
        });
        Neighborhood::new(config, home)
    }

    /// Locate the new home's prior measurement (if any) via the old
    /// neighborhood's nearest-neighbor lookup, so a freshly rebuilt
    /// neighborhood doesn't re-measure a coordinate it already knows about.
    fn seed_new_home(&mut self, old: &Neighborhood) {
        let home = self.current_neighborhood.home().clone();
        if let Some(nearest) = old.get_nearest_neighbor(&home) {
            if nearest == home && old.coordinate_data().is_measured(&nearest) {
                let measurement = old.coordinate_data().get_measurement(&nearest).cloned();
                self.current_neighborhood.record_measurement(&home, measurement);
            }
        }
    }

    fn advance(&mut self) {
        loop {
            if self.done || self.coordinate_to_measure.is_some() {
                return;
            }
            if self.current_neighborhood.enough_coordinates_initialized() {
                let magnitude = self.base_magnitude * self.magnitude_scaler;
                let candidate = self.current_neighborhood.calculate_new_coordinate(
                    magnitude,
                    self.enable_clipping,
                    self.clip_value,
                );
                if candidate == *self.current_neighborhood.home() {
                    self.magnitude_scaler *= self.magnitude_decay;
                    debug!(scaler = self.magnitude_scaler, "step returned to home, decaying magnitude");
                    if self.magnitude_scaler < self.magnitude_floor {
                        info!("quick search done: magnitude decayed below floor");
                        self.done = true;
                        return;
                    }
                    continue;
                }
                let old = std::mem::replace(
                    &mut self.current_neighborhood,
                    self.neighborhood_config(candidate),
                );
                self.current_neighborhood
                    .coordinate_data_mut()
                    .merge_visit_counts_from(&self.global_visits);
                self.seed_new_home(&old);
                if self
                    .current_neighborhood
                    .coordinate_data()
                    .is_measured(self.current_neighborhood.home())
                {
                    continue;
                }
                self.coordinate_to_measure = Some(self.current_neighborhood.home().clone());
                return;
            } else {
                match self.current_neighborhood.pick_coordinate_to_initialize() {
                    Some(c) => {
                        self.coordinate_to_measure = Some(c);
                        return;
                    }
                    None => {
                        info!("quick search done: neighborhood fully initialized with no step available");
                        self.done = true;
                        return;
                    }
                }
            }
        }
    }

    /// `Coordinate -> RunConfig` mapping: each model contributes
    /// `[max_batch_size, instance_count]`; concurrency is derived, never
    /// swept directly.
    fn coordinate_to_run_config(&self, coordinate: &Coordinate) -> RunConfig {
        let mut model_run_configs = Vec::with_capacity(self.models.len());
        for (i, model) in self.models.iter().enumerate() {
            let bs_idx = coordinate.get(2 * i).expect("coordinate has 2 dims per model");
            let ic_idx = coordinate.get(2 * i + 1).expect("coordinate has 2 dims per model");
            let bs_dim = self.dimensions.get(2 * i).unwrap();
            let ic_dim = self.dimensions.get(2 * i + 1).unwrap();
            let max_batch_size = bs_dim.value_at(bs_idx).expect("coordinate within bounds") as u32;
            let instance_count = ic_dim.value_at(ic_idx).expect("coordinate within bounds") as u32;
            let concurrency = max_batch_size as u64 * instance_count as u64 * 2;

            let kind = if model.cpu_only { InstanceKind::Cpu } else { InstanceKind::Gpu };
            let server_config = ServerConfig {
                max_batch_size,
                instance_group: vec![InstanceGroup {
                    count: instance_count,
                    kind,
                    rate_limiter_priority: Some(1),
                }],
                dynamic_batching: Some(DynamicBatchingConfig::default()),
                passthrough: model.passthrough.clone(),
            };
            model_run_configs.push(ModelRunConfig {
                model_name: model.model_name.clone(),
                server_config: ModelConfigVariant::Explicit(server_config),
                client_config: ClientConfig {
                    batch_size: 1,
                    load: LoadSpec::Concurrency(concurrency.min(u32::MAX as u64) as u32),
                    extra_flags: model.extra_flags.clone(),
                },
            });
        }
        RunConfig::new(model_run_configs)
    }
}

impl ConfigGenerator for QuickRunConfigGenerator {
    type Output = RunConfig;

    fn next_config(&mut self) -> Option<RunConfig> {
        self.advance();
        let c = self.coordinate_to_measure.clone()?;
        Some(self.coordinate_to_run_config(&c))
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn set_last_results(&mut self, results: &[Option<RunConfigMeasurement>]) {
        let Some(c) = self.coordinate_to_measure.take() else {
            return;
        };
        let measurement = results.iter().flatten().next().cloned();
        self.current_neighborhood.record_measurement(&c, measurement.clone());
        self.global_visits.set_measurement(&c, measurement);
        self.global_visits.increment_visit_count(&c);
        self.advance();
    }
}
