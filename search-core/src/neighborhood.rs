//! `Neighborhood`: the finite set of coordinates within Euclidean radius `r`
//! of a *home*, plus the step-vector and initialization-picking policies
//! that drive `QuickRunConfigGenerator`'s
//! hill climb.

use std::collections::BTreeSet;
use std::sync::Arc;

use search_types::RunConfigMeasurement;
use tracing::{debug, trace};

use crate::coordinate::{round_half_away_from_zero, Coordinate, CoordinateData};
use crate::dimension::SearchDimensions;

/// Shared, immutable configuration for a neighborhood: which dimensions it
/// spans, how far it reaches, and how many non-home coordinates must be
/// initialized before the hill-climb is allowed to take a step.
#[derive(Debug, Clone)]
pub struct NeighborhoodConfig {
    pub dimensions: Arc<SearchDimensions>,
    pub radius: f64,
    pub min_initialized: usize,
}

/// All coordinates within Euclidean distance `radius` of `home`, clamped to
/// each dimension's bounds, plus the `CoordinateData` scoped to this
/// neighborhood.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    config: Arc<NeighborhoodConfig>,
    home: Coordinate,
    /// All in-radius coordinates including `home`, in enumeration order (ties
    /// in `pick_coordinate_to_initialize` break on this order).
    coordinates: Vec<Coordinate>,
    coordinate_data: CoordinateData,
}

impl Neighborhood {
    /// Enumerate the bounding hypercube `[home_i - r, home_i + r]` clamped to
    /// dimension bounds, retaining only points within Euclidean distance `r`
    /// (spec.md §4.3 Construction, testable property #3).
    pub fn new(config: Arc<NeighborhoodConfig>, home: Coordinate) -> Self {
        let r = config.radius;
        let r_floor = r.floor() as i64;
        let mut ranges: Vec<(i64, i64)> = Vec::with_capacity(home.len());
        for (i, center) in home.iter().enumerate() {
            let dim = config
                .dimensions
                .get(i)
                .expect("home coordinate length matches dimensions");
            let lo = dim.clamp(center - r_floor);
            let hi = dim.clamp(center + r_floor);
            ranges.push((lo, hi));
        }

        let mut coordinates = Vec::new();
        let mut cursor = Vec::with_capacity(ranges.len());
        enumerate_box(&ranges, &mut cursor, &home, r, &mut coordinates);

        Self {
            config,
            home,
            coordinates,
            coordinate_data: CoordinateData::new(),
        }
    }

    pub fn home(&self) -> &Coordinate {
        &self.home
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn coordinate_data(&self) -> &CoordinateData {
        &self.coordinate_data
    }

    pub fn coordinate_data_mut(&mut self) -> &mut CoordinateData {
        &mut self.coordinate_data
    }

    pub fn dimensions(&self) -> &SearchDimensions {
        &self.config.dimensions
    }

    pub fn config(&self) -> &Arc<NeighborhoodConfig> {
        &self.config
    }

    /// Records a measurement for `c`, marking it measured and incrementing
    /// its visit count in the same call, matching the ordering guarantee in
    /// spec.md §5 ("visit-count increments happen atomically with the
    /// measurement store").
    pub fn record_measurement(&mut self, c: &Coordinate, m: Option<RunConfigMeasurement>) {
        self.coordinate_data.set_measurement(c, m);
        self.coordinate_data.increment_visit_count(c);
    }

    /// The closest neighborhood coordinate to an arbitrary point (supplemental
    /// operation, grounded in `original_source/neighborhood.py`): used by
    /// `QuickRunConfigGenerator` to locate a fresh neighborhood's own home
    /// measurement after a rebuild, without a new measurement.
    pub fn get_nearest_neighbor(&self, point: &Coordinate) -> Option<Coordinate> {
        self.coordinates
            .iter()
            .min_by(|a, b| {
                a.distance(point)
                    .partial_cmp(&b.distance(point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }

    /// `pick_coordinate_to_initialize` (spec.md §4.3): bias toward the
    /// unvisited coordinate covering the most previously-unseen per-dimension
    /// values.
    pub fn pick_coordinate_to_initialize(&self) -> Option<Coordinate> {
        let ndims = self.config.dimensions.len();
        let mut covered: Vec<BTreeSet<i64>> = vec![BTreeSet::new(); ndims];
        for c in &self.coordinates {
            if self.coordinate_data.get_visit_count(c) == 0 {
                continue;
            }
            for (d, v) in c.iter().enumerate() {
                covered[d].insert(*v);
            }
        }

        let mut best: Option<(&Coordinate, usize)> = None;
        for c in &self.coordinates {
            if self.coordinate_data.get_visit_count(c) > 0 {
                continue;
            }
            let uncovered = c
                .iter()
                .enumerate()
                .filter(|(d, v)| !covered[*d].contains(*v))
                .count();
            match best {
                Some((_, best_count)) if best_count >= uncovered => {}
                _ => best = Some((c, uncovered)),
            }
        }
        best.map(|(c, _)| c.clone())
    }

    /// True once at least `min_initialized` non-home coordinates have been
    /// measured.
    pub fn enough_coordinates_initialized(&self) -> bool {
        let count = self
            .coordinates
            .iter()
            .filter(|c| **c != self.home && self.coordinate_data.is_measured(c))
            .count();
        count >= self.config.min_initialized
    }

    fn visited_non_home_with_measurement(&self) -> Vec<(&Coordinate, &RunConfigMeasurement)> {
        self.coordinates
            .iter()
            .filter(|c| **c != self.home)
            .filter_map(|c| {
                self.coordinate_data
                    .get_measurement(c)
                    .map(|m| (c, m))
            })
            .collect()
    }

    /// `calculate_new_coordinate` (spec.md §4.3 step-vector computation):
    /// the four-branch policy driving the hill climb.
    pub fn calculate_new_coordinate(
        &self,
        magnitude: f64,
        enable_clipping: bool,
        clip_value: i64,
    ) -> Coordinate {
        let ndims = self.config.dimensions.len();
        let zero = vec![0.0f64; ndims];

        let home_measurement = self.coordinate_data.get_measurement(&self.home);
        let home_passes = home_measurement
            .map(RunConfigMeasurement::is_passing_constraints)
            .unwrap_or(false);

        let neighbors = self.visited_non_home_with_measurement();
        let (passing, failing): (Vec<(&Coordinate, &RunConfigMeasurement)>, Vec<(&Coordinate, &RunConfigMeasurement)>) = neighbors
            .into_iter()
            .partition(|(_, m)| m.is_passing_constraints());

        let raw: Vec<f64> = if home_passes && !passing.is_empty() {
            // Branch A: weighted average toward neighbors better than home.
            let home_m = home_measurement.unwrap();
            debug!(branch = "A", count = passing.len(), "objective-driven step");
            weighted_average(&zero, &passing, |c, m| {
                let weight = home_m.score(m);
                (diff_vec(c, &self.home), weight)
            })
        } else if home_passes {
            // Branch B: no gradient information.
            debug!(branch = "B", "home passes, no passing neighbor: zero step");
            zero
        } else if !passing.is_empty() {
            // Branch C: unweighted average toward any passing neighbor.
            debug!(branch = "C", count = passing.len(), "feasibility-driven step");
            weighted_average(&zero, &passing, |c, _| (diff_vec(c, &self.home), 1.0))
        } else if !failing.is_empty() {
            // Branch D: weighted by closeness-to-passing over all neighbors.
            let home_m = home_measurement;
            debug!(branch = "D", count = failing.len(), "closeness-to-passing step");
            weighted_average(&zero, &failing, |c, m| {
                let weight = home_m.map(|h| h.compare_constraints(m)).unwrap_or(1.0);
                (diff_vec(c, &self.home), weight)
            })
        } else {
            zero
        };

        let scaled: Vec<f64> = raw.iter().map(|v| v * magnitude).collect();
        let mut step = Coordinate::new(scaled.iter().map(|v| round_half_away_from_zero(*v)).collect());
        trace!(?step, "raw step vector");

        if enable_clipping {
            let max_abs = step.max_abs_component();
            if max_abs > clip_value {
                let scale = clip_value as f64 / max_abs as f64;
                step = step.scale_rounded(scale);
                trace!(?step, "clipped step vector");
            }
        }

        let candidate = (&self.home) + &step;
        self.config.dimensions.clamp(&candidate)
    }
}

/// Recursively enumerate every lattice point in the bounding box described by
/// `ranges`, keeping only those within Euclidean distance `r` of `home`.
fn enumerate_box(
    ranges: &[(i64, i64)],
    cursor: &mut Vec<i64>,
    home: &Coordinate,
    r: f64,
    out: &mut Vec<Coordinate>,
) {
    if cursor.len() == ranges.len() {
        let candidate = Coordinate::new(cursor.clone());
        if candidate.distance(home) <= r {
            out.push(candidate);
        }
        return;
    }
    let (lo, hi) = ranges[cursor.len()];
    for v in lo..=hi {
        cursor.push(v);
        enumerate_box(ranges, cursor, home, r, out);
        cursor.pop();
    }
}

/// `coordinate - home` as a float vector, used as the directional component
/// of a weighted step.
fn diff_vec(c: &Coordinate, home: &Coordinate) -> Vec<f64> {
    c.iter()
        .zip(home.iter())
        .map(|(a, b)| (a - b) as f64)
        .collect()
}

/// Weighted average of `f(c, m)` over `items`, where `f` returns a direction
/// vector and a scalar weight. Divides by the number of items per spec.md
/// §4.3 step 4 ("Divide by neighbor count").
fn weighted_average(
    zero: &[f64],
    items: &[(&Coordinate, &RunConfigMeasurement)],
    f: impl Fn(&Coordinate, &RunConfigMeasurement) -> (Vec<f64>, f64),
) -> Vec<f64> {
    if items.is_empty() {
        return zero.to_vec();
    }
    let mut acc = zero.to_vec();
    for (c, m) in items {
        let (dir, weight) = f(c, m);
        for (a, d) in acc.iter_mut().zip(dir.iter()) {
            *a += d * weight;
        }
    }
    let n = items.len() as f64;
    acc.iter().map(|v| v / n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{Growth, SearchDimension};
    use search_types::{Constraints, ModelConfigSummary, ModelMeasurement, Objectives};
    use std::collections::BTreeMap;

    fn dims2(g0: Growth, g1: Growth) -> Arc<SearchDimensions> {
        let mut d = SearchDimensions::new();
        d.push("m", SearchDimension::new("d0", g0, 0, 10));
        d.push("m", SearchDimension::new("d1", g1, 0, 10));
        Arc::new(d)
    }

    fn dims3() -> Arc<SearchDimensions> {
        let mut d = SearchDimensions::new();
        d.push("m", SearchDimension::linear("d0", 0, 10));
        d.push("m", SearchDimension::exponential("d1", 0, 10));
        d.push("m", SearchDimension::exponential("d2", 0, 10));
        Arc::new(d)
    }

    fn measurement(throughput: f64) -> RunConfigMeasurement {
        let mut metrics = BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        RunConfigMeasurement::new(vec![ModelMeasurement {
            model_name: "m".to_string(),
            config: ModelConfigSummary {
                max_batch_size: 1,
                instance_count: 1,
                concurrency: Some(1),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints::default(),
        }])
    }

    fn failing_measurement(throughput: f64, latency: f64, latency_cap: f64) -> RunConfigMeasurement {
        let mut metrics = BTreeMap::new();
        metrics.insert("perf_throughput".to_string(), throughput);
        metrics.insert("perf_latency_p99".to_string(), latency);
        let mut bounds = BTreeMap::new();
        bounds.insert(
            "perf_latency_p99".to_string(),
            search_types::ConstraintBound::Max(latency_cap),
        );
        RunConfigMeasurement::new(vec![ModelMeasurement {
            model_name: "m".to_string(),
            config: ModelConfigSummary {
                max_batch_size: 1,
                instance_count: 1,
                concurrency: Some(1),
                request_rate: None,
            },
            non_gpu_metrics: metrics,
            gpu_metrics: Default::default(),
            objectives: Objectives::single("perf_throughput"),
            constraints: Constraints(bounds),
        }])
    }

    #[test]
    fn containment_within_radius_and_bounds() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims2(Growth::Linear, Growth::Exponential),
            radius: 2.0,
            min_initialized: 1,
        });
        let home = Coordinate::new(vec![1, 1]);
        let neigh = Neighborhood::new(config, home.clone());
        for c in neigh.coordinates() {
            assert!(c.distance(&home) <= 2.0 + 1e-9);
            assert!(c.get(0).unwrap() >= 0 && c.get(0).unwrap() <= 10);
            assert!(c.get(1).unwrap() >= 0 && c.get(1).unwrap() <= 10);
        }
        assert!(neigh.coordinates().contains(&home));
    }

    #[test]
    fn scenario_a_home_is_optimal() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims3(),
            radius: 2.0,
            min_initialized: 3,
        });
        let home = Coordinate::new(vec![1, 1, 1]);
        let mut neigh = Neighborhood::new(config, home.clone());
        neigh.record_measurement(&home, Some(measurement(10.0)));
        for n in [[1, 0, 0], [0, 1, 0], [0, 0, 1]] {
            neigh.record_measurement(&Coordinate::new(n.to_vec()), Some(measurement(10.0)));
        }
        let next = neigh.calculate_new_coordinate(5.0, false, 2);
        assert_eq!(next, home);
    }

    #[test]
    fn scenario_b_single_dimension_gradient() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims2(Growth::Linear, Growth::Linear),
            radius: 2.0,
            min_initialized: 2,
        });
        let home = Coordinate::new(vec![0, 0]);
        let mut neigh = Neighborhood::new(config, home.clone());
        neigh.record_measurement(&home, Some(measurement(1.0)));
        neigh.record_measurement(&Coordinate::new(vec![1, 0]), Some(measurement(3.0)));
        neigh.record_measurement(&Coordinate::new(vec![0, 1]), Some(measurement(1.0)));
        let next = neigh.calculate_new_coordinate(20.0, false, 2);
        assert_eq!(next, Coordinate::new(vec![10, 0]));
    }

    #[test]
    fn scenario_c_clamp_to_bounds() {
        let mut d = SearchDimensions::new();
        d.push("m", SearchDimension::linear("d0", 2, 7));
        d.push("m", SearchDimension::exponential("d1", 2, 7));
        let config = Arc::new(NeighborhoodConfig {
            dimensions: Arc::new(d),
            radius: 2.0,
            min_initialized: 1,
        });
        let home = Coordinate::new(vec![3, 6]);
        let mut neigh = Neighborhood::new(config, home.clone());
        neigh.record_measurement(&home, Some(measurement(1.0)));
        neigh.record_measurement(&Coordinate::new(vec![4, 5]), Some(measurement(10.0)));
        let next = neigh.calculate_new_coordinate(8.0, true, 2);
        assert_eq!(next, Coordinate::new(vec![7, 2]));
    }

    #[test]
    fn clip_bound_is_respected() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims3(),
            radius: 3.0,
            min_initialized: 1,
        });
        let home = Coordinate::new(vec![2, 2, 2]);
        let mut neigh = Neighborhood::new(config, home.clone());
        neigh.record_measurement(&home, Some(measurement(1.0)));
        neigh.record_measurement(&Coordinate::new(vec![3, 0, 0]), Some(measurement(100.0)));
        let next = neigh.calculate_new_coordinate(50.0, true, 2);
        let step = (&next) - &home;
        for v in step.iter() {
            assert!(v.abs() <= 2);
        }
    }

    #[test]
    fn branch_d_falls_back_to_closeness_when_all_fail() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims2(Growth::Linear, Growth::Linear),
            radius: 2.0,
            min_initialized: 1,
        });
        let home = Coordinate::new(vec![0, 0]);
        let mut neigh = Neighborhood::new(config, home.clone());
        // home fails badly: latency way over cap
        neigh.record_measurement(&home, Some(failing_measurement(1.0, 100.0, 10.0)));
        // neighbor fails less badly: closer to passing
        neigh.record_measurement(
            &Coordinate::new(vec![1, 0]),
            Some(failing_measurement(1.0, 11.0, 10.0)),
        );
        let next = neigh.calculate_new_coordinate(10.0, false, 2);
        // direction should move toward the neighbor that's closer to passing
        assert!(next.get(0).unwrap() > 0);
    }

    #[test]
    fn pick_coordinate_to_initialize_maximizes_uncovered_dims() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims2(Growth::Linear, Growth::Linear),
            radius: 2.0,
            min_initialized: 10,
        });
        let home = Coordinate::new(vec![2, 2]);
        let mut neigh = Neighborhood::new(config, home.clone());
        neigh.record_measurement(&home, Some(measurement(1.0)));
        let picked = neigh.pick_coordinate_to_initialize();
        assert!(picked.is_some());
        assert_ne!(picked.unwrap(), home);
    }

    #[test]
    fn enough_initialized_respects_threshold() {
        let config = Arc::new(NeighborhoodConfig {
            dimensions: dims2(Growth::Linear, Growth::Linear),
            radius: 2.0,
            min_initialized: 2,
        });
        let home = Coordinate::new(vec![2, 2]);
        let mut neigh = Neighborhood::new(config, home.clone());
        assert!(!neigh.enough_coordinates_initialized());
        neigh.record_measurement(&Coordinate::new(vec![1, 2]), Some(measurement(1.0)));
        assert!(!neigh.enough_coordinates_initialized());
        neigh.record_measurement(&Coordinate::new(vec![3, 2]), Some(measurement(1.0)));
        assert!(neigh.enough_coordinates_initialized());
    }
}
