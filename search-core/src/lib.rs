//! The configuration search engine (spec.md §2): the coordinate-space data
//! model, the neighborhood-based hill climber, the comparator algebra, the
//! `ConfigGenerator` implementations, the `RunSearch` orchestrator, and the
//! `StateManager` checkpoint layer.
//!
//! This crate never parses YAML and never spawns the load generator itself —
//! those are `search-cli` and `profiler-client`'s jobs (spec.md §1). It
//! consumes `search_types::RunConfigMeasurement` values and produces
//! `search_types::RunConfig` values; everything in between is this crate.

pub mod comparator;
pub mod coordinate;
pub mod dimension;
pub mod generators;
pub mod neighborhood;
pub mod orchestrator;
pub mod state;

pub use comparator::{MeasurementComparator, ModelComparatorSpec};
pub use coordinate::{Coordinate, CoordinateData, CoordinateEntrySnapshot};
pub use dimension::{Growth, SearchDimension, SearchDimensions, DIMENSION_NO_MAX};
pub use generators::{
    BruteRunConfigGenerator, ConfigGenerator, ModelConfigGenerator, OptunaRunConfigGenerator,
    PerfAnalyzerConfigGenerator, QuickRunConfigGenerator,
};
pub use neighborhood::{Neighborhood, NeighborhoodConfig};
pub use orchestrator::{CancellationToken, RunSearch};
pub use state::{SearchCheckpoint, StateManager};
