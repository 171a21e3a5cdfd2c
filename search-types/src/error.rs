use thiserror::Error;

/// The crate-wide error taxonomy. Every variant here corresponds to one of the
/// error kinds the search engine can surface; `MeasurementFailure` and
/// `ConstraintViolation`-shaped data are *not* represented as errors (the
/// former degrades a generator's sub-sweep, the latter is ordinary data the
/// comparator handles), only genuinely fatal conditions are.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index {index} out of range [{min}, {max}] for search dimension '{dimension}'")]
    IndexOutOfRange {
        dimension: String,
        index: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid configuration: {reason} (config: {fingerprint})")]
    InvalidConfiguration { reason: String, fingerprint: String },

    #[error("state corruption: {reason}")]
    StateCorruption { reason: String },

    #[error("measurement failed for {fingerprint}: {reason}")]
    MeasurementFailure { fingerprint: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize checkpoint: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type SearchResult<T> = Result<T, SearchError>;
