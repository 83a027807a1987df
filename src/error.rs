//! Error types for configuration and the observation boundary.
//!
//! The tracking core itself never fails: rejected plate reads and implausible
//! speed samples are plain `None`s. These errors only exist where data enters
//! the crate.

use thiserror::Error;

/// Result type for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid tunables in a [`crate::Config`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// OCR confidence gate outside [0, 1)
    #[error("minimum OCR confidence must be in [0, 1), got {0}")]
    OcrConfidence(f64),

    /// Similarity threshold outside (0, 1]
    #[error("similarity threshold must be in (0, 1], got {0}")]
    SimilarityThreshold(f64),

    /// A count that must be at least one
    #[error("{name} must be at least 1, got {value}")]
    ZeroCount { name: &'static str, value: usize },

    /// A quantity that must be strictly positive and finite
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    /// IQR multiplier below zero
    #[error("IQR multiplier must be non-negative, got {0}")]
    IqrMultiplier(f64),

    /// Plausibility band with min >= max
    #[error("plausible speed band is empty: [{min}, {max}] km/h")]
    EmptySpeedBand { min: f64, max: f64 },
}

/// Reasons a single raw observation is skipped before reaching the registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    /// Required field absent from the collaborator's record
    #[error("observation is missing required field `{0}`")]
    MissingField(&'static str),

    /// Timestamp in none of the accepted layouts
    #[error("unparsable timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// NaN or infinite number in a numeric field
    #[error("field `{0}` is not a finite number")]
    NonFinite(&'static str),

    /// Frame older than one already ingested
    #[error("frame {frame} arrived after frame {newest}")]
    OutOfOrder { frame: u64, newest: u64 },
}
