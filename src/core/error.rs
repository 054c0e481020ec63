//! Error types for the subsume library.

use thiserror::Error;

/// Result type alias using subsume's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or querying an analysis.
///
/// Every error is raised before any state is touched, so a failed call
/// leaves vectors, tries and builder sessions exactly as they were.
#[derive(Error, Debug)]
pub enum Error {
    /// Mismatched vector lengths, duplicate element ids, bad reach vectors.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bit, element or cluster index beyond the container size.
    #[error("Index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Session protocol violation (build without open, double close, ...).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The host's cancellation predicate asked the analysis to stop.
    #[error("Analysis cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a new invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new out-of-range error.
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }

    /// Create a new runtime (session protocol) error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Length-mismatch error shared by every two-operand vector operation.
    pub(crate) fn length_mismatch(left: usize, right: usize) -> Self {
        Self::InvalidArgument(format!(
            "bit-vector length mismatch: {left} vs {right}"
        ))
    }
}
