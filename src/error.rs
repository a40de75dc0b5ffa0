use chrono::{DateTime, Utc};
use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures reported by a geocoding request.
///
/// Only `Timeout` is retried by the batch pipeline; every other kind is terminal
/// for the request that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Your API key is not authorized. You may have entered it incorrectly.")]
    NotAuthorized,

    #[error("Your API key has been blocked or suspended.")]
    Forbidden,

    #[error(
        "Your rate limit has expired. It will reset to {reset_to} on {}",
        format_reset_time(.reset_time)
    )]
    RateLimitExceeded {
        reset_to: u64,
        reset_time: Option<DateTime<Utc>>,
    },

    #[error("{0}")]
    Server(String),

    #[error("{0}")]
    Parse(String),

    #[error("Cannot connect to host: {0}")]
    Transport(String),

    #[error("Input must be a non-empty string, not {0:?}")]
    InvalidInput(String),
}

impl GeocodeError {
    /// Returns `true` for the failures the retry policy backs off on.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::NotAuthorized => "not_authorized",
            Self::Forbidden => "forbidden",
            Self::RateLimitExceeded { .. } => "rate_limited",
            Self::Server(_) => "server",
            Self::Parse(_) => "parse",
            Self::Transport(_) => "transport",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

fn format_reset_time(reset_time: &Option<DateTime<Utc>>) -> String {
    match reset_time {
        Some(t) => t.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => "an unknown date".to_string(),
    }
}

/// The Error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV error: {source}")]
    CsvError {
        #[from]
        source: csv::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Geocoding error: {source}")]
    Geocoding {
        #[from]
        source: GeocodeError,
    },

    #[error("Test request failed: {source}")]
    ProbeFailed { source: GeocodeError },

    #[error("Worker failed: {0}")]
    WorkerError(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
