//! Error types for the instrumentation core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration, scrape and exposition paths.
///
/// The observation hot path never produces these; only builders, the
/// registry and the writers do.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error while writing an exposition format
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid builder or config argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Quantile outside [0, 1]
    #[error("Quantile {0} invalid: expected number between 0.0 and 1.0")]
    InvalidQuantile(f64),

    /// Error (epsilon) outside [0, 1]
    #[error("Error {0} invalid: expected number between 0.0 and 1.0")]
    InvalidQuantileError(f64),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Naming Errors
    // =========================================================================
    /// Metric name failed validation
    #[error("'{name}': illegal metric name. {reason}")]
    InvalidMetricName { name: String, reason: String },

    /// Label name failed validation
    #[error("'{0}': illegal label name")]
    InvalidLabelName(String),

    /// Same label name used twice in one label set
    #[error("Duplicate label name: '{0}'")]
    DuplicateLabelName(String),

    /// Label values do not match the declared label names
    #[error("Expected {expected} label values, but got {actual}")]
    LabelArity { expected: usize, actual: usize },

    /// Exemplar labels exceed the character budget
    #[error("Exemplar labels have {length} characters, maximum is {max}")]
    ExemplarLabelsTooLong { length: usize, max: usize },

    // =========================================================================
    // Registry / Scrape Errors
    // =========================================================================
    /// Collector instance registered twice
    #[error("Collector instance is already registered")]
    AlreadyRegistered,

    /// Same name declared with different metric types
    #[error("Conflicting metric types for '{name}': {existing} and {new}")]
    TypeConflict {
        name: String,
        existing: String,
        new: String,
    },

    /// Two data points with identical label assignment under one name
    #[error("Duplicate labels detected for metric '{name}' with labels {labels}")]
    DuplicateLabels { name: String, labels: String },

    /// A collector failed during scrape
    #[error("Collector for '{name}' failed: {reason}")]
    CollectorFailed { name: String, reason: String },

    /// Counter decremented
    #[error("Counter '{name}' cannot be decremented by {amount}")]
    NegativeIncrement { name: String, amount: f64 },

    // =========================================================================
    // Exposition Errors
    // =========================================================================
    /// Unsupported debug format parameter
    #[error("debug={0}: Unsupported query parameter. Valid values are 'openmetrics', 'text', and 'prometheus-protobuf'.")]
    UnsupportedDebugFormat(String),

    /// Output was not valid UTF-8 where text was expected
    #[error("Invalid UTF-8 in exposition output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Shorthand for argument validation failures
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
