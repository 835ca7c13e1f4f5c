use thiserror::Error;

/// A compact duration string ("30s", "15m", "1h", "7d") failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration string")]
    Empty,

    #[error("duration '{0}' is missing a unit (expected one of s, m, h, d)")]
    MissingUnit(String),

    #[error("duration '{input}' has unknown unit '{unit}'")]
    UnknownUnit { input: String, unit: char },

    #[error("duration '{0}' has a non-numeric magnitude")]
    InvalidMagnitude(String),

    #[error("duration '{0}' overflows")]
    Overflow(String),
}

/// A pipeline definition failed validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("field '{field}': {source}")]
    Duration {
        field: &'static str,
        #[source]
        source: DurationError,
    },

    #[error("field '{field}': invalid cron expression '{expression}': {reason}")]
    Cron {
        field: &'static str,
        expression: String,
        reason: String,
    },

    #[error("field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl PipelineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure reported by an external port (store, model, scheduler, event bus).
///
/// Adapters map their transport errors onto these kinds so the engine can
/// tell a timeout from an unreachable backend from an unsupported operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

/// Engine settings could not be loaded.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}
