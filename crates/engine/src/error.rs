use std::fmt;
use std::time::Duration;

use thiserror::Error;

use tidewatch_core::pipeline::AnomalyTechnique;
use tidewatch_core::{PipelineError, PortError};

/// External collaborator a failed call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Store,
    Model,
    ConfigStore,
    EventBus,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortKind::Store => "time-series store",
            PortKind::Model => "forecasting model",
            PortKind::ConfigStore => "configuration store",
            PortKind::EventBus => "event bus",
        })
    }
}

/// A task cycle failed.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The pipeline definition cannot be executed. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(#[from] PipelineError),

    #[error("insufficient data for series '{series_id}': {reason}")]
    DataInsufficiency { series_id: String, reason: String },

    #[error("{port} timed out after {after:?}")]
    PortTimeout { port: PortKind, after: Duration },

    #[error("{port} unavailable: {message}")]
    PortUnavailable { port: PortKind, message: String },

    #[error("anomaly technique '{technique}' is unsupported: {reason}")]
    UnsupportedTechnique {
        technique: AnomalyTechnique,
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn from_port(port: PortKind, after: Duration, err: PortError) -> Self {
        match err {
            PortError::Timeout(_) => EngineError::PortTimeout { port, after },
            other => EngineError::PortUnavailable {
                port,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn insufficient(series_id: &str, reason: impl Into<String>) -> Self {
        EngineError::DataInsufficiency {
            series_id: series_id.to_string(),
            reason: reason.into(),
        }
    }
}
