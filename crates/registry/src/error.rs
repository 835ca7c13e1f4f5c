use std::path::PathBuf;

use thiserror::Error;

use tidewatch_core::{PipelineError, PortError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pipeline '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: PipelineError,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<RegistryError> for PortError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Io { .. } => PortError::Unavailable(err.to_string()),
            RegistryError::Invalid { .. } => PortError::Rejected(err.to_string()),
            RegistryError::Yaml(_) => PortError::Other(err.to_string()),
        }
    }
}
