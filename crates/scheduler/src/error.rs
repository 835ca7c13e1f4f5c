use thiserror::Error;

use tidewatch_core::PortError;

/// Reconciliation could not bring the backend in line with a pipeline.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("scheduler backend failed for '{key}': {source}")]
    Backend {
        key: String,
        #[source]
        source: PortError,
    },
}
