//! Pipeline execution: forecast, anomaly and training cycles over abstract ports.

pub mod anomaly;
pub mod error;
pub mod events;
pub mod executor;
pub mod forecast;
pub mod runner;
pub mod training;

pub use anomaly::SeriesAnomalies;
pub use error::{EngineError, PortKind};
pub use executor::Executor;
pub use runner::{SkipReason, TaskOutcome, TaskRunner};
