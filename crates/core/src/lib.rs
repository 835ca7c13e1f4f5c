pub mod config;
pub mod cron;
pub mod duration;
pub mod error;
pub mod metric_id;
pub mod pipeline;
pub mod ports;
pub mod schedule;
pub mod series;

pub use config::{EngineSettings, StoreEndpoints};
pub use error::*;
pub use metric_id::MetricId;
pub use pipeline::Pipeline;
pub use schedule::{ScheduleEntry, TaskKind};
pub use series::*;
