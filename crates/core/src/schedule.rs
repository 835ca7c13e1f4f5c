//! Schedule entries mirrored into the external scheduler.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three recurring jobs a pipeline can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Forecast,
    Anomaly,
    Training,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Forecast, TaskKind::Anomaly, TaskKind::Training];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Forecast => "forecast",
            TaskKind::Anomaly => "anomaly",
            TaskKind::Training => "training",
        }
    }

    /// Task identifier the external scheduler invokes for this kind.
    pub fn task_name(&self) -> &'static str {
        match self {
            TaskKind::Forecast => "tidewatch.tasks.run_forecast",
            TaskKind::Anomaly => "tidewatch.tasks.run_anomaly_check",
            TaskKind::Training => "tidewatch.tasks.train_model",
        }
    }

    /// Deterministic scheduler key for a pipeline/kind pair.
    pub fn schedule_key(&self, pipeline_name: &str) -> String {
        format!("pipeline_{}_{}", pipeline_name, self.as_str())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forecast" => Ok(TaskKind::Forecast),
            "anomaly" => Ok(TaskKind::Anomaly),
            "training" => Ok(TaskKind::Training),
            other => Err(format!("unknown task kind: {other}")),
        }
    }
}

/// One recurring trigger for one pipeline/kind pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Scheduler key, `pipeline_<name>_<kind>`.
    pub name: String,
    pub pipeline_name: String,
    pub task_kind: TaskKind,
    /// Task identifier, see [`TaskKind::task_name`].
    pub task: String,
    /// Cron expression as written in the pipeline (5 or 6 fields).
    pub cron_expression: String,
    /// Positional task arguments; always `[pipeline_name]`.
    pub args: Vec<String>,
    pub enabled: bool,
}

impl ScheduleEntry {
    pub fn new(pipeline_name: &str, task_kind: TaskKind, cron_expression: &str) -> Self {
        Self {
            name: task_kind.schedule_key(pipeline_name),
            pipeline_name: pipeline_name.to_string(),
            task_kind,
            task: task_kind.task_name().to_string(),
            cron_expression: cron_expression.trim().to_string(),
            args: vec![pipeline_name.to_string()],
            enabled: true,
        }
    }
}
