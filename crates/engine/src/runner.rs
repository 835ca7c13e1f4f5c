//! Entry point for scheduler-triggered tasks.
//!
//! The external scheduler only knows a task kind and a pipeline name. The
//! runner resolves the current definition, builds port handles for it and
//! dispatches to the matching loop.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use tidewatch_core::ports::{ConfigurationStore, EventPublisher, PortFactory};
use tidewatch_core::{EngineSettings, ModelId, Pipeline, StoreEndpoints, TaskKind};

use crate::anomaly::SeriesAnomalies;
use crate::error::{EngineError, PortKind};
use crate::executor::{call_port, Executor};

/// Why a triggered task did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    Disabled,
    ModeExcludes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Skipped(SkipReason),
    Forecast { rows_written: usize },
    Anomaly(Vec<SeriesAnomalies>),
    Trained(Option<ModelId>),
}

pub struct TaskRunner {
    configs: Arc<dyn ConfigurationStore>,
    ports: Arc<dyn PortFactory>,
    settings: EngineSettings,
    events: Option<Arc<dyn EventPublisher>>,
}

impl TaskRunner {
    pub fn new(
        configs: Arc<dyn ConfigurationStore>,
        ports: Arc<dyn PortFactory>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            configs,
            ports,
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(publisher);
        self
    }

    /// Run one triggered task. Every invocation logs its elapsed time.
    pub async fn run(
        &self,
        kind: TaskKind,
        pipeline_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        let started = Instant::now();
        info!(task = %kind, pipeline = %pipeline_name, "Starting task");

        let result = self.dispatch(kind, pipeline_name, now).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => info!(
                task = %kind,
                pipeline = %pipeline_name,
                elapsed_ms,
                outcome = %outcome_label(outcome),
                "Task finished"
            ),
            Err(e) => error!(
                task = %kind,
                pipeline = %pipeline_name,
                elapsed_ms,
                error = %e,
                "Task failed"
            ),
        }
        result
    }

    async fn dispatch(
        &self,
        kind: TaskKind,
        pipeline_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TaskOutcome, EngineError> {
        let found = call_port(
            PortKind::ConfigStore,
            self.settings.timeouts.fetch(),
            self.configs.get(pipeline_name),
        )
        .await?;
        let Some(pipeline) = found else {
            info!(pipeline = %pipeline_name, "Pipeline not found, nothing to run");
            return Ok(TaskOutcome::Skipped(SkipReason::NotFound));
        };

        if let Some(reason) = skip_reason(&pipeline, kind) {
            info!(pipeline = %pipeline_name, task = %kind, reason = ?reason, "Task not applicable, skipping");
            return Ok(TaskOutcome::Skipped(reason));
        }

        let executor = self.executor_for(&pipeline)?;
        match kind {
            TaskKind::Forecast => {
                let rows_written = executor.run_forecast(&pipeline, now).await?;
                Ok(TaskOutcome::Forecast { rows_written })
            }
            TaskKind::Anomaly => {
                let scores = executor.run_anomaly_check(&pipeline, now).await?;
                Ok(TaskOutcome::Anomaly(scores))
            }
            TaskKind::Training => {
                let model_id = executor.run_training(&pipeline, now).await?;
                Ok(TaskOutcome::Trained(model_id))
            }
        }
    }

    fn executor_for(&self, pipeline: &Pipeline) -> Result<Executor, EngineError> {
        let timeouts = self.settings.timeouts;
        let endpoints = StoreEndpoints::resolve(&self.settings, &pipeline.store);
        let model = self
            .ports
            .model_for(pipeline)
            .map_err(|e| EngineError::from_port(PortKind::Model, timeouts.model(), e))?;
        let store = self
            .ports
            .store_for(pipeline, &endpoints)
            .map_err(|e| EngineError::from_port(PortKind::Store, timeouts.fetch(), e))?;

        let executor = Executor::new(model, store, timeouts);
        Ok(match &self.events {
            Some(publisher) => executor.with_events(Arc::clone(publisher)),
            None => executor,
        })
    }
}

/// Training is left to [`Executor::run_training`], which treats a missing or
/// disabled training block as a no-op on its own.
fn skip_reason(pipeline: &Pipeline, kind: TaskKind) -> Option<SkipReason> {
    if !pipeline.enabled {
        return Some(SkipReason::Disabled);
    }
    match kind {
        TaskKind::Forecast if !pipeline.mode.runs_forecast() => Some(SkipReason::ModeExcludes),
        TaskKind::Anomaly if !pipeline.mode.runs_anomaly() => Some(SkipReason::ModeExcludes),
        TaskKind::Forecast | TaskKind::Anomaly if !pipeline.task_enabled(kind) => {
            Some(SkipReason::Disabled)
        }
        _ => None,
    }
}

fn outcome_label(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::Skipped(reason) => format!("skipped ({reason:?})"),
        TaskOutcome::Forecast { rows_written } => format!("{rows_written} forecast rows"),
        TaskOutcome::Anomaly(series) => {
            let anomalous: usize = series.iter().map(SeriesAnomalies::anomalous).sum();
            format!("{anomalous} anomalous points across {} series", series.len())
        }
        TaskOutcome::Trained(Some(id)) => format!("model {id}"),
        TaskOutcome::Trained(None) => "no model".to_string(),
    }
}
