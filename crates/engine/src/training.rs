//! Training loop: fetch the training window and hand it to the model.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

use tidewatch_core::pipeline::TrainingConfig;
use tidewatch_core::{ModelId, Pipeline};

use crate::error::{EngineError, PortKind};
use crate::events::{TrainingEvent, TrainingEvents};
use crate::executor::{call_port, duration_field, window_start, Executor};

impl Executor {
    /// Train on `[now - training.window, now]` and return the new model id.
    ///
    /// Absent or disabled training returns `None` without touching any port.
    /// The caller decides whether to persist the returned id.
    pub async fn run_training(
        &self,
        pipeline: &Pipeline,
        now: DateTime<Utc>,
    ) -> Result<Option<ModelId>, EngineError> {
        let Some(training) = pipeline.training.as_ref().filter(|t| t.enabled) else {
            info!(pipeline = %pipeline.name, "Training not configured, skipping");
            return Ok(None);
        };
        let window = duration_field("training.window", &training.window)?;
        let step = duration_field("step", &pipeline.step)?;
        let start = window_start("training.window", now, window)?;

        let events = TrainingEvents::new(
            pipeline,
            training,
            self.events.clone(),
            self.timeouts.event(),
        );
        if let Some(events) = &events {
            events
                .emit(TrainingEvent::Started, base_context(pipeline, training))
                .await;
        }

        let started = Instant::now();
        let outcome = self.train_window(pipeline, training, start, now, step).await;
        let elapsed = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;

        match &outcome {
            Ok(Some(model_id)) => {
                info!(pipeline = %pipeline.name, model_id = %model_id, elapsed_secs = elapsed, "Training complete");
                if let Some(events) = &events {
                    let mut ctx = base_context(pipeline, training);
                    ctx.insert("model_id".into(), Value::from(model_id.as_str()));
                    ctx.insert("status".into(), Value::from("success"));
                    ctx.insert("duration_seconds".into(), Value::from(elapsed));
                    events.emit(TrainingEvent::Completed, ctx).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                if let Some(events) = &events {
                    let mut ctx = base_context(pipeline, training);
                    ctx.insert("status".into(), Value::from("failed"));
                    ctx.insert("duration_seconds".into(), Value::from(elapsed));
                    ctx.insert("error".into(), Value::from(e.to_string()));
                    events.emit(TrainingEvent::Failed, ctx).await;
                }
            }
        }
        outcome
    }

    async fn train_window(
        &self,
        pipeline: &Pipeline,
        training: &TrainingConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: chrono::Duration,
    ) -> Result<Option<ModelId>, EngineError> {
        let rows = self.fetch(&pipeline.query, start, end, step).await?;
        if rows.is_empty() {
            info!(pipeline = %pipeline.name, %start, %end, "No data in training window");
            return Ok(None);
        }
        info!(pipeline = %pipeline.name, rows = rows.len(), "Training model");
        let model_id = call_port(
            PortKind::Model,
            self.timeouts.model(),
            self.model.train(&rows, &training.parameters),
        )
        .await?;
        Ok(Some(model_id))
    }
}

fn base_context(pipeline: &Pipeline, training: &TrainingConfig) -> Map<String, Value> {
    let mut ctx = Map::new();
    ctx.insert(
        "model_id".into(),
        pipeline
            .model
            .id
            .as_deref()
            .map_or(Value::Null, Value::from),
    );
    ctx.insert("training_window".into(), Value::from(training.window.as_str()));
    ctx
}
