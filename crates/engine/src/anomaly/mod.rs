//! Anomaly check: compare the latest actuals with what the model expected.
//!
//! The check window is the most recent `prediction_horizon`. The forecast is
//! regenerated from the context window that ends where the check window
//! starts, so each actual is scored against a prediction made without it.

pub mod scoring;


use chrono::{DateTime, Utc};
use tracing::info;

use tidewatch_core::metric_id;
use tidewatch_core::pipeline::AnomalyTechnique;
use tidewatch_core::series::{group_by_series, normalize_levels};
use tidewatch_core::{AnomalyScore, ForecastResult, Pipeline, PortError, TimeSeriesRow};

use crate::error::{EngineError, PortKind};
use crate::executor::{duration_field, window_start, Executor};
use crate::forecast::output_labels;

pub use scoring::Aligned;

/// Scores for one input series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAnomalies {
    pub series_id: String,
    pub scores: Vec<AnomalyScore>,
}

impl SeriesAnomalies {
    pub fn anomalous(&self) -> usize {
        self.scores.iter().filter(|s| s.is_anomaly).count()
    }
}

impl Executor {
    /// Score the check window and write the results. Returns the scores.
    pub async fn run_anomaly_check(
        &self,
        pipeline: &Pipeline,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesAnomalies>, EngineError> {
        let config = &pipeline.anomaly;
        let horizon = duration_field("prediction_horizon", &pipeline.prediction_horizon)?;
        let context = duration_field("context_window", &pipeline.context_window)?;
        let step = duration_field("step", &pipeline.step)?;
        pipeline.prediction_length()?;
        let anchor = window_start("prediction_horizon", now, horizon)?;
        let context_start = window_start("context_window", anchor, context)?;

        let actual_rows = self.fetch(&pipeline.query, anchor, now, step).await?;
        if actual_rows.is_empty() {
            info!(pipeline = %pipeline.name, "No actuals in check window");
            return Ok(Vec::new());
        }
        let actuals = group_by_series(actual_rows);

        let mut levels = pipeline.quantile_levels();
        if config.technique == AnomalyTechnique::ConfidenceInterval {
            let (low, high) = scoring::band_levels(config.confidence_level);
            levels = normalize_levels(levels.into_iter().chain([low, high]));
        }
        let forecasts = self
            .forecast_window(pipeline, context_start, anchor, levels)
            .await?;
        if forecasts.is_empty() {
            info!(pipeline = %pipeline.name, "No forecast to compare against");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(forecasts.len());
        for forecast in &forecasts {
            let Some(series_actuals) = actuals.get(&forecast.series_id) else {
                info!(
                    pipeline = %pipeline.name,
                    series = %forecast.series_id,
                    "No actuals for forecast series, skipping"
                );
                continue;
            };
            let scores = match config.technique {
                AnomalyTechnique::IsolationForest => {
                    self.delegated_scores(pipeline, series_actuals, &forecast.result)
                        .await?
                }
                _ => {
                    let aligned = align(&forecast.result, series_actuals, step);
                    scoring::score(config, &aligned)?
                }
            };
            results.push(SeriesAnomalies {
                series_id: forecast.series_id.clone(),
                scores,
            });
        }

        let scored: usize = results.iter().map(|r| r.scores.len()).sum();
        let anomalous: usize = results.iter().map(SeriesAnomalies::anomalous).sum();
        info!(
            pipeline = %pipeline.name,
            technique = %config.technique,
            scored,
            anomalous,
            "Anomaly check complete"
        );

        if !pipeline.output.write_anomaly_score {
            info!(pipeline = %pipeline.name, "Anomaly output disabled, skipping write");
            return Ok(results);
        }
        let rows = anomaly_rows(pipeline, &results);
        if !rows.is_empty() {
            self.write_rows(&rows).await?;
        }
        Ok(results)
    }

    async fn delegated_scores(
        &self,
        pipeline: &Pipeline,
        actuals: &[TimeSeriesRow],
        forecast: &ForecastResult,
    ) -> Result<Vec<AnomalyScore>, EngineError> {
        let after = self.timeouts.model();
        let call = self
            .model
            .detect_anomalies(actuals, forecast, &pipeline.anomaly);
        let outcome = tokio::time::timeout(after, call)
            .await
            .map_err(|_| EngineError::PortTimeout {
                port: PortKind::Model,
                after,
            })?;
        let mut scores = outcome.map_err(|err| match err {
            PortError::Unsupported(reason) => EngineError::UnsupportedTechnique {
                technique: pipeline.anomaly.technique,
                reason,
            },
            other => EngineError::from_port(PortKind::Model, after, other),
        })?;
        for s in &mut scores {
            s.score = s.score.clamp(0.0, 1.0);
        }
        Ok(scores)
    }
}

/// Pair each forecast point with the nearest actual within half a step.
///
/// Points with no such actual are dropped.
pub fn align<'a>(
    forecast: &'a ForecastResult,
    actuals: &[TimeSeriesRow],
    step: chrono::Duration,
) -> Vec<Aligned<'a>> {
    let tolerance = step / 2;
    forecast
        .points
        .iter()
        .filter_map(|point| {
            actuals
                .iter()
                .filter(|row| (row.timestamp - point.timestamp).abs() <= tolerance)
                .min_by_key(|row| (row.timestamp - point.timestamp).abs())
                .map(|row| Aligned {
                    timestamp: point.timestamp,
                    actual: row.value,
                    point,
                })
        })
        .collect()
}

/// Shape scores into store rows: `type="anomaly_score"` and `type="is_anomaly"`.
pub fn anomaly_rows(pipeline: &Pipeline, results: &[SeriesAnomalies]) -> Vec<TimeSeriesRow> {
    let name = format!("{}_anomaly", pipeline.output_base_name());
    let mut rows = Vec::new();

    for series in results {
        let base = output_labels(pipeline, &series.series_id);
        let mut score_labels = base.clone();
        score_labels.insert("type".to_string(), "anomaly_score".to_string());
        let score_id = metric_id::encode(&name, &score_labels);
        let mut flag_labels = base;
        flag_labels.insert("type".to_string(), "is_anomaly".to_string());
        let flag_id = metric_id::encode(&name, &flag_labels);

        for s in &series.scores {
            rows.push(TimeSeriesRow::new(score_id.clone(), s.timestamp, s.score));
            let flag = if s.is_anomaly { 1.0 } else { 0.0 };
            rows.push(TimeSeriesRow::new(flag_id.clone(), s.timestamp, flag));
        }
    }
    rows
}
