//! Forecast loop: fetch context, predict per series, shape and write output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use tidewatch_core::metric_id;
use tidewatch_core::series::group_by_series;
use tidewatch_core::{ForecastRequest, Pipeline, SeriesForecast, TimeSeriesRow};

use crate::error::EngineError;
use crate::executor::{duration_field, window_start, Executor};

/// Labels the engine sets on output series; source labels never override them.
const RESERVED_LABELS: [&str; 4] = ["pipeline", "source", "type", "quantile"];

impl Executor {
    /// Fetch, predict and write one forecast cycle. Returns the rows written.
    pub async fn run_forecast(
        &self,
        pipeline: &Pipeline,
        now: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let forecasts = self.generate_forecast(pipeline, now).await?;
        if forecasts.is_empty() {
            return Ok(0);
        }
        self.write_forecast_results(pipeline, &forecasts).await
    }

    /// Forecast every series the pipeline query returns over its context window.
    ///
    /// An empty fetch returns an empty list without calling the model.
    pub async fn generate_forecast(
        &self,
        pipeline: &Pipeline,
        now: DateTime<Utc>,
    ) -> Result<Vec<SeriesForecast>, EngineError> {
        let context = duration_field("context_window", &pipeline.context_window)?;
        let start = window_start("context_window", now, context)?;
        self.forecast_window(pipeline, start, now, pipeline.quantile_levels())
            .await
    }

    /// Forecast from rows in `[start, end]`, asking the model for `levels`.
    pub(crate) async fn forecast_window(
        &self,
        pipeline: &Pipeline,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        levels: Vec<f64>,
    ) -> Result<Vec<SeriesForecast>, EngineError> {
        let prediction_length = pipeline.prediction_length()?;
        let step = duration_field("step", &pipeline.step)?;

        let rows = self.fetch(&pipeline.query, start, end, step).await?;
        if rows.is_empty() {
            info!(pipeline = %pipeline.name, %start, %end, "No data in context window");
            return Ok(Vec::new());
        }

        let groups = group_by_series(rows);
        let mut inputs = Vec::with_capacity(groups.len());
        for (series_id, rows) in groups {
            let frequency = infer_frequency(&series_id, &rows)?;
            inputs.push((series_id, rows, frequency));
        }

        let mut forecasts = Vec::with_capacity(inputs.len());
        for (series_id, rows, frequency) in inputs {
            let request = ForecastRequest {
                prediction_length,
                quantile_levels: levels.clone(),
                frequency,
                parameters: pipeline.model.parameters.clone(),
            };
            let mut result = self.predict(&rows, &request).await?;
            if result.is_empty() {
                info!(pipeline = %pipeline.name, series = %series_id, "Model returned no forecast");
                continue;
            }
            if result.len() > prediction_length {
                warn!(
                    pipeline = %pipeline.name,
                    series = %series_id,
                    returned = result.len(),
                    expected = prediction_length,
                    "Model returned extra points, truncating"
                );
                result.points.truncate(prediction_length);
            } else if result.len() < prediction_length {
                warn!(
                    pipeline = %pipeline.name,
                    series = %series_id,
                    returned = result.len(),
                    expected = prediction_length,
                    "Model returned fewer points than requested"
                );
            }
            forecasts.push(SeriesForecast { series_id, result });
        }
        Ok(forecasts)
    }

    /// Write shaped forecast rows in one batch. Returns the rows written.
    pub async fn write_forecast_results(
        &self,
        pipeline: &Pipeline,
        forecasts: &[SeriesForecast],
    ) -> Result<usize, EngineError> {
        if !pipeline.output.write_forecast {
            info!(pipeline = %pipeline.name, "Forecast output disabled, skipping write");
            return Ok(0);
        }
        let rows = forecast_rows(pipeline, forecasts);
        if rows.is_empty() {
            return Ok(0);
        }
        self.write_rows(&rows).await?;
        info!(pipeline = %pipeline.name, rows = rows.len(), "Wrote forecast points");
        Ok(rows.len())
    }
}

/// Spacing between the last two rows of a sorted series.
fn infer_frequency(series_id: &str, rows: &[TimeSeriesRow]) -> Result<chrono::Duration, EngineError> {
    let [.., prev, last] = rows else {
        return Err(EngineError::insufficient(
            series_id,
            format!("need at least 2 rows to infer cadence, got {}", rows.len()),
        ));
    };
    let frequency = last.timestamp - prev.timestamp;
    if frequency <= chrono::Duration::zero() {
        return Err(EngineError::insufficient(
            series_id,
            format!("last two rows share timestamp {}", last.timestamp),
        ));
    }
    Ok(frequency)
}

/// Label set common to every output row derived from `series_id`.
///
/// The series' own labels are carried over, except reserved keys and labels
/// the pipeline query pins with an exact matcher. The result depends only on
/// the pipeline and the series, so forecast and anomaly rows for one source
/// series always share their labels.
pub(crate) fn output_labels(pipeline: &Pipeline, series_id: &str) -> BTreeMap<String, String> {
    let (_, pinned) = metric_id::decode(&pipeline.query);
    let (_, source_labels) = metric_id::decode(series_id);

    let mut labels: BTreeMap<String, String> = source_labels
        .into_iter()
        .filter(|(k, _)| !RESERVED_LABELS.contains(&k.as_str()) && !pinned.contains_key(k))
        .collect();
    labels.insert("pipeline".to_string(), pipeline.name.clone());
    labels.insert("source".to_string(), pipeline.source_metric());
    labels
}

/// Shape forecasts into store rows: one `type="mean"` row and one
/// `quantile="<level>"` row per level, per timestamp.
pub fn forecast_rows(pipeline: &Pipeline, forecasts: &[SeriesForecast]) -> Vec<TimeSeriesRow> {
    let name = format!("{}_forecast", pipeline.output_base_name());
    let mut rows = Vec::new();

    for forecast in forecasts {
        let base = output_labels(pipeline, &forecast.series_id);

        let mut mean_labels = base.clone();
        mean_labels.insert("type".to_string(), "mean".to_string());
        let mean_id = metric_id::encode(&name, &mean_labels);

        for point in &forecast.result.points {
            rows.push(TimeSeriesRow::new(mean_id.clone(), point.timestamp, point.mean));
            for q in &point.quantiles {
                let mut labels = base.clone();
                labels.insert("quantile".to_string(), q.level.to_string());
                rows.push(TimeSeriesRow::new(
                    metric_id::encode(&name, &labels),
                    point.timestamp,
                    q.value,
                ));
            }
        }
    }
    rows
}
