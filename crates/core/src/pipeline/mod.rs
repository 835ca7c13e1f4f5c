//! Pipeline configuration: one monitored query, its model, and its schedules.
//!
//! A [`Pipeline`] is a plain value. Storage backends map their own record
//! shapes onto it; the engine only ever sees this type. Call
//! [`Pipeline::validate`] before persisting or scheduling a definition.

mod types;

#[cfg(test)]
mod tests;

use crate::cron::parse_cron;
use crate::duration::parse_duration;
use crate::error::PipelineError;
use crate::metric_id::MetricId;
use crate::schedule::TaskKind;

pub use types::{
    AnomalyConfig, AnomalyTechnique, Covariate, EventConfig, ForecastConfig, ModelConfig,
    ModelKind, OutputConfig, PipelineMode, SerializationFormat, SeriesType, StoreOverrides,
    TrainingConfig,
};

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}
fn default_step() -> String {
    "1m".to_string()
}
fn default_context_window() -> String {
    "1h".to_string()
}
fn default_prediction_horizon() -> String {
    "15m".to_string()
}

/// Complete pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    // ── Identity ──
    /// Unique, immutable key. Embedded in scheduler keys and output metric names.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Master switch for every task.
    #[serde(default = "default_true")]
    pub enabled: bool,

    // ── Data source ──
    /// Store-specific selector, e.g. a PromQL expression.
    pub query: String,
    /// Sampling interval of the query, e.g. `"1m"`.
    #[serde(default = "default_step")]
    pub step: String,

    // ── Windows ──
    #[serde(default = "default_context_window")]
    pub context_window: String,
    #[serde(default = "default_prediction_horizon")]
    pub prediction_horizon: String,

    #[serde(default)]
    pub mode: PipelineMode,

    // ── Series shape ──
    #[serde(default)]
    pub series_type: SeriesType,
    #[serde(default)]
    pub covariates: Vec<Covariate>,

    // ── Tasks ──
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub training: Option<TrainingConfig>,

    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,

    /// Alternate store endpoints for this pipeline only.
    #[serde(default, skip_serializing_if = "StoreOverrides::is_empty")]
    pub store: StoreOverrides,
}

impl Pipeline {
    /// A pipeline with every optional field at its default.
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            enabled: true,
            query: query.into(),
            step: default_step(),
            context_window: default_context_window(),
            prediction_horizon: default_prediction_horizon(),
            mode: PipelineMode::default(),
            series_type: SeriesType::default(),
            covariates: Vec::new(),
            forecast: ForecastConfig::default(),
            anomaly: AnomalyConfig::default(),
            training: None,
            model: ModelConfig::default(),
            output: OutputConfig::default(),
            store: StoreOverrides::default(),
        }
    }

    /// Check every field that must parse or satisfy a bound.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_name(&self.name)?;
        if self.query.trim().is_empty() {
            return Err(PipelineError::invalid("query", "must not be empty"));
        }

        let step = window_duration("step", &self.step)?;
        window_duration("context_window", &self.context_window)?;
        let horizon = window_duration("prediction_horizon", &self.prediction_horizon)?;
        if horizon < step {
            return Err(PipelineError::invalid(
                "prediction_horizon",
                format!(
                    "'{}' is shorter than step '{}'",
                    self.prediction_horizon, self.step
                ),
            ));
        }

        validate_cron("forecast.schedule", &self.forecast.schedule)?;
        validate_cron("anomaly.schedule", &self.anomaly.schedule)?;

        if let Some(levels) = &self.forecast.quantiles {
            if levels.is_empty() {
                return Err(PipelineError::invalid("forecast.quantiles", "must not be empty"));
            }
            if let Some(bad) = levels.iter().find(|l| !(**l > 0.0 && **l < 1.0)) {
                return Err(PipelineError::invalid(
                    "forecast.quantiles",
                    format!("level {bad} is outside (0, 1)"),
                ));
            }
        }

        let level = self.anomaly.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(PipelineError::invalid(
                "anomaly.confidence_level",
                format!("{level} is outside (0, 1)"),
            ));
        }
        if !(self.anomaly.threshold.is_finite() && self.anomaly.threshold > 0.0) {
            return Err(PipelineError::invalid(
                "anomaly.threshold",
                format!("{} must be a positive number", self.anomaly.threshold),
            ));
        }

        if let Some(training) = &self.training {
            validate_cron("training.schedule", &training.schedule)?;
            window_duration("training.window", &training.window)?;
            if let Some(events) = &training.events {
                if events.topic.trim().is_empty() {
                    return Err(PipelineError::invalid(
                        "training.events.topic",
                        "must not be empty",
                    ));
                }
            }
        }

        if self.model.kind == ModelKind::Remote
            && self.model.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(PipelineError::invalid(
                "model.endpoint",
                "required for remote models",
            ));
        }

        if self.series_type == SeriesType::Covariate && self.covariates.is_empty() {
            return Err(PipelineError::invalid(
                "covariates",
                "covariate pipelines need at least one covariate",
            ));
        }
        for cov in &self.covariates {
            if cov.name.trim().is_empty() || cov.query.trim().is_empty() {
                return Err(PipelineError::invalid(
                    "covariates",
                    "each covariate needs a name and a query",
                ));
            }
        }

        Ok(())
    }

    /// Number of future points per forecast: `horizon / step`, truncated.
    pub fn prediction_length(&self) -> Result<usize, PipelineError> {
        let horizon = duration_field("prediction_horizon", &self.prediction_horizon)?;
        let step = positive_duration("step", &self.step)?;
        let length = horizon / step;
        if length < 1 {
            return Err(PipelineError::invalid(
                "prediction_horizon",
                format!(
                    "'{}' yields no points at step '{}'",
                    self.prediction_horizon, self.step
                ),
            ));
        }
        usize::try_from(length)
            .map_err(|_| PipelineError::invalid("prediction_horizon", "too many points"))
    }

    /// Quantile levels the forecast request asks for.
    pub fn quantile_levels(&self) -> Vec<f64> {
        match &self.forecast.quantiles {
            Some(levels) => crate::series::normalize_levels(levels.iter().copied()),
            None => crate::series::DEFAULT_QUANTILES.to_vec(),
        }
    }

    /// Metric name of the queried series, used as the `source` label.
    pub fn source_metric(&self) -> String {
        MetricId::decode(&self.query).name
    }

    /// Whether the scheduler should carry an entry for `kind`.
    pub fn task_enabled(&self, kind: TaskKind) -> bool {
        if !self.enabled {
            return false;
        }
        match kind {
            TaskKind::Forecast => self.forecast.enabled,
            TaskKind::Anomaly => self.anomaly.enabled,
            TaskKind::Training => self.training.as_ref().is_some_and(|t| t.enabled),
        }
    }

    /// Cron expression for `kind`, if the pipeline defines one.
    pub fn task_schedule(&self, kind: TaskKind) -> Option<&str> {
        match kind {
            TaskKind::Forecast => Some(self.forecast.schedule.as_str()),
            TaskKind::Anomaly => Some(self.anomaly.schedule.as_str()),
            TaskKind::Training => self.training.as_ref().map(|t| t.schedule.as_str()),
        }
    }

    /// `{metric_prefix}{name}`, the stem of every output metric.
    pub fn output_base_name(&self) -> String {
        format!("{}{}", self.output.metric_prefix, self.name)
    }
}

fn validate_name(name: &str) -> Result<(), PipelineError> {
    if name.is_empty() {
        return Err(PipelineError::invalid("name", "must not be empty"));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(PipelineError::invalid(
            "name",
            format!("character '{bad}' is not allowed"),
        ));
    }
    Ok(())
}

fn duration_field(field: &'static str, value: &str) -> Result<u64, PipelineError> {
    parse_duration(value).map_err(|source| PipelineError::Duration { field, source })
}

fn positive_duration(field: &'static str, value: &str) -> Result<u64, PipelineError> {
    let secs = duration_field(field, value)?;
    if secs == 0 {
        return Err(PipelineError::invalid(field, "must be greater than zero"));
    }
    Ok(secs)
}

/// Longest window a pipeline may declare: 100 years of 365 days.
const MAX_WINDOW_SECS: u64 = 100 * 365 * 86_400;

/// A positive duration short enough to subtract from any current instant.
fn window_duration(field: &'static str, value: &str) -> Result<u64, PipelineError> {
    let secs = positive_duration(field, value)?;
    if secs > MAX_WINDOW_SECS {
        return Err(PipelineError::invalid(
            field,
            format!("'{value}' exceeds the 36500d maximum"),
        ));
    }
    Ok(secs)
}

fn validate_cron(field: &'static str, expression: &str) -> Result<(), PipelineError> {
    parse_cron(expression)
        .map(|_| ())
        .map_err(|reason| PipelineError::Cron {
            field,
            expression: expression.to_string(),
            reason,
        })
}
