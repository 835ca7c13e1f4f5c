//! Nested configuration blocks of a [`Pipeline`](super::Pipeline).

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Which result classes a pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    ForecastOnly,
    AnomalyOnly,
    #[default]
    ForecastAndAnomaly,
}

impl PipelineMode {
    pub fn runs_forecast(&self) -> bool {
        !matches!(self, PipelineMode::AnomalyOnly)
    }

    pub fn runs_anomaly(&self) -> bool {
        !matches!(self, PipelineMode::ForecastOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesType {
    #[default]
    Univariate,
    Multivariate,
    Covariate,
}

/// An extra series fed to covariate-aware models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Covariate {
    pub query: String,
    pub name: String,
}

// ── Forecast task ─────────────────────────────────────────────

fn default_forecast_schedule() -> String {
    "*/5 * * * *".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_forecast_schedule")]
    pub schedule: String,
    /// Overrides the default quantile set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<Vec<f64>>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_forecast_schedule(),
            quantiles: None,
        }
    }
}

// ── Anomaly task ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyTechnique {
    #[default]
    ConfidenceInterval,
    ZScore,
    Iqr,
    IsolationForest,
}

impl AnomalyTechnique {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyTechnique::ConfidenceInterval => "confidence_interval",
            AnomalyTechnique::ZScore => "z_score",
            AnomalyTechnique::Iqr => "iqr",
            AnomalyTechnique::IsolationForest => "isolation_forest",
        }
    }
}

impl std::fmt::Display for AnomalyTechnique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_anomaly_schedule() -> String {
    "*/1 * * * *".to_string()
}
fn default_confidence_level() -> f64 {
    0.95
}
fn default_threshold() -> f64 {
    3.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_anomaly_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub technique: AnomalyTechnique,
    /// Band coverage for `confidence_interval`.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Sigma multiple for `z_score`, IQR multiple for `iqr`.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Trailing residual count for `z_score`/`iqr`. 0 = whole check window.
    #[serde(default)]
    pub residual_window: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_anomaly_schedule(),
            technique: AnomalyTechnique::default(),
            confidence_level: default_confidence_level(),
            threshold: default_threshold(),
            residual_window: 0,
        }
    }
}

// ── Training task ─────────────────────────────────────────────

fn default_training_schedule() -> String {
    "0 0 * * *".to_string()
}
fn default_training_window() -> String {
    "30d".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_training_schedule")]
    pub schedule: String,
    /// Lookback of the training fetch.
    #[serde(default = "default_training_window")]
    pub window: String,
    /// Full training URL for remote models (e.g. `http://host/fit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<EventConfig>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_training_schedule(),
            window: default_training_window(),
            endpoint: None,
            parameters: serde_json::Map::new(),
            events: None,
        }
    }
}

fn default_topic() -> String {
    "training-events".to_string()
}
fn default_message_key() -> String {
    "{pipeline_name}".to_string()
}

/// Training lifecycle event publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Template for the message key; `{pipeline_name}` is substituted.
    #[serde(default = "default_message_key")]
    pub message_key: String,
    /// Custom message body. String values are templates over the event context.
    #[serde(default)]
    pub message_template: serde_json::Map<String, serde_json::Value>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            topic: default_topic(),
            message_key: default_message_key(),
            message_template: serde_json::Map::new(),
        }
    }
}

// ── Model ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    #[default]
    Json,
    Parquet,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(rename = "type", default)]
    pub kind: ModelKind,
    /// Model identifier for local models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Prediction URL for remote models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub serialization_format: SerializationFormat,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

// ── Output ────────────────────────────────────────────────────

fn default_metric_prefix() -> String {
    "tidewatch_".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub write_forecast: bool,
    #[serde(default = "default_true")]
    pub write_anomaly_score: bool,
    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_forecast: true,
            write_anomaly_score: true,
            metric_prefix: default_metric_prefix(),
        }
    }
}

// ── Infrastructure overrides ──────────────────────────────────

/// Per-pipeline store endpoints; unset fields fall back to global settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_url: Option<String>,
}

impl StoreOverrides {
    pub fn is_empty(&self) -> bool {
        self.read_url.is_none() && self.write_url.is_none()
    }
}
