//! Tabular types that cross every port: rows in, forecasts out, scores back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quantile levels requested when a pipeline does not override them.
pub const DEFAULT_QUANTILES: [f64; 5] = [0.1, 0.5, 0.9, 0.95, 0.99];

/// Identifier or artifact reference returned by a training run.
pub type ModelId = String;

/// One observation of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    /// Encoded [`MetricId`](crate::MetricId) of the series.
    pub series_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesRow {
    pub fn new(series_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            series_id: series_id.into(),
            timestamp,
            value,
        }
    }
}

/// Group rows by series id, each group sorted by timestamp.
///
/// Rows with non-finite values are dropped; stores encode gaps as NaN.
pub fn group_by_series(rows: Vec<TimeSeriesRow>) -> BTreeMap<String, Vec<TimeSeriesRow>> {
    let mut groups: BTreeMap<String, Vec<TimeSeriesRow>> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| r.value.is_finite()) {
        groups.entry(row.series_id.clone()).or_default().push(row);
    }
    for rows in groups.values_mut() {
        rows.sort_by_key(|r| r.timestamp);
    }
    groups
}

/// Parameters handed to [`ForecastingModel::predict`](crate::ports::ForecastingModel::predict).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    /// Number of future points, always at least 1.
    pub prediction_length: usize,
    /// Ascending, deduplicated, each in (0, 1).
    pub quantile_levels: Vec<f64>,
    /// Spacing of the input rows, used to stamp future timestamps.
    #[serde(with = "seconds")]
    pub frequency: chrono::Duration,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Sort and deduplicate quantile levels.
pub fn normalize_levels(levels: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = levels.into_iter().filter(|l| l.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    out
}

/// Predicted value at one quantile level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileValue {
    pub level: f64,
    pub value: f64,
}

/// Model output for one future timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub mean: f64,
    /// Ascending by level.
    #[serde(default)]
    pub quantiles: Vec<QuantileValue>,
}

impl ForecastPoint {
    /// Value at the available level closest to `level`.
    pub fn nearest_quantile(&self, level: f64) -> Option<QuantileValue> {
        self.quantiles
            .iter()
            .copied()
            .min_by(|a, b| (a.level - level).abs().total_cmp(&(b.level - level).abs()))
    }
}

/// Forecast for a single series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// A [`ForecastResult`] tagged with the input series it was produced from.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub series_id: String,
    pub result: ForecastResult,
}

/// Anomaly verdict for one aligned timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub timestamp: DateTime<Utc>,
    pub actual_value: f64,
    pub predicted_value: f64,
    /// 0.0 = normal, 1.0 = maximally anomalous.
    pub score: f64,
    pub is_anomaly: bool,
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &chrono::Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<chrono::Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        chrono::Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom("frequency out of range"))
    }
}
