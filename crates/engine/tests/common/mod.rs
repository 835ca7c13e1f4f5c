//! Hand-written port doubles shared by the engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use tidewatch_core::config::TimeoutSettings;
use tidewatch_core::pipeline::AnomalyConfig;
use tidewatch_core::ports::{
    ConfigurationStore, EventPublisher, ForecastingModel, Parameters, PortFactory, TimeSeriesStore,
};
use tidewatch_core::{
    AnomalyScore, ForecastPoint, ForecastRequest, ForecastResult, ModelId, Pipeline, PortError,
    QuantileValue, StoreEndpoints, TimeSeriesRow,
};
use tidewatch_engine::Executor;

/// Fixed "now" aligned to a minute boundary.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// One row per minute for `minutes` minutes ending at `end`, all with `value`.
pub fn minutely(series: &str, end: DateTime<Utc>, minutes: i64, value: f64) -> Vec<TimeSeriesRow> {
    (0..=minutes)
        .map(|i| TimeSeriesRow::new(series, end - Duration::minutes(minutes - i), value))
        .collect()
}

// ── Store ─────────────────────────────────────────────────────

pub struct MockStore {
    pub data: Mutex<Vec<TimeSeriesRow>>,
    pub fetch_count: AtomicUsize,
    pub fetches: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    pub written: Mutex<Vec<Vec<TimeSeriesRow>>>,
    pub fail_with: Mutex<Option<PortError>>,
}

impl MockStore {
    pub fn new(data: Vec<TimeSeriesRow>) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            fetch_count: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
        })
    }

    pub fn failing(err: PortError) -> Arc<Self> {
        let store = Self::new(Vec::new());
        *store.fail_with.lock().unwrap() = Some(err);
        store
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn written_rows(&self) -> Vec<TimeSeriesRow> {
        self.written.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn write_calls(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

#[async_trait]
impl TimeSeriesStore for MockStore {
    async fn query_range(
        &self,
        _query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<Vec<TimeSeriesRow>, PortError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.fetches.lock().unwrap().push((start, end));
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .data
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect())
    }

    async fn write(&self, rows: &[TimeSeriesRow]) -> Result<(), PortError> {
        self.written.lock().unwrap().push(rows.to_vec());
        Ok(())
    }
}

// ── Model ─────────────────────────────────────────────────────

/// Predicts a flat `mean` with quantiles spread `±spread/2` around it.
pub struct MockModel {
    pub mean: f64,
    pub spread: f64,
    pub predict_count: AtomicUsize,
    pub train_count: AtomicUsize,
    pub requests: Mutex<Vec<ForecastRequest>>,
    pub train_rows: Mutex<Vec<usize>>,
    pub train_error: Mutex<Option<PortError>>,
    pub native_anomalies: bool,
    /// Series ids the model returns an empty forecast for.
    pub empty_for: Mutex<Vec<String>>,
    /// Caps the number of points returned per forecast.
    pub max_points: Mutex<Option<usize>>,
}

impl MockModel {
    pub fn new(mean: f64, spread: f64) -> Arc<Self> {
        Arc::new(Self::build(mean, spread, false))
    }

    pub fn with_native_anomalies(mean: f64) -> Arc<Self> {
        Arc::new(Self::build(mean, 1.0, true))
    }

    fn build(mean: f64, spread: f64, native_anomalies: bool) -> Self {
        Self {
            mean,
            spread,
            predict_count: AtomicUsize::new(0),
            train_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            train_rows: Mutex::new(Vec::new()),
            train_error: Mutex::new(None),
            native_anomalies,
            empty_for: Mutex::new(Vec::new()),
            max_points: Mutex::new(None),
        }
    }

    pub fn predictions(&self) -> usize {
        self.predict_count.load(Ordering::Relaxed)
    }

    pub fn trainings(&self) -> usize {
        self.train_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ForecastingModel for MockModel {
    async fn predict(
        &self,
        rows: &[TimeSeriesRow],
        request: &ForecastRequest,
    ) -> Result<ForecastResult, PortError> {
        self.predict_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().unwrap().push(request.clone());
        let last = rows
            .last()
            .ok_or_else(|| PortError::Rejected("no rows".into()))?
            .timestamp;
        if self.empty_for.lock().unwrap().contains(&rows[0].series_id) {
            return Ok(ForecastResult::default());
        }
        let length = match *self.max_points.lock().unwrap() {
            Some(max) => request.prediction_length.min(max),
            None => request.prediction_length,
        };
        let points = (1..=length as i32)
            .map(|i| ForecastPoint {
                timestamp: last + request.frequency * i,
                mean: self.mean,
                quantiles: request
                    .quantile_levels
                    .iter()
                    .map(|&level| QuantileValue {
                        level,
                        value: self.mean + (level - 0.5) * self.spread,
                    })
                    .collect(),
            })
            .collect();
        Ok(ForecastResult { points })
    }

    async fn train(&self, rows: &[TimeSeriesRow], _parameters: &Parameters) -> Result<ModelId, PortError> {
        self.train_count.fetch_add(1, Ordering::Relaxed);
        self.train_rows.lock().unwrap().push(rows.len());
        if let Some(err) = self.train_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok("model-v2".to_string())
    }

    async fn health_check(&self) -> Result<bool, PortError> {
        Ok(true)
    }

    async fn detect_anomalies(
        &self,
        actuals: &[TimeSeriesRow],
        _forecast: &ForecastResult,
        config: &AnomalyConfig,
    ) -> Result<Vec<AnomalyScore>, PortError> {
        if !self.native_anomalies {
            return Err(PortError::Unsupported(format!("no native '{}'", config.technique)));
        }
        Ok(actuals
            .iter()
            .map(|r| {
                let is_anomaly = (r.value - self.mean).abs() > 5.0;
                AnomalyScore {
                    timestamp: r.timestamp,
                    actual_value: r.value,
                    predicted_value: self.mean,
                    score: if is_anomaly { 1.5 } else { 0.0 },
                    is_anomaly,
                }
            })
            .collect())
    }
}

/// Forwards to a [`MockModel`] but never answers the chosen call.
pub struct HangingModel {
    pub inner: Arc<MockModel>,
    pub hang_predict: bool,
    pub hang_detect: bool,
}

impl HangingModel {
    pub fn on_predict(inner: Arc<MockModel>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hang_predict: true,
            hang_detect: false,
        })
    }

    pub fn on_detect(inner: Arc<MockModel>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            hang_predict: false,
            hang_detect: true,
        })
    }
}

#[async_trait]
impl ForecastingModel for HangingModel {
    async fn predict(
        &self,
        rows: &[TimeSeriesRow],
        request: &ForecastRequest,
    ) -> Result<ForecastResult, PortError> {
        if self.hang_predict {
            std::future::pending::<()>().await;
        }
        self.inner.predict(rows, request).await
    }

    async fn train(&self, rows: &[TimeSeriesRow], parameters: &Parameters) -> Result<ModelId, PortError> {
        self.inner.train(rows, parameters).await
    }

    async fn health_check(&self) -> Result<bool, PortError> {
        Ok(true)
    }

    async fn detect_anomalies(
        &self,
        actuals: &[TimeSeriesRow],
        forecast: &ForecastResult,
        config: &AnomalyConfig,
    ) -> Result<Vec<AnomalyScore>, PortError> {
        if self.hang_detect {
            std::future::pending::<()>().await;
        }
        self.inner.detect_anomalies(actuals, forecast, config).await
    }
}

/// A store whose every call waits forever.
pub struct HangingStore;

#[async_trait]
impl TimeSeriesStore for HangingStore {
    async fn query_range(
        &self,
        _query: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _step: Duration,
    ) -> Result<Vec<TimeSeriesRow>, PortError> {
        std::future::pending().await
    }

    async fn write(&self, _rows: &[TimeSeriesRow]) -> Result<(), PortError> {
        std::future::pending().await
    }
}

// ── Event bus ─────────────────────────────────────────────────

pub struct MockPublisher {
    pub messages: Mutex<Vec<(String, serde_json::Value, Option<String>)>>,
    pub fail: bool,
}

impl MockPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn event_types(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m, _)| m["event_type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish(
        &self,
        topic: &str,
        message: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), PortError> {
        if self.fail {
            return Err(PortError::Unavailable("broker down".into()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), message.clone(), key.map(str::to_string)));
        Ok(())
    }
}

/// A publisher that never acknowledges.
pub struct HangingPublisher;

#[async_trait]
impl EventPublisher for HangingPublisher {
    async fn publish(
        &self,
        _topic: &str,
        _message: &serde_json::Value,
        _key: Option<&str>,
    ) -> Result<(), PortError> {
        std::future::pending().await
    }
}

// ── Configuration store and factory ───────────────────────────

pub struct MockConfigs {
    pub pipelines: Mutex<HashMap<String, Pipeline>>,
}

impl MockConfigs {
    pub fn with(pipelines: Vec<Pipeline>) -> Arc<Self> {
        Arc::new(Self {
            pipelines: Mutex::new(pipelines.into_iter().map(|p| (p.name.clone(), p)).collect()),
        })
    }
}

#[async_trait]
impl ConfigurationStore for MockConfigs {
    async fn list(&self) -> Result<Vec<Pipeline>, PortError> {
        Ok(self.pipelines.lock().unwrap().values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<Pipeline>, PortError> {
        Ok(self.pipelines.lock().unwrap().get(name).cloned())
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<(), PortError> {
        self.pipelines
            .lock()
            .unwrap()
            .insert(pipeline.name.clone(), pipeline.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, PortError> {
        Ok(self.pipelines.lock().unwrap().remove(name).is_some())
    }
}

/// Hands out the same model and store to every pipeline, recording endpoints.
pub struct MockFactory {
    pub model: Arc<MockModel>,
    pub store: Arc<MockStore>,
    pub endpoints: Mutex<Vec<StoreEndpoints>>,
}

impl MockFactory {
    pub fn new(model: Arc<MockModel>, store: Arc<MockStore>) -> Arc<Self> {
        Arc::new(Self {
            model,
            store,
            endpoints: Mutex::new(Vec::new()),
        })
    }
}

impl PortFactory for MockFactory {
    fn model_for(&self, _pipeline: &Pipeline) -> Result<Arc<dyn ForecastingModel>, PortError> {
        Ok(self.model.clone())
    }

    fn store_for(
        &self,
        _pipeline: &Pipeline,
        endpoints: &StoreEndpoints,
    ) -> Result<Arc<dyn TimeSeriesStore>, PortError> {
        self.endpoints.lock().unwrap().push(endpoints.clone());
        Ok(self.store.clone())
    }
}

pub fn executor(model: &Arc<MockModel>, store: &Arc<MockStore>) -> Executor {
    Executor::new(model.clone(), store.clone(), TimeoutSettings::default())
}
