//! Interfaces to the external collaborators the engine drives.
//!
//! Every port is an object-safe `async_trait` so adapters can be swapped
//! behind `Arc<dyn ...>`. Adapters report failures as [`PortError`]; the
//! engine decides what each kind means for a cycle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StoreEndpoints;
use crate::error::PortError;
use crate::pipeline::{AnomalyConfig, Pipeline};
use crate::schedule::ScheduleEntry;
use crate::series::{AnomalyScore, ForecastRequest, ForecastResult, ModelId, TimeSeriesRow};

/// Free-form parameter map forwarded to models verbatim.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Persistence for pipeline definitions.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Pipeline>, PortError>;

    async fn get(&self, name: &str) -> Result<Option<Pipeline>, PortError>;

    /// Insert or replace by name.
    async fn save(&self, pipeline: &Pipeline) -> Result<(), PortError>;

    /// Returns whether a pipeline with that name existed.
    async fn delete(&self, name: &str) -> Result<bool, PortError>;
}

#[async_trait]
impl<T: ConfigurationStore + ?Sized> ConfigurationStore for Arc<T> {
    async fn list(&self) -> Result<Vec<Pipeline>, PortError> {
        (**self).list().await
    }

    async fn get(&self, name: &str) -> Result<Option<Pipeline>, PortError> {
        (**self).get(name).await
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<(), PortError> {
        (**self).save(pipeline).await
    }

    async fn delete(&self, name: &str) -> Result<bool, PortError> {
        (**self).delete(name).await
    }
}

/// Range queries and batched writes against a time-series database.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Rows of every series matched by `query` within `[start, end]`.
    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: chrono::Duration,
    ) -> Result<Vec<TimeSeriesRow>, PortError>;

    /// Writes must be idempotent per `(series_id, timestamp)`.
    async fn write(&self, rows: &[TimeSeriesRow]) -> Result<(), PortError>;
}

#[async_trait]
impl<T: TimeSeriesStore + ?Sized> TimeSeriesStore for Arc<T> {
    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: chrono::Duration,
    ) -> Result<Vec<TimeSeriesRow>, PortError> {
        (**self).query_range(query, start, end, step).await
    }

    async fn write(&self, rows: &[TimeSeriesRow]) -> Result<(), PortError> {
        (**self).write(rows).await
    }
}

/// A forecasting model, local or behind a remote service.
#[async_trait]
pub trait ForecastingModel: Send + Sync {
    /// Forecast one series. `rows` are sorted by timestamp.
    async fn predict(
        &self,
        rows: &[TimeSeriesRow],
        request: &ForecastRequest,
    ) -> Result<ForecastResult, PortError>;

    async fn train(&self, rows: &[TimeSeriesRow], parameters: &Parameters)
        -> Result<ModelId, PortError>;

    async fn health_check(&self) -> Result<bool, PortError>;

    /// Model-native anomaly detection. Models without one report `Unsupported`.
    async fn detect_anomalies(
        &self,
        _actuals: &[TimeSeriesRow],
        _forecast: &ForecastResult,
        config: &AnomalyConfig,
    ) -> Result<Vec<AnomalyScore>, PortError> {
        Err(PortError::Unsupported(format!(
            "model has no native '{}' detection",
            config.technique
        )))
    }
}

#[async_trait]
impl<T: ForecastingModel + ?Sized> ForecastingModel for Arc<T> {
    async fn predict(
        &self,
        rows: &[TimeSeriesRow],
        request: &ForecastRequest,
    ) -> Result<ForecastResult, PortError> {
        (**self).predict(rows, request).await
    }

    async fn train(
        &self,
        rows: &[TimeSeriesRow],
        parameters: &Parameters,
    ) -> Result<ModelId, PortError> {
        (**self).train(rows, parameters).await
    }

    async fn health_check(&self) -> Result<bool, PortError> {
        (**self).health_check().await
    }

    async fn detect_anomalies(
        &self,
        actuals: &[TimeSeriesRow],
        forecast: &ForecastResult,
        config: &AnomalyConfig,
    ) -> Result<Vec<AnomalyScore>, PortError> {
        (**self).detect_anomalies(actuals, forecast, config).await
    }
}

/// Keyed store of recurring triggers.
///
/// Implementations own any cross-replica coordination; `upsert` and
/// `delete` must be idempotent by [`ScheduleEntry::name`].
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    async fn upsert(&self, entry: &ScheduleEntry) -> Result<(), PortError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, PortError>;

    async fn list(&self) -> Result<Vec<ScheduleEntry>, PortError>;

    async fn get(&self, key: &str) -> Result<Option<ScheduleEntry>, PortError> {
        Ok(self.list().await?.into_iter().find(|e| e.name == key))
    }
}

#[async_trait]
impl<T: SchedulerBackend + ?Sized> SchedulerBackend for Arc<T> {
    async fn upsert(&self, entry: &ScheduleEntry) -> Result<(), PortError> {
        (**self).upsert(entry).await
    }

    async fn delete(&self, key: &str) -> Result<bool, PortError> {
        (**self).delete(key).await
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, PortError> {
        (**self).list().await
    }

    async fn get(&self, key: &str) -> Result<Option<ScheduleEntry>, PortError> {
        (**self).get(key).await
    }
}

/// Best-effort message bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        message: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), PortError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        message: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), PortError> {
        (**self).publish(topic, message, key).await
    }
}

/// Builds per-pipeline model and store handles.
pub trait PortFactory: Send + Sync {
    fn model_for(&self, pipeline: &Pipeline) -> Result<Arc<dyn ForecastingModel>, PortError>;

    fn store_for(
        &self,
        pipeline: &Pipeline,
        endpoints: &StoreEndpoints,
    ) -> Result<Arc<dyn TimeSeriesStore>, PortError>;
}
