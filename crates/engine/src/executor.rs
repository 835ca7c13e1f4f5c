//! Port handles for one task cycle, plus timeout-bounded port calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tidewatch_core::config::TimeoutSettings;
use tidewatch_core::duration::parse_chrono;
use tidewatch_core::ports::{EventPublisher, ForecastingModel, TimeSeriesStore};
use tidewatch_core::{
    ForecastRequest, ForecastResult, PipelineError, PortError, TimeSeriesRow,
};

use crate::error::{EngineError, PortKind};

/// Executes forecast, anomaly and training cycles against one model and one store.
///
/// Holds no mutable state; a single executor may run cycles concurrently.
pub struct Executor {
    pub(crate) model: Arc<dyn ForecastingModel>,
    pub(crate) store: Arc<dyn TimeSeriesStore>,
    pub(crate) events: Option<Arc<dyn EventPublisher>>,
    pub(crate) timeouts: TimeoutSettings,
}

impl Executor {
    pub fn new(
        model: Arc<dyn ForecastingModel>,
        store: Arc<dyn TimeSeriesStore>,
        timeouts: TimeoutSettings,
    ) -> Self {
        Self {
            model,
            store,
            events: None,
            timeouts,
        }
    }

    /// Attach a publisher for training lifecycle events.
    pub fn with_events(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(publisher);
        self
    }

    pub(crate) async fn fetch(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: chrono::Duration,
    ) -> Result<Vec<TimeSeriesRow>, EngineError> {
        call_port(
            PortKind::Store,
            self.timeouts.fetch(),
            self.store.query_range(query, start, end, step),
        )
        .await
    }

    pub(crate) async fn write_rows(&self, rows: &[TimeSeriesRow]) -> Result<(), EngineError> {
        call_port(PortKind::Store, self.timeouts.fetch(), self.store.write(rows)).await
    }

    pub(crate) async fn predict(
        &self,
        rows: &[TimeSeriesRow],
        request: &ForecastRequest,
    ) -> Result<ForecastResult, EngineError> {
        call_port(
            PortKind::Model,
            self.timeouts.model(),
            self.model.predict(rows, request),
        )
        .await
    }
}

/// Await a port call under `after`, mapping failures onto engine errors.
pub(crate) async fn call_port<T, F>(port: PortKind, after: Duration, call: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, PortError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(EngineError::from_port(port, after, err)),
        Err(_) => Err(EngineError::PortTimeout { port, after }),
    }
}

/// Parse a pipeline duration field, attributing failures to the field.
pub(crate) fn duration_field(
    field: &'static str,
    value: &str,
) -> Result<chrono::Duration, EngineError> {
    parse_chrono(value)
        .map_err(|source| EngineError::Configuration(PipelineError::Duration { field, source }))
}

/// `end - span`, or a configuration error when that instant is out of range.
pub(crate) fn window_start(
    field: &'static str,
    end: DateTime<Utc>,
    span: chrono::Duration,
) -> Result<DateTime<Utc>, EngineError> {
    end.checked_sub_signed(span).ok_or_else(|| {
        EngineError::Configuration(PipelineError::Invalid {
            field,
            reason: format!("window reaches past the earliest representable time from {end}"),
        })
    })
}
