//! Training lifecycle events published to the message bus.
//!
//! Delivery is best-effort: a failed or slow publish is logged and dropped,
//! never surfaced to the training cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use tidewatch_core::pipeline::{EventConfig, TrainingConfig};
use tidewatch_core::ports::EventPublisher;
use tidewatch_core::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingEvent {
    Started,
    Completed,
    Failed,
}

impl TrainingEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingEvent::Started => "training_started",
            TrainingEvent::Completed => "training_completed",
            TrainingEvent::Failed => "training_failed",
        }
    }
}

/// Publishes lifecycle events for one training cycle.
pub(crate) struct TrainingEvents<'a> {
    publisher: Arc<dyn EventPublisher>,
    config: &'a EventConfig,
    pipeline_name: &'a str,
    key: String,
    timeout: Duration,
}

impl<'a> TrainingEvents<'a> {
    /// `None` when events are disabled or no publisher is attached.
    pub(crate) fn new(
        pipeline: &'a Pipeline,
        training: &'a TrainingConfig,
        publisher: Option<Arc<dyn EventPublisher>>,
        timeout: Duration,
    ) -> Option<Self> {
        let config = training.events.as_ref().filter(|e| e.enabled)?;
        let Some(publisher) = publisher else {
            debug!(pipeline = %pipeline.name, "Training events enabled but no publisher attached");
            return None;
        };
        Some(Self {
            publisher,
            config,
            pipeline_name: &pipeline.name,
            key: config.message_key.replace("{pipeline_name}", &pipeline.name),
            timeout,
        })
    }

    pub(crate) async fn emit(&self, event: TrainingEvent, context: Map<String, Value>) {
        let message = build_message(self.config, event, self.pipeline_name, Utc::now(), context);
        let publish = self
            .publisher
            .publish(&self.config.topic, &message, Some(&self.key));
        match tokio::time::timeout(self.timeout, publish).await {
            Ok(Ok(())) => debug!(
                pipeline = %self.pipeline_name,
                event = event.as_str(),
                topic = %self.config.topic,
                "Published training event"
            ),
            Ok(Err(e)) => warn!(
                pipeline = %self.pipeline_name,
                event = event.as_str(),
                error = %e,
                "Failed to publish training event"
            ),
            Err(_) => warn!(
                pipeline = %self.pipeline_name,
                event = event.as_str(),
                timeout = ?self.timeout,
                "Timed out publishing training event"
            ),
        }
    }
}

/// Build the message body for `event`.
///
/// Without a template the message is the event envelope plus `context`.
/// With one, string values are rendered against the envelope and context,
/// other values are copied verbatim, and any envelope or context key the
/// template does not mention is appended.
pub fn build_message(
    config: &EventConfig,
    event: TrainingEvent,
    pipeline_name: &str,
    at: DateTime<Utc>,
    context: Map<String, Value>,
) -> Value {
    let mut vars = Map::new();
    vars.insert("event_type".into(), Value::from(event.as_str()));
    vars.insert(
        "timestamp".into(),
        Value::from(at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    );
    vars.insert("pipeline_name".into(), Value::from(pipeline_name));
    vars.insert("event_id".into(), Value::from(uuid::Uuid::new_v4().to_string()));
    vars.extend(context);

    if config.message_template.is_empty() {
        return Value::Object(vars);
    }

    let mut message = Map::new();
    for (key, template) in &config.message_template {
        let value = match template {
            Value::String(s) => Value::String(render(s, &vars)),
            other => other.clone(),
        };
        message.insert(key.clone(), value);
    }
    for (key, value) in vars {
        message.entry(key).or_insert(value);
    }
    Value::Object(message)
}

/// Substitute `{name}` placeholders; unknown placeholders are left as written.
fn render(template: &str, vars: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match vars.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(Value::Null) => {}
                    Some(v) => out.push_str(&v.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
