//! [`InMemorySchedulerBackend`]: a single-process scheduler backend.
//!
//! Holds entries in memory and answers which of them are due at a given
//! instant. Used by the operator CLI and by tests; it offers no cross-process
//! coordination.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tidewatch_core::cron::{is_cron_due, parse_cron};
use tidewatch_core::ports::SchedulerBackend;
use tidewatch_core::{PortError, ScheduleEntry};

/// An entry plus the last time it fired.
#[derive(Debug, Clone)]
struct Tracked {
    entry: ScheduleEntry,
    last_triggered: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemorySchedulerBackend {
    entries: RwLock<BTreeMap<String, Tracked>>,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemorySchedulerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` should fire at `now`: enabled, its cron parses, and a
    /// scheduled tick falls in `(last_triggered, now]`.
    pub async fn should_run(&self, key: &str, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().await;
        entries.get(key).is_some_and(|t| is_due(t, now))
    }

    /// Entries due at `now`, ordered by key.
    pub async fn due_entries(&self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|t| is_due(t, now))
            .map(|t| t.entry.clone())
            .collect()
    }

    /// Mark `key` as fired at `at`. Returns `false` for unknown keys.
    pub async fn record_trigger_at(&self, key: &str, at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(t) => {
                t.last_triggered = Some(at);
                true
            }
            None => false,
        }
    }

    pub async fn last_triggered(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(key).and_then(|t| t.last_triggered)
    }

    /// Upserts received so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::Relaxed)
    }

    /// Deletes received so far, including deletes of missing keys.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn is_due(tracked: &Tracked, now: DateTime<Utc>) -> bool {
    if !tracked.entry.enabled {
        return false;
    }
    match parse_cron(&tracked.entry.cron_expression) {
        Ok(schedule) => is_cron_due(&schedule, now, tracked.last_triggered),
        Err(e) => {
            warn!(
                key = %tracked.entry.name,
                cron = %tracked.entry.cron_expression,
                error = %e,
                "invalid cron expression"
            );
            false
        }
    }
}

#[async_trait]
impl SchedulerBackend for InMemorySchedulerBackend {
    /// Replaces the entry but keeps its trigger history.
    async fn upsert(&self, entry: &ScheduleEntry) -> Result<(), PortError> {
        self.upserts.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().await;
        match entries.get_mut(&entry.name) {
            Some(t) => t.entry = entry.clone(),
            None => {
                entries.insert(
                    entry.name.clone(),
                    Tracked {
                        entry: entry.clone(),
                        last_triggered: None,
                    },
                );
            }
        }
        debug!(key = %entry.name, "upserted schedule entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PortError> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>, PortError> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .map(|t| t.entry.clone())
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<ScheduleEntry>, PortError> {
        Ok(self.entries.read().await.get(key).map(|t| t.entry.clone()))
    }
}
