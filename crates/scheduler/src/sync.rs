//! [`SchedulerSync`]: mirrors a pipeline's desired triggers into a backend.
//!
//! There is no in-process locking. Several replicas may reconcile the same
//! pipeline at once; the backend's keyed upsert/delete is the only
//! synchronization point, so the last writer wins with identical content.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use tidewatch_core::cron::parse_cron;
use tidewatch_core::ports::SchedulerBackend;
use tidewatch_core::{Pipeline, PortError, ScheduleEntry, TaskKind};

use crate::error::SyncError;

pub struct SchedulerSync<B> {
    backend: B,
}

/// What reconciliation wants for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Desired {
    Present(ScheduleEntry),
    Absent,
}

impl<B: SchedulerBackend> SchedulerSync<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Make the backend carry exactly the triggers `pipeline` wants.
    ///
    /// Per task kind: upsert when the pipeline and the task are enabled and
    /// the cron parses, delete otherwise. Unchanged entries are not
    /// rewritten and absent keys are not deleted, so a repeat call issues no
    /// writes. Returns the entries the pipeline now owns.
    ///
    /// Every kind is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub async fn reconcile(&self, pipeline: &Pipeline) -> Result<BTreeSet<ScheduleEntry>, SyncError> {
        let mut owned = BTreeSet::new();
        let mut first_error = None;

        for kind in TaskKind::ALL {
            let key = kind.schedule_key(&pipeline.name);
            let result = match desired(pipeline, kind) {
                Desired::Present(entry) => self.ensure_present(&entry).await.map(|()| {
                    owned.insert(entry);
                }),
                Desired::Absent => self.ensure_absent(&key).await,
            };
            if let Err(source) = result {
                warn!(pipeline = %pipeline.name, key = %key, error = %source, "Failed to sync schedule entry");
                first_error.get_or_insert(SyncError::Backend { key, source });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(owned),
        }
    }

    /// Delete every trigger a pipeline could own. Missing keys are fine.
    pub async fn remove(&self, pipeline_name: &str) -> Result<(), SyncError> {
        let mut first_error = None;
        for kind in TaskKind::ALL {
            let key = kind.schedule_key(pipeline_name);
            match self.backend.delete(&key).await {
                Ok(true) => info!(pipeline = %pipeline_name, key = %key, "Removed schedule entry"),
                Ok(false) => debug!(pipeline = %pipeline_name, key = %key, "Schedule entry already absent"),
                Err(source) => {
                    warn!(pipeline = %pipeline_name, key = %key, error = %source, "Failed to remove schedule entry");
                    first_error.get_or_insert(SyncError::Backend { key, source });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Reconcile several pipelines, returning every owned entry.
    pub async fn reconcile_all(
        &self,
        pipelines: &[Pipeline],
    ) -> Result<BTreeSet<ScheduleEntry>, SyncError> {
        let mut all = BTreeSet::new();
        for pipeline in pipelines {
            all.extend(self.reconcile(pipeline).await?);
        }
        Ok(all)
    }

    async fn ensure_present(&self, entry: &ScheduleEntry) -> Result<(), PortError> {
        if self.backend.get(&entry.name).await?.as_ref() == Some(entry) {
            debug!(key = %entry.name, "Schedule entry unchanged");
            return Ok(());
        }
        self.backend.upsert(entry).await?;
        info!(key = %entry.name, cron = %entry.cron_expression, task = %entry.task, "Synced schedule entry");
        Ok(())
    }

    async fn ensure_absent(&self, key: &str) -> Result<(), PortError> {
        if self.backend.get(key).await?.is_none() {
            return Ok(());
        }
        if self.backend.delete(key).await? {
            info!(key = %key, "Removed schedule entry");
        }
        Ok(())
    }
}

fn desired(pipeline: &Pipeline, kind: TaskKind) -> Desired {
    if !pipeline.task_enabled(kind) {
        return Desired::Absent;
    }
    let Some(cron) = pipeline.task_schedule(kind) else {
        return Desired::Absent;
    };
    if let Err(reason) = parse_cron(cron) {
        warn!(
            pipeline = %pipeline.name,
            task = %kind,
            cron = %cron,
            error = %reason,
            "Invalid cron expression, dropping schedule entry"
        );
        return Desired::Absent;
    }
    Desired::Present(ScheduleEntry::new(&pipeline.name, kind, cron))
}
