#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use tidewatch_core::pipeline::TrainingConfig;
    use tidewatch_core::ports::SchedulerBackend;
    use tidewatch_core::{Pipeline, ScheduleEntry, TaskKind};

    use crate::{InMemorySchedulerBackend, SchedulerSync};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    fn cpu() -> Pipeline {
        Pipeline::new("cpu", "node_cpu_seconds_total")
    }

    fn sync() -> SchedulerSync<InMemorySchedulerBackend> {
        SchedulerSync::new(InMemorySchedulerBackend::new())
    }

    // ── Reconcile ───────────────────────────────────────────────

    #[tokio::test]
    async fn reconcile_registers_enabled_tasks() {
        let sync = sync();

        let owned = sync.reconcile(&cpu()).await.unwrap();

        let keys: Vec<_> = owned.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(keys, vec!["pipeline_cpu_anomaly", "pipeline_cpu_forecast"]);
        let forecast = sync.backend().get("pipeline_cpu_forecast").await.unwrap().unwrap();
        assert_eq!(forecast.cron_expression, "*/5 * * * *");
        assert_eq!(forecast.args, vec!["cpu".to_string()]);
    }

    #[tokio::test]
    async fn reconcile_twice_issues_no_writes() {
        let sync = sync();
        let mut p = cpu();
        p.training = Some(TrainingConfig::default());

        sync.reconcile(&p).await.unwrap();
        assert_eq!(sync.backend().upsert_count(), 3);

        sync.reconcile(&p).await.unwrap();
        assert_eq!(sync.backend().upsert_count(), 3);
        assert_eq!(sync.backend().delete_count(), 0);
    }

    #[tokio::test]
    async fn changed_schedule_is_rewritten() {
        let sync = sync();
        let mut p = cpu();
        sync.reconcile(&p).await.unwrap();

        p.forecast.schedule = "*/10 * * * *".into();
        sync.reconcile(&p).await.unwrap();

        assert_eq!(sync.backend().upsert_count(), 3);
        let entry = sync.backend().get("pipeline_cpu_forecast").await.unwrap().unwrap();
        assert_eq!(entry.cron_expression, "*/10 * * * *");
    }

    #[tokio::test]
    async fn disabling_pipeline_removes_every_entry() {
        let sync = sync();
        let mut p = cpu();
        sync.reconcile(&p).await.unwrap();

        p.enabled = false;
        let owned = sync.reconcile(&p).await.unwrap();

        assert!(owned.is_empty());
        assert!(sync.backend().is_empty().await);
    }

    #[tokio::test]
    async fn disabling_one_task_removes_only_its_entry() {
        let sync = sync();
        let mut p = cpu();
        sync.reconcile(&p).await.unwrap();

        p.anomaly.enabled = false;
        sync.reconcile(&p).await.unwrap();

        let keys: Vec<_> = sync
            .backend()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(keys, vec!["pipeline_cpu_forecast".to_string()]);
    }

    #[tokio::test]
    async fn invalid_cron_drops_the_entry() {
        let sync = sync();
        let mut p = cpu();
        sync.reconcile(&p).await.unwrap();

        p.forecast.schedule = "every five minutes".into();
        let owned = sync.reconcile(&p).await.unwrap();

        assert!(owned.iter().all(|e| e.task_kind != TaskKind::Forecast));
        assert!(sync.backend().get("pipeline_cpu_forecast").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_tolerates_missing_keys() {
        let sync = sync();
        sync.reconcile(&cpu()).await.unwrap();

        sync.remove("cpu").await.unwrap();
        sync.remove("cpu").await.unwrap();

        assert!(sync.backend().is_empty().await);
        assert_eq!(sync.backend().delete_count(), 6);
    }

    #[tokio::test]
    async fn reconcile_all_collects_entries() {
        let sync = sync();
        let mem = Pipeline::new("mem", "node_memory_active_bytes");

        let owned = sync.reconcile_all(&[cpu(), mem]).await.unwrap();

        assert_eq!(owned.len(), 4);
    }

    // ── Due entries ─────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_entry_is_due_on_latest_tick() {
        let backend = InMemorySchedulerBackend::new();
        backend
            .upsert(&ScheduleEntry::new("cpu", TaskKind::Training, "0 0 * * *"))
            .await
            .unwrap();

        let due = backend.due_entries(at(10, 0)).await;

        assert_eq!(due.len(), 1);
        assert!(backend.should_run("pipeline_cpu_training", at(10, 0)).await);
    }

    #[tokio::test]
    async fn recorded_trigger_suppresses_until_next_tick() {
        let backend = InMemorySchedulerBackend::new();
        backend
            .upsert(&ScheduleEntry::new("cpu", TaskKind::Forecast, "*/5 * * * *"))
            .await
            .unwrap();
        let key = "pipeline_cpu_forecast";

        assert!(backend.record_trigger_at(key, at(10, 0)).await);

        assert!(!backend.should_run(key, at(10, 4)).await);
        assert!(backend.should_run(key, at(10, 5)).await);
    }

    #[tokio::test]
    async fn upsert_keeps_trigger_history() {
        let backend = InMemorySchedulerBackend::new();
        let entry = ScheduleEntry::new("cpu", TaskKind::Forecast, "*/5 * * * *");
        backend.upsert(&entry).await.unwrap();
        backend.record_trigger_at(&entry.name, at(10, 0)).await;

        backend.upsert(&entry).await.unwrap();

        assert_eq!(backend.last_triggered(&entry.name).await, Some(at(10, 0)));
    }

    #[tokio::test]
    async fn disabled_entries_are_never_due() {
        let backend = InMemorySchedulerBackend::new();
        let mut entry = ScheduleEntry::new("cpu", TaskKind::Anomaly, "*/1 * * * *");
        entry.enabled = false;
        backend.upsert(&entry).await.unwrap();

        assert!(backend.due_entries(at(10, 0)).await.is_empty());
    }

    #[tokio::test]
    async fn record_trigger_on_unknown_key() {
        let backend = InMemorySchedulerBackend::new();
        assert!(!backend.record_trigger_at("pipeline_ghost_forecast", at(10, 0)).await);
    }
}
