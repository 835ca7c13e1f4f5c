//! Subcommand bodies. Each prints to stdout and returns an error only when
//! the operator should see a non-zero exit.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use tidewatch_core::ports::ConfigurationStore;
use tidewatch_core::{EngineSettings, ScheduleEntry};
use tidewatch_registry::{parse_pipelines, LoadReport, YamlConfigStore};
use tidewatch_scheduler::{InMemorySchedulerBackend, SchedulerSync};

pub fn validate(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pipelines file: {}", path.display()))?;
    let report = parse_pipelines(&text)
        .with_context(|| format!("failed to parse pipelines file: {}", path.display()))?;

    print!("{}", render_report(&report));

    if !report.skipped.is_empty() {
        bail!(
            "{} of {} pipeline entries are invalid",
            report.skipped.len(),
            report.skipped.len() + report.pipelines.len()
        );
    }
    Ok(())
}

pub async fn plan(path: &Path, json: bool) -> Result<()> {
    let (_, owned) = reconcile_file(path).await?;
    if json {
        let entries: Vec<_> = owned.iter().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", render_entries(owned.iter()));
    }
    Ok(())
}

pub async fn due(path: &Path, at: Option<&str>) -> Result<()> {
    let now = match at {
        Some(raw) => parse_instant(raw)?,
        None => Utc::now(),
    };
    let (backend, _) = reconcile_file(path).await?;
    let due = backend.due_entries(now).await;
    info!(at = %now.to_rfc3339(), due = due.len(), "checked due entries");
    print!("{}", render_entries(due.iter()));
    Ok(())
}

pub fn settings(settings: &EngineSettings) -> Result<()> {
    let rendered = toml::to_string_pretty(settings).context("failed to render settings")?;
    print!("{rendered}");
    Ok(())
}

/// Load a pipelines file and reconcile it into a fresh in-memory backend.
async fn reconcile_file(
    path: &Path,
) -> Result<(InMemorySchedulerBackend, BTreeSet<ScheduleEntry>)> {
    let store = YamlConfigStore::open(path)
        .with_context(|| format!("failed to load pipelines file: {}", path.display()))?;
    let pipelines = store.list().await.context("failed to list pipelines")?;

    let sync = SchedulerSync::new(InMemorySchedulerBackend::new());
    let owned = sync
        .reconcile_all(&pipelines)
        .await
        .context("failed to reconcile schedules")?;
    info!(pipelines = pipelines.len(), entries = owned.len(), "planned schedules");

    Ok((sync.into_backend(), owned))
}

pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid RFC 3339 timestamp: {raw}"))
}

fn render_report(report: &LoadReport) -> String {
    let mut out = String::new();
    for p in &report.pipelines {
        out.push_str(&format!("ok       {} ({})\n", p.name, p.query));
    }
    for s in &report.skipped {
        let name = s.name.as_deref().unwrap_or("<unnamed>");
        out.push_str(&format!("invalid  #{} {}: {}\n", s.index, name, s.reason));
    }
    out
}

fn render_entries<'a>(entries: impl Iterator<Item = &'a ScheduleEntry>) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&format!(
            "{:<40} {:<16} {}\n",
            e.name, e.cron_expression, e.task
        ));
    }
    out
}
