//! Cron normalization, parsing, and due-check helpers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Pipeline definitions use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field or non-standard; pass through as-is.
        trimmed.to_string()
    }
}

/// Parse a 5- or 6-field cron expression into a [`Schedule`].
///
/// Returns the parser's message on failure. Expressions with any other field
/// count are rejected up front rather than handed to the parser.
pub fn parse_cron(expression: &str) -> Result<Schedule, String> {
    let fields = expression.split_whitespace().count();
    if fields != 5 && fields != 6 {
        return Err(format!("expected 5 or 6 fields, found {fields}"));
    }
    Schedule::from_str(&normalize_cron(expression)).map_err(|e| e.to_string())
}

/// Check if a cron schedule is due at `now`.
///
/// Due means a scheduled tick falls in `(last_run, now]`. With no previous run
/// the lookback is one day, so a freshly registered entry fires on its most
/// recent tick.
pub fn is_cron_due(
    schedule: &Schedule,
    now: DateTime<Utc>,
    last_run: Option<DateTime<Utc>>,
) -> bool {
    let check_from = last_run.unwrap_or(now - chrono::Duration::days(1));

    if let Some(next) = schedule.after(&check_from).next() {
        next <= now
    } else {
        false
    }
}
