use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::pipeline::StoreOverrides;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

const DEFAULT_READ_URL: &str = "http://localhost:8428";
const DEFAULT_PIPELINES_FILE: &str = "pipelines.yaml";
const REMOTE_WRITE_PATH: &str = "/api/v1/write";

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled value: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(
    lookup: &impl Fn(&str) -> Option<String>,
    profile: &str,
    key: &str,
) -> Option<String> {
    if !profile.is_empty() {
        if let Some(v) = lookup(&format!("{}_{}", profile, key)) {
            return Some(v);
        }
    }
    lookup(key)
}

fn profiled_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    profile: &str,
    key: &str,
    default: u64,
) -> u64 {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Derive the remote-write URL that sits next to a read URL.
pub fn derive_write_url(read_url: &str) -> String {
    format!("{}{}", read_url.trim_end_matches('/'), REMOTE_WRITE_PATH)
}

// ── Top-level settings ────────────────────────────────────────

/// Process-wide engine settings, passed explicitly to port factories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Active profile name (empty = default).
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default = "default_pipelines_file")]
    pub pipelines_file: PathBuf,
}

fn default_pipelines_file() -> PathBuf {
    PathBuf::from(DEFAULT_PIPELINES_FILE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_read_url")]
    pub read_url: String,
    /// Defaults to `<read_url>/api/v1/write` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_url: Option<String>,
}

fn default_read_url() -> String {
    DEFAULT_READ_URL.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            read_url: default_read_url(),
            write_url: None,
        }
    }
}

impl StoreSettings {
    pub fn write_url(&self) -> String {
        self.write_url
            .clone()
            .unwrap_or_else(|| derive_write_url(&self.read_url))
    }
}

/// Per-call timeouts in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_fetch_secs")]
    pub fetch_secs: u64,
    #[serde(default = "default_model_secs")]
    pub model_secs: u64,
    #[serde(default = "default_event_secs")]
    pub event_secs: u64,
}

fn default_fetch_secs() -> u64 {
    30
}
fn default_model_secs() -> u64 {
    30
}
fn default_event_secs() -> u64 {
    5
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            fetch_secs: default_fetch_secs(),
            model_secs: default_model_secs(),
            event_secs: default_event_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }

    pub fn model(&self) -> Duration {
        Duration::from_secs(self.model_secs)
    }

    pub fn event(&self) -> Duration {
        Duration::from_secs(self.event_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            profile: String::new(),
            store: StoreSettings::default(),
            timeouts: TimeoutSettings::default(),
            pipelines_file: default_pipelines_file(),
        }
    }
}

impl EngineSettings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TIDEWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("TIDEWATCH_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build settings for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::from_lookup(profile, env_opt)
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(profile: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let defaults = TimeoutSettings::default();
        Self {
            profile: p.to_string(),
            store: StoreSettings {
                read_url: profiled_opt(&lookup, p, "TIDEWATCH_STORE_READ_URL")
                    .unwrap_or_else(default_read_url),
                write_url: profiled_opt(&lookup, p, "TIDEWATCH_STORE_WRITE_URL"),
            },
            timeouts: TimeoutSettings {
                fetch_secs: profiled_u64(&lookup, p, "TIDEWATCH_FETCH_TIMEOUT_SECS", defaults.fetch_secs),
                model_secs: profiled_u64(&lookup, p, "TIDEWATCH_MODEL_TIMEOUT_SECS", defaults.model_secs),
                event_secs: profiled_u64(&lookup, p, "TIDEWATCH_EVENT_TIMEOUT_SECS", defaults.event_secs),
            },
            pipelines_file: profiled_opt(&lookup, p, "TIDEWATCH_PIPELINES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_pipelines_file),
        }
    }

    /// Parse settings from a TOML string, then apply environment overrides.
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = toml::from_str(toml_str)?;
        settings.apply_overrides(env_opt);
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Apply `TIDEWATCH_*` overrides on top of file-loaded values.
    ///
    /// - `TIDEWATCH_STORE_READ_URL` -> `store.read_url`
    /// - `TIDEWATCH_STORE_WRITE_URL` -> `store.write_url`
    /// - `TIDEWATCH_FETCH_TIMEOUT_SECS` -> `timeouts.fetch_secs`
    /// - `TIDEWATCH_MODEL_TIMEOUT_SECS` -> `timeouts.model_secs`
    /// - `TIDEWATCH_EVENT_TIMEOUT_SECS` -> `timeouts.event_secs`
    /// - `TIDEWATCH_PIPELINES_FILE` -> `pipelines_file`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TIDEWATCH_STORE_READ_URL") {
            self.store.read_url = v;
        }
        if let Some(v) = lookup("TIDEWATCH_STORE_WRITE_URL") {
            self.store.write_url = Some(v);
        }
        if let Some(secs) = lookup("TIDEWATCH_FETCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeouts.fetch_secs = secs;
        }
        if let Some(secs) = lookup("TIDEWATCH_MODEL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeouts.model_secs = secs;
        }
        if let Some(secs) = lookup("TIDEWATCH_EVENT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeouts.event_secs = secs;
        }
        if let Some(v) = lookup("TIDEWATCH_PIPELINES_FILE") {
            self.pipelines_file = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.store.read_url.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "store.read_url",
                reason: "must not be empty".into(),
            });
        }
        let t = &self.timeouts;
        for (key, secs) in [
            ("timeouts.fetch_secs", t.fetch_secs),
            ("timeouts.model_secs", t.model_secs),
            ("timeouts.event_secs", t.event_secs),
        ] {
            if secs == 0 {
                return Err(SettingsError::Invalid {
                    key,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Settings loaded (profile: {}):", self.profile_label());
        tracing::info!("  store:     read={}, write={}", self.store.read_url, self.store.write_url());
        tracing::info!(
            "  timeouts:  fetch={}s, model={}s, event={}s",
            self.timeouts.fetch_secs,
            self.timeouts.model_secs,
            self.timeouts.event_secs
        );
        tracing::info!("  pipelines: file={}", self.pipelines_file.display());
    }
}

// ── Per-pipeline endpoints ────────────────────────────────────

/// Store URLs a single pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEndpoints {
    pub read_url: String,
    pub write_url: String,
}

impl StoreEndpoints {
    /// Merge pipeline overrides with global settings.
    ///
    /// A read override without a write override writes next to the
    /// overridden read endpoint, not the global one.
    pub fn resolve(settings: &EngineSettings, overrides: &StoreOverrides) -> Self {
        let read_url = overrides
            .read_url
            .clone()
            .unwrap_or_else(|| settings.store.read_url.clone());
        let write_url = match (&overrides.write_url, &overrides.read_url) {
            (Some(write), _) => write.clone(),
            (None, Some(read)) => derive_write_url(read),
            (None, None) => settings.store.write_url(),
        };
        Self { read_url, write_url }
    }
}
