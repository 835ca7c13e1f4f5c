//! [`YamlConfigStore`]: pipelines persisted in a single YAML document.
//!
//! The file holds a top-level `pipelines:` list. Entries that fail to parse
//! or validate are logged and skipped at load time so one broken definition
//! does not take the others down. Every mutation rewrites the whole file
//! through a dot-prefixed temp file and a rename, so readers never observe a
//! partial write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tidewatch_core::ports::ConfigurationStore;
use tidewatch_core::{Pipeline, PortError};

use crate::error::{RegistryError, Result};

#[derive(Deserialize, Default)]
struct PipelinesDocument {
    #[serde(default)]
    pipelines: Vec<serde_yaml::Value>,
}

#[derive(Serialize)]
struct PipelinesOut<'a> {
    pipelines: Vec<&'a Pipeline>,
}

/// An entry dropped while loading a pipelines document.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    /// Position in the `pipelines:` list.
    pub index: usize,
    /// The entry's `name`, when it has one.
    pub name: Option<String>,
    pub reason: String,
}

/// Outcome of parsing a pipelines document.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Valid pipelines in document order. A later duplicate replaces an
    /// earlier one.
    pub pipelines: Vec<Pipeline>,
    pub skipped: Vec<SkippedEntry>,
}

/// Parse a pipelines document, validating each entry on its own.
///
/// Only a document that is not YAML, or whose `pipelines` key is not a
/// list, is an error.
pub fn parse_pipelines(text: &str) -> Result<LoadReport> {
    if text.trim().is_empty() {
        return Ok(LoadReport::default());
    }
    let doc: PipelinesDocument = serde_yaml::from_str(text)?;

    let mut report = LoadReport::default();
    for (index, value) in doc.pipelines.into_iter().enumerate() {
        let name = value
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string);

        let parsed = serde_yaml::from_value::<Pipeline>(value)
            .map_err(|e| e.to_string())
            .and_then(|p| p.validate().map(|()| p).map_err(|e| e.to_string()));

        match parsed {
            Ok(pipeline) => {
                if let Some(pos) = report.pipelines.iter().position(|p| p.name == pipeline.name) {
                    warn!(pipeline = %pipeline.name, index, "duplicate pipeline name, later entry wins");
                    report.pipelines.remove(pos);
                }
                report.pipelines.push(pipeline);
            }
            Err(reason) => {
                warn!(index, name = ?name, error = %reason, "skipping invalid pipeline entry");
                report.skipped.push(SkippedEntry {
                    index,
                    name,
                    reason,
                });
            }
        }
    }
    Ok(report)
}

pub struct YamlConfigStore {
    path: PathBuf,
    pipelines: RwLock<BTreeMap<String, Pipeline>>,
}

impl YamlConfigStore {
    /// Load the file at `path`. A missing file is an empty store; it is
    /// created on the first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pipelines = load_file(&path)?;
        info!(path = %path.display(), count = pipelines.len(), "pipeline registry loaded");
        Ok(Self {
            path,
            pipelines: RwLock::new(pipelines),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and replace the in-memory state. Returns the number
    /// of pipelines loaded.
    pub async fn reload(&self) -> Result<usize> {
        let fresh = pipelines_from(&self.path, tokio::fs::read_to_string(&self.path).await)?;
        let count = fresh.len();
        *self.pipelines.write().await = fresh;
        info!(path = %self.path.display(), count, "pipeline registry reloaded");
        Ok(count)
    }

    /// Write `pipelines` to disk atomically. Callers hold the write guard so
    /// rewrites never interleave.
    async fn persist(&self, pipelines: &BTreeMap<String, Pipeline>) -> Result<()> {
        let yaml = serde_yaml::to_string(&PipelinesOut {
            pipelines: pipelines.values().collect(),
        })?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RegistryError::io(&dir, e))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipelines.yaml".to_string());
        let tmp_path = dir.join(format!(".{file_name}.tmp"));

        tokio::fs::write(&tmp_path, yaml)
            .await
            .map_err(|e| RegistryError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| RegistryError::io(&self.path, e))?;
        debug!(path = %self.path.display(), count = pipelines.len(), "wrote pipeline registry");
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<BTreeMap<String, Pipeline>> {
    pipelines_from(path, fs::read_to_string(path))
}

fn pipelines_from(path: &Path, read: std::io::Result<String>) -> Result<BTreeMap<String, Pipeline>> {
    let text = match read {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "pipeline registry file not found, starting empty");
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(RegistryError::io(path, e)),
    };
    let report = parse_pipelines(&text)?;
    if !report.skipped.is_empty() {
        warn!(path = %path.display(), skipped = report.skipped.len(), "some pipeline entries were skipped");
    }
    Ok(report
        .pipelines
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect())
}

#[async_trait]
impl ConfigurationStore for YamlConfigStore {
    async fn list(&self) -> std::result::Result<Vec<Pipeline>, PortError> {
        Ok(self.pipelines.read().await.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> std::result::Result<Option<Pipeline>, PortError> {
        Ok(self.pipelines.read().await.get(name).cloned())
    }

    /// Validates, rewrites the file, then updates memory. A failed write
    /// leaves both untouched.
    async fn save(&self, pipeline: &Pipeline) -> std::result::Result<(), PortError> {
        pipeline.validate().map_err(|source| RegistryError::Invalid {
            name: pipeline.name.clone(),
            source,
        })?;

        let mut map = self.pipelines.write().await;
        let mut next = map.clone();
        next.insert(pipeline.name.clone(), pipeline.clone());
        self.persist(&next).await?;
        *map = next;
        info!(pipeline = %pipeline.name, path = %self.path.display(), "pipeline saved");
        Ok(())
    }

    async fn delete(&self, name: &str) -> std::result::Result<bool, PortError> {
        let mut map = self.pipelines.write().await;
        if !map.contains_key(name) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.remove(name);
        self.persist(&next).await?;
        *map = next;
        info!(pipeline = %name, path = %self.path.display(), "pipeline deleted");
        Ok(true)
    }
}
