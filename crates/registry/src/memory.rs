use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tidewatch_core::ports::ConfigurationStore;
use tidewatch_core::{Pipeline, PortError};

use crate::error::RegistryError;

/// Pipelines held in memory only. Listing is ordered by name.
#[derive(Default)]
pub struct InMemoryConfigStore {
    pipelines: RwLock<BTreeMap<String, Pipeline>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without validation.
    pub fn with_pipelines(pipelines: impl IntoIterator<Item = Pipeline>) -> Self {
        Self {
            pipelines: RwLock::new(
                pipelines
                    .into_iter()
                    .map(|p| (p.name.clone(), p))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryConfigStore {
    async fn list(&self) -> Result<Vec<Pipeline>, PortError> {
        Ok(self.pipelines.read().await.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<Pipeline>, PortError> {
        let map = self.pipelines.read().await;
        let found = map.get(name).cloned();
        if found.is_none() {
            debug!(requested = name, "config store lookup miss");
        }
        Ok(found)
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<(), PortError> {
        pipeline.validate().map_err(|source| RegistryError::Invalid {
            name: pipeline.name.clone(),
            source,
        })?;
        self.pipelines
            .write()
            .await
            .insert(pipeline.name.clone(), pipeline.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, PortError> {
        Ok(self.pipelines.write().await.remove(name).is_some())
    }
}
