//! Feeds of model definitions used to refresh the registry.

use crate::error::SyncError;
use async_trait::async_trait;
use atelier_models::ModelDefinition;

/// A feed of model definitions.
///
/// Each round fetches every source; the registry is refreshed only when all
/// of them succeed.
#[async_trait]
pub trait CatalogSource: Send + Sync + 'static {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Fetches the source's current models.
    async fn fetch(&self) -> Result<Vec<ModelDefinition>, SyncError>;
}

/// A source serving a fixed list, such as the built-in catalog.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    models: Vec<ModelDefinition>,
}

impl StaticSource {
    /// Creates a source serving `models`.
    #[must_use]
    pub fn new(name: impl Into<String>, models: Vec<ModelDefinition>) -> Self {
        Self {
            name: name.into(),
            models,
        }
    }
}

#[async_trait]
impl CatalogSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ModelDefinition>, SyncError> {
        Ok(self.models.clone())
    }
}
