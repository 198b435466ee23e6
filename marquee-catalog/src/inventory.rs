use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use marquee_core::repository::ResourceRepository;
use marquee_core::{HoldResult, Resource, ResourceCategory};

/// In-memory resource catalog, used by tests and single-node deployments.
pub struct InMemoryResourceCatalog {
    resources: RwLock<HashMap<String, Resource>>,
}

impl InMemoryResourceCatalog {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let map = resources.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            resources: RwLock::new(map),
        }
    }
}

impl Default for InMemoryResourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceCatalog {
    async fn get_resource(&self, id: &str) -> HoldResult<Option<Resource>> {
        Ok(self.resources.read().await.get(id).cloned())
    }

    async fn list_resources(
        &self,
        category: Option<ResourceCategory>,
    ) -> HoldResult<Vec<Resource>> {
        let resources = self.resources.read().await;
        let mut list: Vec<Resource> = resources
            .values()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    async fn upsert_resource(&self, resource: &Resource) -> HoldResult<()> {
        self.resources
            .write()
            .await
            .insert(resource.id.clone(), resource.clone());
        Ok(())
    }
}

/// Reads a JSON array of resources used to seed the catalog at start-up.
pub fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<Resource>, CatalogError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| CatalogError::Seed(format!("{}: {}", path.display(), e)))?;
    let resources: Vec<Resource> = serde_json::from_slice(&bytes)
        .map_err(|e| CatalogError::Seed(format!("{}: {}", path.display(), e)))?;

    for resource in &resources {
        if resource.id.trim().is_empty() {
            return Err(CatalogError::Seed(format!("{}: resource with empty id", path.display())));
        }
    }

    info!("Loaded {} resources from {}", resources.len(), path.display());
    Ok(resources)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog seed failed: {0}")]
    Seed(String),
}
