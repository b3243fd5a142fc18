//! In-memory entity source, loadable from a JSON fixture

use std::collections::HashMap;
use std::path::Path;

use dashmap::DashMap;
use geodiff_core::{Entity, EntityId, EntityRef};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::source::EntitySource;

/// On-disk shape of a store fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFixture {
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Block id -> ids of the entities containing it
    #[serde(default)]
    pub backlinks: HashMap<EntityId, Vec<EntityId>>,
}

/// Entity source backed by concurrent maps.
pub struct MemoryStore {
    entities: DashMap<EntityId, Entity>,
    backlinks: DashMap<EntityId, Vec<EntityId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entities: DashMap::new(),
            backlinks: DashMap::new(),
        }
    }

    pub fn from_fixture(fixture: StoreFixture) -> Self {
        let store = Self::new();
        for entity in fixture.entities {
            store.insert(entity);
        }
        for (block_id, parents) in fixture.backlinks {
            store.backlinks.insert(block_id, parents);
        }
        store
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let fixture: StoreFixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::from_json(&content)?;
        tracing::info!("Loaded {} entities from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn insert(&self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Record that `parent_id` contains `block_id`.
    pub fn add_backlink(&self, block_id: &str, parent_id: &str) {
        self.backlinks
            .entry(block_id.to_string())
            .or_default()
            .push(parent_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EntitySource for MemoryStore {
    async fn get_batch_entities(
        &self,
        ids: &[String],
        _space_id: Option<&str>,
    ) -> Result<Vec<Entity>, SourceError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn get_entity_backlinks(
        &self,
        entity_id: &str,
        _space_id: &str,
    ) -> Result<Vec<EntityRef>, SourceError> {
        let parents = self
            .backlinks
            .get(entity_id)
            .map(|r| r.value().clone())
            .unwrap_or_default();
        Ok(parents
            .into_iter()
            .map(|id| {
                let name = self.entities.get(&id).and_then(|e| e.name.clone());
                EntityRef { id, name }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
