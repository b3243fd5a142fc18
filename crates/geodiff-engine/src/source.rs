//! Collaborator interface for remote entity lookups

use geodiff_core::{Entity, EntityRef};

use crate::error::SourceError;

/// Read access to the remote knowledge graph.
///
/// Implementations are expected to be cheap to share across concurrent
/// lookups. Unknown ids are not errors: `get_batch_entities` simply omits
/// them and `get_entity_backlinks` returns an empty list.
#[async_trait::async_trait]
pub trait EntitySource: Send + Sync {
    /// Resolve a batch of ids to their current remote snapshots.
    async fn get_batch_entities(
        &self,
        ids: &[String],
        space_id: Option<&str>,
    ) -> Result<Vec<Entity>, SourceError>;

    /// Entities that contain `entity_id` as a block, most relevant first.
    async fn get_entity_backlinks(
        &self,
        entity_id: &str,
        space_id: &str,
    ) -> Result<Vec<EntityRef>, SourceError>;

    /// Get source name
    fn name(&self) -> &str;
}
