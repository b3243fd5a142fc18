//! Builds one EntityDiff from the edits made to a single entity

use std::collections::HashMap;

use crate::classify::{classify_relation, classify_value, find_remote_value};
use crate::model::{Entity, EntityDiff, EntityId, LocalRelation, LocalValue};
use crate::system_ids;

/// Build the diff of `entity_id` from its local edits.
///
/// `snapshots` holds remote entities by id; a missing snapshot means the
/// entity has no remote state, so every edit reads as an addition. Returns
/// `None` when no edit actually changes anything.
pub fn build_entity_diff(
    entity_id: &str,
    space_id: &str,
    values: &[&LocalValue],
    relations: &[&LocalRelation],
    snapshots: &HashMap<EntityId, Entity>,
    url_prefix: &str,
) -> Option<EntityDiff> {
    if values.is_empty() && relations.is_empty() {
        return None;
    }

    let remote = snapshots.get(entity_id);

    let value_changes: Vec<_> = values
        .iter()
        .filter_map(|v| classify_value(v, find_remote_value(remote, &v.property.id, space_id)))
        .collect();

    let relation_changes: Vec<_> = relations
        .iter()
        .filter_map(|r| {
            let remote_relation = remote.and_then(|e| e.relations.iter().find(|rr| rr.id == r.id));
            classify_relation(r, remote_relation, snapshots, url_prefix)
        })
        .collect();

    if value_changes.is_empty() && relation_changes.is_empty() {
        tracing::debug!("Entity {} has no effective changes", entity_id);
        return None;
    }

    let pending_name = values
        .iter()
        .find(|v| v.property.id == system_ids::NAME_PROPERTY && !v.is_deleted)
        .map(|v| v.value.clone());
    let name = pending_name.or_else(|| remote.and_then(|e| e.name.clone()));

    Some(EntityDiff {
        entity_id: entity_id.to_string(),
        name,
        values: value_changes,
        relations: relation_changes,
        blocks: Vec::new(),
    })
}
