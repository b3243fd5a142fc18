//! Synthesized diffs for blocks that only appear as containment targets

use std::collections::HashSet;

use geodiff_core::{
    ChangeType, Entity, EntityDiff, EntityId, RelationChange, RelationTarget, ValueChange,
    block_kind_for_type, classify::value_kind, system_ids,
};
use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::fanout::fetch_entities;
use crate::source::EntitySource;

/// Blocks referenced by containment relations but absent from the working
/// set, with the direction the relation moved them in. First relation wins.
pub fn synthesis_targets(entities: &[EntityDiff]) -> IndexMap<EntityId, ChangeType> {
    let present: HashSet<&str> = entities.iter().map(|e| e.entity_id.as_str()).collect();
    let mut targets = IndexMap::new();

    for relation in entities.iter().flat_map(|e| e.relations.iter()).filter(|r| r.is_containment()) {
        let before = relation.before.as_ref().map(|t| t.to_entity_id.as_str());
        let after = relation.after.as_ref().map(|t| t.to_entity_id.as_str());

        if let Some(added) = after.filter(|a| Some(*a) != before) {
            if !present.contains(added) {
                targets.entry(added.to_string()).or_insert(ChangeType::Add);
            }
        }
        if let Some(removed) = before.filter(|b| Some(*b) != after) {
            if !present.contains(removed) {
                targets.entry(removed.to_string()).or_insert(ChangeType::Remove);
            }
        }
    }
    targets
}

/// Build the diff of a block from its remote snapshot and the direction it moved.
///
/// Returns `None` for entities that aren't typed as blocks.
pub fn synthesize_block_diff(entity: &Entity, change_type: ChangeType, space_id: &str) -> Option<EntityDiff> {
    let mut type_ids = entity
        .types
        .iter()
        .map(|t| t.id.as_str())
        .chain(
            entity
                .relations
                .iter()
                .filter(|r| r.relation_type.id == system_ids::TYPES_PROPERTY)
                .map(|r| r.to_entity.id.as_str()),
        );
    let block_type = type_ids.find(|id| block_kind_for_type(id).is_some())?;

    let adding = change_type == ChangeType::Add;
    let values = entity
        .values
        .iter()
        .map(|v| {
            let (before, after) = if adding { (None, Some(v.value.clone())) } else { (Some(v.value.clone()), None) };
            ValueChange {
                property_id: v.property.id.clone(),
                property_name: v.property.name.clone(),
                space_id: v.space_id.clone().unwrap_or_else(|| space_id.to_string()),
                kind: value_kind(v.property.data_type, before.as_deref(), after.as_deref()),
                before,
                after,
            }
        })
        .collect();

    let side = Some(RelationTarget::to(block_type));
    let type_relation = RelationChange {
        relation_id: format!("synthesized-type-{}", entity.id),
        type_id: system_ids::TYPES_PROPERTY.to_string(),
        type_name: None,
        space_id: space_id.to_string(),
        change_type,
        before: if adding { None } else { side.clone() },
        after: if adding { side } else { None },
        renderable_type: None,
    };

    Some(EntityDiff {
        entity_id: entity.id.clone(),
        name: entity.name.clone(),
        values,
        relations: vec![type_relation],
        blocks: Vec::new(),
    })
}

/// Append synthesized diffs for every implied block the source can describe.
pub async fn synthesize_blocks(
    mut entities: Vec<EntityDiff>,
    space_id: &str,
    source: &dyn EntitySource,
    config: &EngineConfig,
) -> Vec<EntityDiff> {
    let targets = synthesis_targets(&entities);
    if targets.is_empty() {
        return entities;
    }

    let fetched = fetch_entities(source, targets.keys().cloned().collect(), Some(space_id), config).await;
    let mut synthesized = 0;
    for (id, change_type) in &targets {
        let Some(entity) = fetched.get(id) else {
            tracing::debug!("Implied block {} not found remotely", id);
            continue;
        };
        match synthesize_block_diff(entity, *change_type, space_id) {
            Some(diff) => {
                entities.push(diff);
                synthesized += 1;
            }
            None => tracing::debug!("Skipping untyped implied block {}", id),
        }
    }
    tracing::debug!("Synthesized {} of {} implied blocks", synthesized, targets.len());
    entities
}
