//! Backfill of display names with one batch lookup

use std::collections::HashMap;

use geodiff_core::{BlockChange, EntityDiff, EntityId, RelationChange, ValueChange};
use indexmap::IndexSet;

use crate::config::EngineConfig;
use crate::fanout::fetch_entities;
use crate::source::EntitySource;

fn collect_value(value: &ValueChange, ids: &mut IndexSet<EntityId>) {
    if value.property_name.is_none() {
        ids.insert(value.property_id.clone());
    }
}

fn collect_relation(relation: &RelationChange, ids: &mut IndexSet<EntityId>) {
    if relation.type_name.is_none() {
        ids.insert(relation.type_id.clone());
    }
    for side in relation.before.iter().chain(relation.after.iter()) {
        if side.to_entity_name.is_none() {
            ids.insert(side.to_entity_id.clone());
        }
    }
}

/// Every id whose display name is still unknown, nested data block content included.
pub fn unresolved_ids(entities: &[EntityDiff]) -> IndexSet<EntityId> {
    let mut ids = IndexSet::new();
    for entity in entities {
        if entity.name.is_none() {
            ids.insert(entity.entity_id.clone());
        }
        entity.values.iter().for_each(|v| collect_value(v, &mut ids));
        entity.relations.iter().for_each(|r| collect_relation(r, &mut ids));
        for block in &entity.blocks {
            if let BlockChange::DataBlock { id, block_name, values, relations, .. } = block {
                if block_name.is_none() {
                    ids.insert(id.clone());
                }
                values.iter().for_each(|v| collect_value(v, &mut ids));
                relations.iter().for_each(|r| collect_relation(r, &mut ids));
            }
        }
    }
    ids
}

fn apply_value(value: &mut ValueChange, names: &HashMap<EntityId, String>) {
    if value.property_name.is_none() {
        value.property_name = names.get(&value.property_id).cloned();
    }
}

fn apply_relation(relation: &mut RelationChange, names: &HashMap<EntityId, String>) {
    if relation.type_name.is_none() {
        relation.type_name = names.get(&relation.type_id).cloned();
    }
    for side in relation.before.iter_mut().chain(relation.after.iter_mut()) {
        if side.to_entity_name.is_none() {
            side.to_entity_name = names.get(&side.to_entity_id).cloned();
        }
    }
}

/// Fill unknown names from `names`. Names already present are kept.
pub fn apply_names(entities: &mut [EntityDiff], names: &HashMap<EntityId, String>) {
    for entity in entities.iter_mut() {
        if entity.name.is_none() {
            entity.name = names.get(&entity.entity_id).cloned();
        }
        entity.values.iter_mut().for_each(|v| apply_value(v, names));
        entity.relations.iter_mut().for_each(|r| apply_relation(r, names));
        for block in entity.blocks.iter_mut() {
            if let BlockChange::DataBlock { id, block_name, values, relations, .. } = block {
                if block_name.is_none() {
                    *block_name = names.get(id.as_str()).cloned();
                }
                values.iter_mut().for_each(|v| apply_value(v, names));
                relations.iter_mut().for_each(|r| apply_relation(r, names));
            }
        }
    }
}

/// Resolve missing names across spaces. A failed lookup leaves raw ids in place.
pub async fn resolve_names(
    mut entities: Vec<EntityDiff>,
    source: &dyn EntitySource,
    config: &EngineConfig,
) -> Vec<EntityDiff> {
    let ids = unresolved_ids(&entities);
    if ids.is_empty() {
        return entities;
    }

    let fetched = fetch_entities(source, ids.into_iter().collect(), None, config).await;
    let names: HashMap<EntityId, String> = fetched
        .into_iter()
        .filter_map(|(id, entity)| entity.name.map(|name| (id, name)))
        .collect();
    tracing::debug!("Resolved {} display names", names.len());

    apply_names(&mut entities, &names);
    entities
}
