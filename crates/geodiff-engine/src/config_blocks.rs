//! Data block configuration entities
//!
//! View type, shown columns and filters of a data block live on a separate
//! configuration entity. Once we know which data block such an entity
//! configures, its changes are folded into that block's diff.

use std::collections::{HashMap, HashSet};

use geodiff_core::{
    BlockKind, ConfigParent, EntityDiff, EntityId, RelationChange, detect_block_kind, system_ids,
};
use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::fanout::gather;
use crate::source::EntitySource;

/// Result of the configuration stage.
#[derive(Debug, Clone, Default)]
pub struct ConfigOutcome {
    pub entities: Vec<EntityDiff>,
    /// Data block id -> page id, for configs whose page is known locally
    pub parent_hints: IndexMap<EntityId, EntityId>,
}

/// Whether `entity` carries data block configuration without being a block itself.
pub fn is_config_entity(entity: &EntityDiff) -> bool {
    if detect_block_kind(&entity.relations).is_some() {
        return false;
    }
    entity.relations.iter().any(|r| system_ids::is_config_relation_type(&r.type_id))
        || entity.values.iter().any(|v| system_ids::is_config_value_property(&v.property_id))
}

/// Fold `config`'s changes into the diff of `data_block_id`, creating a data
/// block diff when the block itself has no changes.
///
/// The block always leaves typed: a block diff that arrived without its TYPES
/// relation (only its name changed, say) gets one marking it a data block.
pub fn merge_config_into(entities: &mut Vec<EntityDiff>, config: &EntityDiff, data_block_id: &str, space_id: &str) {
    let index = match entities.iter().position(|e| e.entity_id == data_block_id) {
        Some(index) => index,
        None => {
            entities.push(EntityDiff::stub(data_block_id));
            entities.len() - 1
        }
    };

    let block = &mut entities[index];
    block.values.extend(config.values.iter().cloned());
    block.relations.extend(
        config
            .relations
            .iter()
            .filter(|r| !r.is_type_relation() && !r.is_containment())
            .cloned(),
    );
    if detect_block_kind(&block.relations).is_none() {
        block.relations.push(RelationChange::synthetic_add(
            format!("config-type-{}", data_block_id),
            system_ids::TYPES_PROPERTY,
            space_id,
            system_ids::DATA_BLOCK,
        ));
    }
}

/// Resolve every configuration entity to its data block and merge it there.
///
/// The caller-supplied map wins; otherwise the first backlink names the data
/// block. Unresolved configuration entities stay in the list as they are.
pub async fn resolve_config_entities(
    entities: Vec<EntityDiff>,
    space_id: &str,
    config_to_parent: &HashMap<EntityId, ConfigParent>,
    source: &dyn EntitySource,
    config: &EngineConfig,
) -> ConfigOutcome {
    let config_ids: Vec<EntityId> = entities
        .iter()
        .filter(|e| is_config_entity(e))
        .map(|e| e.entity_id.clone())
        .collect();
    if config_ids.is_empty() {
        return ConfigOutcome { entities, parent_hints: IndexMap::new() };
    }

    let mut targets: IndexMap<EntityId, EntityId> = IndexMap::new();
    let mut parent_hints = IndexMap::new();
    let mut pending = Vec::new();
    for id in config_ids {
        match config_to_parent.get(&id) {
            Some(known) => {
                targets.insert(id, known.data_block_entity_id.clone());
                parent_hints
                    .entry(known.data_block_entity_id.clone())
                    .or_insert_with(|| known.parent_id.clone());
            }
            None => pending.push(id),
        }
    }

    let looked_up = gather(pending, config.max_concurrent_lookups, "config backlink", |id: EntityId| async move {
        source.get_entity_backlinks(&id, space_id).await
    })
    .await;
    for (id, backlinks) in looked_up {
        match backlinks.and_then(|b| b.into_iter().next()) {
            Some(block) => {
                targets.insert(id, block.id);
            }
            None => tracing::debug!("Config entity {} has no known data block", id),
        }
    }

    let resolved: HashSet<&EntityId> = targets.keys().collect();
    let (configs, mut rest): (Vec<EntityDiff>, Vec<EntityDiff>) =
        entities.into_iter().partition(|e| resolved.contains(&e.entity_id));

    for config_entity in &configs {
        if let Some(data_block_id) = targets.get(&config_entity.entity_id) {
            merge_config_into(&mut rest, config_entity, data_block_id, space_id);
        }
    }

    tracing::debug!("Merged {} config entities into data blocks", configs.len());
    ConfigOutcome { entities: rest, parent_hints }
}
