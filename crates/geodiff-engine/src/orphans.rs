//! Parent resolution for blocks whose containment relation isn't in the change set

use std::collections::HashSet;

use geodiff_core::{EntityDiff, EntityId, RelationChange, detect_block_kind, system_ids};
use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::fanout::gather;
use crate::source::EntitySource;

/// Ids already reachable through a containment relation in the working set.
pub fn containment_targets(entities: &[EntityDiff]) -> HashSet<EntityId> {
    entities
        .iter()
        .flat_map(|e| e.relations.iter())
        .filter(|r| r.is_containment())
        .flat_map(|r| r.target_ids().map(String::from))
        .collect()
}

/// Block-typed entities with no containment relation pointing at them, in input order.
pub fn find_orphans(entities: &[EntityDiff]) -> Vec<EntityId> {
    let contained = containment_targets(entities);
    entities
        .iter()
        .filter(|e| detect_block_kind(&e.relations).is_some() && !contained.contains(&e.entity_id))
        .map(|e| e.entity_id.clone())
        .collect()
}

/// Pick the parent for orphans nothing else could place.
///
/// Walks `entities` in order, skipping orphans, block targets and media
/// entities. The first entity that already has a containment relation wins;
/// failing that, the first eligible entity.
pub fn select_fallback_parent(
    entities: &[EntityDiff],
    orphans: &HashSet<EntityId>,
    block_targets: &HashSet<EntityId>,
    media_ids: &HashSet<EntityId>,
) -> Option<EntityId> {
    let mut first = None;
    for entity in entities {
        let id = &entity.entity_id;
        if orphans.contains(id) || block_targets.contains(id) || media_ids.contains(id) {
            continue;
        }
        if entity.has_containment() {
            return Some(id.clone());
        }
        if first.is_none() {
            first = Some(id.clone());
        }
    }
    first
}

/// Add a containment relation from `parent_id` to `block_id`, creating a
/// stub parent when the parent has no diff of its own.
pub fn inject_containment(entities: &mut Vec<EntityDiff>, block_id: &str, parent_id: &str, space_id: &str) {
    let relation = RelationChange::synthetic_add(
        format!("resolved-blocks-{}", block_id),
        system_ids::BLOCKS,
        space_id,
        block_id,
    );
    match entities.iter_mut().find(|e| e.entity_id == parent_id) {
        Some(parent) => parent.relations.push(relation),
        None => {
            let mut parent = EntityDiff::stub(parent_id);
            parent.relations.push(relation);
            entities.push(parent);
        }
    }
}

/// Inputs the orphan stage takes from earlier stages.
#[derive(Debug, Clone, Default)]
pub struct OrphanHints<'a> {
    /// Data block id -> page id from local configuration
    pub parent_hints: Option<&'a IndexMap<EntityId, EntityId>>,
    /// Block id -> parent id from the full relation set
    pub known_parents: Option<&'a IndexMap<EntityId, EntityId>>,
    /// Containment targets from the full relation set
    pub known_blocks: Option<&'a HashSet<EntityId>>,
    pub media_ids: Option<&'a HashSet<EntityId>>,
}

/// Give every orphan block a parent, or drop it.
///
/// Order of precedence: local hints, known containment, backlinks, the parent
/// of a sibling orphan resolved through backlinks, then
/// [`select_fallback_parent`]. Orphans left without a parent can't be placed
/// in the tree and are removed.
pub async fn resolve_orphans(
    entities: Vec<EntityDiff>,
    space_id: &str,
    hints: OrphanHints<'_>,
    source: &dyn EntitySource,
    config: &EngineConfig,
) -> Vec<EntityDiff> {
    let orphans = find_orphans(&entities);
    if orphans.is_empty() {
        return entities;
    }
    tracing::debug!("Resolving parents for {} orphan block(s)", orphans.len());

    let mut block_to_parent: IndexMap<EntityId, EntityId> = IndexMap::new();
    let mut pending = Vec::new();
    for id in &orphans {
        let known = hints
            .parent_hints
            .and_then(|h| h.get(id))
            .or_else(|| hints.known_parents.and_then(|k| k.get(id)));
        match known {
            Some(parent) if parent != id => {
                block_to_parent.insert(id.clone(), parent.clone());
            }
            _ => pending.push(id.clone()),
        }
    }

    let looked_up = gather(pending, config.max_concurrent_lookups, "backlink", |id: EntityId| async move {
        source.get_entity_backlinks(&id, space_id).await
    })
    .await;

    let mut unresolved = Vec::new();
    let mut sibling_parent: Option<EntityId> = None;
    for (id, backlinks) in looked_up {
        match backlinks.and_then(|b| b.into_iter().find(|p| p.id != id)) {
            Some(parent) => {
                if sibling_parent.is_none() {
                    sibling_parent = Some(parent.id.clone());
                }
                block_to_parent.insert(id, parent.id);
            }
            None => unresolved.push(id),
        }
    }

    if !unresolved.is_empty() {
        let fallback = sibling_parent.or_else(|| {
            let orphan_set: HashSet<EntityId> = orphans.iter().cloned().collect();
            let mut block_targets = containment_targets(&entities);
            if let Some(known) = hints.known_blocks {
                block_targets.extend(known.iter().cloned());
            }
            let empty = HashSet::new();
            select_fallback_parent(&entities, &orphan_set, &block_targets, hints.media_ids.unwrap_or(&empty))
        });
        match fallback {
            Some(parent) => {
                tracing::debug!("Assigning {} unresolved orphan(s) to fallback parent {}", unresolved.len(), parent);
                for id in unresolved {
                    block_to_parent.insert(id, parent.clone());
                }
            }
            None => {
                tracing::warn!("Dropping {} orphan block(s) with no resolvable parent", unresolved.len());
                let dropped: HashSet<EntityId> = unresolved.into_iter().collect();
                let mut entities = entities;
                entities.retain(|e| !dropped.contains(&e.entity_id));
                return inject_all(entities, &block_to_parent, space_id);
            }
        }
    }

    inject_all(entities, &block_to_parent, space_id)
}

fn inject_all(mut entities: Vec<EntityDiff>, block_to_parent: &IndexMap<EntityId, EntityId>, space_id: &str) -> Vec<EntityDiff> {
    for (block_id, parent_id) in block_to_parent {
        inject_containment(&mut entities, block_id, parent_id, space_id);
    }
    entities
}
