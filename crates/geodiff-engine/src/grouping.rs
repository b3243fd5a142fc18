//! Nesting of block diffs under the entities that contain them

use std::collections::{HashMap, HashSet};

use geodiff_core::{BlockChange, BlockKind, ChangeType, EntityDiff, EntityId, detect_block_kind, entity_diff_to_block_change};
use indexmap::IndexMap;

/// Block id -> parent id from every containment relation.
///
/// A relation that places the block now (ADD or UPDATE) beats one that took
/// it away, so a block moved between pages nests under its new page. Among
/// relations of the same kind the first wins.
pub fn block_to_parent(entities: &[EntityDiff]) -> IndexMap<EntityId, EntityId> {
    let mut map: IndexMap<EntityId, (EntityId, bool)> = IndexMap::new();
    for entity in entities {
        for relation in entity.relations.iter().filter(|r| r.is_containment()) {
            let Some(block_id) = relation.contained_block() else {
                continue;
            };
            if block_id == entity.entity_id {
                continue;
            }
            let current = relation.change_type != ChangeType::Remove;
            match map.get_mut(block_id) {
                Some(slot) if current && !slot.1 => *slot = (entity.entity_id.clone(), true),
                Some(_) => {}
                None => {
                    map.insert(block_id.to_string(), (entity.entity_id.clone(), current));
                }
            }
        }
    }
    map.into_iter().map(|(block, (parent, _))| (block, parent)).collect()
}

/// Follow `parents` up from `parent_id` to the first id that stays top level.
fn top_level_ancestor<'a>(
    parent_id: &'a EntityId,
    parents: &'a IndexMap<EntityId, EntityId>,
    lifted: &HashSet<EntityId>,
) -> Option<&'a EntityId> {
    let mut current = parent_id;
    let mut seen = HashSet::new();
    while lifted.contains(current) {
        if !seen.insert(current) {
            return None;
        }
        current = parents.get(current)?;
    }
    Some(current)
}

/// Add `incoming` to `blocks`, reconciling with an existing block of the same id.
///
/// A block with content beats a hollow one. Two data blocks pool their
/// configuration values and relations.
pub fn merge_block(blocks: &mut Vec<BlockChange>, incoming: BlockChange) {
    let Some(index) = blocks.iter().position(|b| b.id() == incoming.id()) else {
        blocks.push(incoming);
        return;
    };

    let existing = blocks[index].clone();
    let (mut keep, other) = if existing.is_hollow() && !incoming.is_hollow() {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    if let (
        BlockChange::DataBlock { values, relations, block_name, .. },
        BlockChange::DataBlock { values: other_values, relations: other_relations, block_name: other_name, .. },
    ) = (&mut keep, other)
    {
        for value in other_values {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        for relation in other_relations {
            if !relations.iter().any(|r| r.relation_id == relation.relation_id) {
                relations.push(relation);
            }
        }
        if block_name.is_none() {
            *block_name = other_name;
        }
    }

    blocks[index] = keep;
}

/// Lift contained block entities into their parents' `blocks`.
///
/// Containment relations are removed from every entity's relation list and
/// contained entities leave the top level. Running this on already grouped
/// output changes nothing.
pub fn group_blocks_under_parents(entities: Vec<EntityDiff>, url_prefix: &str) -> Vec<EntityDiff> {
    let parents = block_to_parent(&entities);

    let mut converted: HashMap<EntityId, BlockChange> = HashMap::new();
    for entity in &entities {
        if parents.contains_key(&entity.entity_id) {
            let kind = detect_block_kind(&entity.relations).unwrap_or(BlockKind::TextBlock);
            converted.insert(
                entity.entity_id.clone(),
                entity_diff_to_block_change(entity, kind, url_prefix),
            );
        }
    }

    let mut grouped: Vec<EntityDiff> = entities
        .into_iter()
        .filter(|e| !converted.contains_key(&e.entity_id))
        .map(|mut e| {
            e.relations.retain(|r| !r.is_containment());
            e
        })
        .collect();

    let lifted: HashSet<EntityId> = converted.keys().cloned().collect();
    for (block_id, parent_id) in &parents {
        let Some(block) = converted.remove(block_id) else {
            continue;
        };
        // A parent that is itself a contained block has been lifted; its
        // children go to the page at the top of the chain.
        let target = top_level_ancestor(parent_id, &parents, &lifted);
        match target.and_then(|id| grouped.iter_mut().find(|e| &e.entity_id == id)) {
            Some(parent) => merge_block(&mut parent.blocks, block),
            None => tracing::warn!("Dropping block {}: no top-level parent above {}", block_id, parent_id),
        }
    }

    grouped
}
