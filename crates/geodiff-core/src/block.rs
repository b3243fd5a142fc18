//! Block type detection and block change conversion

use crate::model::{BlockChange, BlockKind, EntityDiff, RelationChange, ValueChange};
use crate::system_ids;
use crate::text_diff::compute_text_diff;

/// Map a type entity id to the block kind it marks, if any.
pub fn block_kind_for_type(type_id: &str) -> Option<BlockKind> {
    match type_id {
        system_ids::TEXT_BLOCK => Some(BlockKind::TextBlock),
        system_ids::IMAGE_BLOCK | system_ids::IMAGE_TYPE => Some(BlockKind::ImageBlock),
        system_ids::VIDEO_BLOCK | system_ids::VIDEO_TYPE => Some(BlockKind::VideoBlock),
        system_ids::DATA_BLOCK => Some(BlockKind::DataBlock),
        _ => None,
    }
}

/// Block kind declared by the first TYPES relation that names a known block type.
///
/// Returns `None` for entities that aren't typed as blocks. Whether that
/// means "not page content" or "assume text" is the caller's decision.
pub fn detect_block_kind(relations: &[RelationChange]) -> Option<BlockKind> {
    relations
        .iter()
        .filter(|r| r.is_type_relation())
        .filter_map(RelationChange::target_id)
        .find_map(block_kind_for_type)
}

/// Block kind from a plain list of type ids (remote snapshots).
pub fn detect_block_kind_from_types<'a>(type_ids: impl IntoIterator<Item = &'a str>) -> Option<BlockKind> {
    type_ids.into_iter().find_map(block_kind_for_type)
}

fn find_value<'a>(entity: &'a EntityDiff, property_id: &str) -> Option<&'a ValueChange> {
    entity.values.iter().find(|v| v.property_id == property_id)
}

/// Before/after of the value that carries a media block's URL.
fn media_content(entity: &EntityDiff, url_prefix: &str) -> (Option<String>, Option<String>) {
    let value = find_value(entity, system_ids::IMAGE_URL_PROPERTY)
        .or_else(|| {
            entity.values.iter().find(|v| {
                v.before.as_deref().is_some_and(|s| s.starts_with(url_prefix))
                    || v.after.as_deref().is_some_and(|s| s.starts_with(url_prefix))
            })
        })
        .or_else(|| entity.values.first());
    match value {
        Some(v) => (v.before.clone(), v.after.clone()),
        None => (None, None),
    }
}

/// Convert a contained block entity's diff into a [`BlockChange`] of `kind`.
pub fn entity_diff_to_block_change(entity: &EntityDiff, kind: BlockKind, url_prefix: &str) -> BlockChange {
    let id = entity.entity_id.clone();
    match kind {
        BlockKind::TextBlock => {
            let content = find_value(entity, system_ids::MARKDOWN_CONTENT)
                .or_else(|| entity.values.iter().find(|v| v.kind.is_text()));
            let before = content.and_then(|v| v.before.clone());
            let after = content.and_then(|v| v.after.clone());
            let diff = compute_text_diff(before.as_deref().unwrap_or(""), after.as_deref().unwrap_or(""));
            BlockChange::TextBlock { id, before, after, diff }
        }
        BlockKind::ImageBlock => {
            let (before, after) = media_content(entity, url_prefix);
            BlockChange::ImageBlock { id, before, after }
        }
        BlockKind::VideoBlock => {
            let (before, after) = media_content(entity, url_prefix);
            BlockChange::VideoBlock { id, before, after }
        }
        BlockKind::DataBlock => {
            let name = find_value(entity, system_ids::NAME_PROPERTY);
            let values = entity
                .values
                .iter()
                .filter(|v| v.property_id != system_ids::NAME_PROPERTY)
                .cloned()
                .collect();
            let relations = entity
                .relations
                .iter()
                .filter(|r| !r.is_type_relation() && !r.is_containment())
                .cloned()
                .collect();
            BlockChange::DataBlock {
                id,
                before: name.and_then(|v| v.before.clone()),
                after: name.and_then(|v| v.after.clone()),
                block_name: entity.name.clone(),
                values,
                relations,
            }
        }
    }
}
