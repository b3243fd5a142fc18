//! Classification of raw value/relation edits into typed changes

use std::collections::HashMap;

use crate::model::{
    ChangeType, DataType, Entity, EntityId, EntityRelation, EntityValue, LocalRelation, LocalValue,
    RelationChange, RelationTarget, RenderableType, ValueChange, ValueKind,
};
use crate::text_diff::compute_text_diff;

/// Value kind for `data_type`, computing the word diff for text.
pub fn value_kind(data_type: DataType, before: Option<&str>, after: Option<&str>) -> ValueKind {
    match data_type {
        DataType::Text => ValueKind::Text {
            diff: compute_text_diff(before.unwrap_or(""), after.unwrap_or("")),
        },
        other => ValueKind::from_data_type(other),
    }
}

/// Classify one local value edit against its remote counterpart.
///
/// Returns `None` when the edit is a no-op (before equals after).
pub fn classify_value(local: &LocalValue, remote: Option<&EntityValue>) -> Option<ValueChange> {
    let before = remote.map(|v| v.value.clone());
    let after = if local.is_deleted { None } else { Some(local.value.clone()) };

    if before == after {
        return None;
    }

    Some(ValueChange {
        property_id: local.property.id.clone(),
        property_name: local.property.name.clone(),
        space_id: local.space_id.clone(),
        kind: value_kind(local.property.data_type, before.as_deref(), after.as_deref()),
        before,
        after,
    })
}

/// Remote value for the same property in the same space.
pub fn find_remote_value<'a>(remote: Option<&'a Entity>, property_id: &str, space_id: &str) -> Option<&'a EntityValue> {
    remote?.values.iter().find(|v| {
        v.property.id == property_id && v.space_id.as_deref().is_none_or(|s| s == space_id)
    })
}

/// Stored media URL of a media entity: the first value using `url_prefix`.
pub fn media_url_of(entity: Option<&Entity>, url_prefix: &str) -> Option<String> {
    entity?.value_with_prefix(url_prefix).map(String::from)
}

/// Put a resolved media URL on the field that matches how the relation renders.
fn attach_media_url(target: &mut RelationTarget, renderable: Option<RenderableType>, url: Option<String>) {
    match renderable {
        Some(RenderableType::Video) => target.video_url = url,
        _ => target.image_url = url,
    }
}

/// Classify one local relation edit against its remote counterpart.
///
/// `snapshots` holds fetched remote entities, used to resolve media URLs for
/// avatar/cover style relations. Returns `None` for no-op updates and for
/// relations created and deleted within the same session.
pub fn classify_relation(
    local: &LocalRelation,
    remote: Option<&EntityRelation>,
    snapshots: &HashMap<EntityId, Entity>,
    url_prefix: &str,
) -> Option<RelationChange> {
    let change_type = match (local.is_deleted, remote) {
        (true, Some(_)) => ChangeType::Remove,
        (true, None) => return None,
        (false, None) => ChangeType::Add,
        (false, Some(r)) => {
            if r.to_entity.id == local.to_entity.id && r.position == local.position {
                return None;
            }
            ChangeType::Update
        }
    };

    let is_media = local.is_media();
    let media_url = |entity_id: &str| {
        if is_media {
            media_url_of(snapshots.get(entity_id), url_prefix)
        } else {
            None
        }
    };

    let before = match change_type {
        ChangeType::Remove | ChangeType::Update => remote.map(|r| {
            let mut target = RelationTarget {
                to_entity_id: r.to_entity.id.clone(),
                to_entity_name: r.to_entity.name.clone(),
                to_space_id: r.to_space_id.clone(),
                position: r.position.clone(),
                ..Default::default()
            };
            attach_media_url(&mut target, local.renderable_type, media_url(&r.to_entity.id));
            target
        }),
        ChangeType::Add => None,
    };

    let after = match change_type {
        ChangeType::Add | ChangeType::Update => {
            let mut target = RelationTarget {
                to_entity_id: local.to_entity.id.clone(),
                to_entity_name: local.to_entity.name.clone(),
                to_space_id: local.to_space_id.clone(),
                position: local.position.clone(),
                ..Default::default()
            };
            attach_media_url(&mut target, local.renderable_type, media_url(&local.to_entity.id));
            Some(target)
        }
        ChangeType::Remove => None,
    };

    Some(RelationChange {
        relation_id: local.id.clone(),
        type_id: local.relation_type.id.clone(),
        type_name: local.relation_type.name.clone(),
        space_id: local.space_id.clone(),
        change_type,
        before,
        after,
        renderable_type: local.renderable_type,
    })
}
