//! Media-property entities: URL resolution and removal from the diff list
//!
//! An image or video entity referenced through a property-style relation
//! (avatar, cover, an IMAGE-rendered value) is not page content. Its URL is
//! copied onto the relations that point at it and its own diff is dropped.
//! Containment wins: an entity that is the target of any BLOCKS edge, in the
//! working set or in the full relation set, is a block and never media.

use std::collections::{HashMap, HashSet};

use geodiff_core::{Entity, EntityDiff, EntityId, RelationTarget, RenderableType, system_ids};
use indexmap::IndexSet;

use crate::config::EngineConfig;
use crate::fanout::fetch_entities;
use crate::source::EntitySource;

/// Resolved URL of a media entity on each side of the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUrls {
    pub before: Option<String>,
    pub after: Option<String>,
}

impl MediaUrls {
    fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }

    fn for_before(&self) -> Option<&str> {
        self.before.as_deref().or(self.after.as_deref())
    }

    fn for_after(&self) -> Option<&str> {
        self.after.as_deref().or(self.before.as_deref())
    }
}

/// Result of the media stage.
#[derive(Debug, Clone, Default)]
pub struct MediaOutcome {
    pub entities: Vec<EntityDiff>,
    /// Ids treated as media-property entities
    pub media_ids: HashSet<EntityId>,
}

/// Every id targeted by a containment relation, on either side, plus `known_blocks`.
pub fn actual_block_ids(entities: &[EntityDiff], known_blocks: &HashSet<EntityId>) -> HashSet<EntityId> {
    let mut ids = known_blocks.clone();
    for entity in entities {
        for relation in entity.relations.iter().filter(|r| r.is_containment()) {
            ids.extend(relation.target_ids().map(String::from));
        }
    }
    ids
}

/// Targets of media relations that aren't actual blocks, in first-seen order.
///
/// `known_media` are media targets from the full relation set; those in the
/// working set count even when the relation pointing at them is unedited.
pub fn media_entity_ids(
    entities: &[EntityDiff],
    actual_blocks: &HashSet<EntityId>,
    known_media: &HashSet<EntityId>,
) -> IndexSet<EntityId> {
    let mut ids = IndexSet::new();
    for entity in entities {
        for relation in entity.relations.iter().filter(|r| r.is_media() && !r.is_containment()) {
            for target in relation.target_ids() {
                if !actual_blocks.contains(target) {
                    ids.insert(target.to_string());
                }
            }
        }
    }
    for entity in entities {
        if known_media.contains(&entity.entity_id) && !actual_blocks.contains(&entity.entity_id) {
            ids.insert(entity.entity_id.clone());
        }
    }
    ids
}

/// URL carried by the media entity's own changes, side by side.
pub fn local_media_urls(entity: &EntityDiff, url_prefix: &str) -> MediaUrls {
    let url_value = entity.values.iter().find(|v| v.property_id == system_ids::IMAGE_URL_PROPERTY);
    let prefixed = |strings: Vec<Option<&String>>| {
        strings
            .into_iter()
            .flatten()
            .find(|s| s.starts_with(url_prefix))
            .cloned()
    };

    MediaUrls {
        before: url_value
            .and_then(|v| v.before.clone())
            .or_else(|| prefixed(entity.values.iter().map(|v| v.before.as_ref()).collect())),
        after: url_value
            .and_then(|v| v.after.clone())
            .or_else(|| prefixed(entity.values.iter().map(|v| v.after.as_ref()).collect())),
    }
}

/// URL stored on a remote media entity. It hasn't changed, so it serves both sides.
pub fn remote_media_urls(entity: &Entity, url_prefix: &str) -> MediaUrls {
    let url = entity
        .value_of(system_ids::IMAGE_URL_PROPERTY)
        .or_else(|| entity.value_with_prefix(url_prefix))
        .map(String::from);
    MediaUrls { before: url.clone(), after: url }
}

fn fill(target: &mut RelationTarget, renderable: Option<RenderableType>, url: Option<&str>) {
    let Some(url) = url else { return };
    let slot = match renderable {
        Some(RenderableType::Video) => &mut target.video_url,
        _ => &mut target.image_url,
    };
    if slot.is_none() {
        *slot = Some(url.to_string());
    }
}

/// Copy resolved URLs onto every relation side that points at a media entity.
/// Fields that already carry a URL are left alone.
pub fn inject_media_urls(entities: &mut [EntityDiff], urls: &HashMap<EntityId, MediaUrls>) {
    for entity in entities.iter_mut() {
        for relation in entity.relations.iter_mut() {
            let renderable = relation.renderable_type;
            if let Some(before) = relation.before.as_mut() {
                if let Some(found) = urls.get(&before.to_entity_id) {
                    fill(before, renderable, found.for_before());
                }
            }
            if let Some(after) = relation.after.as_mut() {
                if let Some(found) = urls.get(&after.to_entity_id) {
                    fill(after, renderable, found.for_after());
                }
            }
        }
    }
}

/// Resolve media URLs, attach them to referencing relations and drop media diffs.
///
/// `snapshots` are remote entities already fetched by the caller; media
/// entities with no local URL and no snapshot are fetched here.
pub async fn resolve_media(
    entities: Vec<EntityDiff>,
    space_id: &str,
    known_blocks: &HashSet<EntityId>,
    known_media: &HashSet<EntityId>,
    snapshots: &HashMap<EntityId, Entity>,
    source: &dyn EntitySource,
    config: &EngineConfig,
) -> MediaOutcome {
    let actual_blocks = actual_block_ids(&entities, known_blocks);
    let media_ids = media_entity_ids(&entities, &actual_blocks, known_media);
    if media_ids.is_empty() {
        return MediaOutcome { entities, media_ids: HashSet::new() };
    }

    let mut urls: HashMap<EntityId, MediaUrls> = HashMap::new();
    let mut missing = Vec::new();
    for id in &media_ids {
        let local = entities
            .iter()
            .find(|e| &e.entity_id == id)
            .map(|e| local_media_urls(e, &config.media_url_prefix))
            .unwrap_or_default();
        if !local.is_empty() {
            urls.insert(id.clone(), local);
        } else if let Some(snapshot) = snapshots.get(id) {
            urls.insert(id.clone(), remote_media_urls(snapshot, &config.media_url_prefix));
        } else {
            missing.push(id.clone());
        }
    }

    if !missing.is_empty() {
        let fetched = fetch_entities(source, missing, Some(space_id), config).await;
        for (id, entity) in &fetched {
            urls.insert(id.clone(), remote_media_urls(entity, &config.media_url_prefix));
        }
    }

    tracing::debug!("Resolved {} of {} media entities", urls.values().filter(|u| !u.is_empty()).count(), media_ids.len());

    let mut entities: Vec<EntityDiff> = entities
        .into_iter()
        .filter(|e| !media_ids.contains(&e.entity_id))
        .collect();
    inject_media_urls(&mut entities, &urls);

    MediaOutcome { entities, media_ids: media_ids.into_iter().collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodiff_core::{ChangeType, RelationChange, ValueChange, ValueKind};

    fn url_value(property_id: &str, before: Option<&str>, after: Option<&str>) -> ValueChange {
        ValueChange {
            property_id: property_id.to_string(),
            property_name: None,
            space_id: "S".to_string(),
            kind: ValueKind::Text { diff: Vec::new() },
            before: before.map(String::from),
            after: after.map(String::from),
        }
    }

    fn image_relation(to: &str) -> RelationChange {
        RelationChange {
            renderable_type: Some(RenderableType::Image),
            ..RelationChange::synthetic_add(format!("img-{}", to), "photo", "S", to)
        }
    }

    #[test]
    fn test_containment_wins_over_media() {
        let page = EntityDiff {
            relations: vec![
                image_relation("IMG"),
                RelationChange {
                    change_type: ChangeType::Remove,
                    before: Some(RelationTarget::to("IMG")),
                    after: None,
                    ..RelationChange::synthetic_add("b", system_ids::BLOCKS, "S", "unused")
                },
            ],
            ..EntityDiff::stub("P1")
        };
        let entities = vec![page];
        let blocks = actual_block_ids(&entities, &HashSet::new());
        assert!(blocks.contains("IMG"));
        assert!(media_entity_ids(&entities, &blocks, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_known_blocks_exclude_media() {
        let entities = vec![EntityDiff { relations: vec![image_relation("IMG")], ..EntityDiff::stub("P1") }];
        let known: HashSet<EntityId> = ["IMG".to_string()].into_iter().collect();
        let blocks = actual_block_ids(&entities, &known);
        assert!(media_entity_ids(&entities, &blocks, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_known_media_without_edited_relation() {
        let entities = vec![EntityDiff::stub("E"), EntityDiff::stub("IMG")];
        let known: HashSet<EntityId> = ["IMG".to_string()].into_iter().collect();
        let ids = media_entity_ids(&entities, &HashSet::new(), &known);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["IMG"]);

        // Containment still wins
        let ids = media_entity_ids(&entities, &known, &known);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_local_urls_resolve_sides_independently() {
        let media = EntityDiff {
            values: vec![
                url_value("caption", Some("old caption"), None),
                url_value("src", None, Some("ipfs://new")),
            ],
            ..EntityDiff::stub("IMG")
        };
        let urls = local_media_urls(&media, "ipfs://");
        assert_eq!(urls, MediaUrls { before: None, after: Some("ipfs://new".to_string()) });

        let media = EntityDiff {
            values: vec![url_value(system_ids::IMAGE_URL_PROPERTY, Some("ipfs://a"), Some("ipfs://b"))],
            ..EntityDiff::stub("IMG")
        };
        let urls = local_media_urls(&media, "ipfs://");
        assert_eq!(urls.before.as_deref(), Some("ipfs://a"));
        assert_eq!(urls.after.as_deref(), Some("ipfs://b"));
    }

    #[test]
    fn test_injection_keeps_existing_urls() {
        let mut entities = vec![EntityDiff {
            relations: vec![
                image_relation("IMG"),
                RelationChange {
                    after: Some(RelationTarget { image_url: Some("ipfs://kept".to_string()), ..RelationTarget::to("IMG") }),
                    ..image_relation("IMG")
                },
            ],
            ..EntityDiff::stub("P1")
        }];
        let mut urls = HashMap::new();
        urls.insert("IMG".to_string(), MediaUrls { before: None, after: Some("ipfs://x".to_string()) });
        inject_media_urls(&mut entities, &urls);

        let relations = &entities[0].relations;
        assert_eq!(relations[0].after.as_ref().unwrap().image_url.as_deref(), Some("ipfs://x"));
        assert_eq!(relations[1].after.as_ref().unwrap().image_url.as_deref(), Some("ipfs://kept"));
    }

    #[test]
    fn test_video_relation_gets_video_url() {
        let mut entities = vec![EntityDiff {
            relations: vec![RelationChange {
                renderable_type: Some(RenderableType::Video),
                ..image_relation("VID")
            }],
            ..EntityDiff::stub("P1")
        }];
        let mut urls = HashMap::new();
        urls.insert("VID".to_string(), MediaUrls { before: None, after: Some("ipfs://v".to_string()) });
        inject_media_urls(&mut entities, &urls);

        let after = entities[0].relations[0].after.as_ref().unwrap();
        assert_eq!(after.video_url.as_deref(), Some("ipfs://v"));
        assert_eq!(after.image_url, None);
    }
}
