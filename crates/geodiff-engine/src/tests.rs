//! End-to-end tests for the geodiff-engine pipeline

use std::collections::HashMap;
use std::sync::Arc;

use crate::*;
use geodiff_core::{
    BlockChange, BlockKind, ChangeType, ConfigParent, DataType, DiffChunk, Entity, EntityDiff, EntityRef,
    EntityRelation, EntityValue, LocalRelation, LocalValue, Property, RelationChange, RenderableType,
    ValueChange, ValueKind, system_ids,
};

/// Source whose every lookup fails.
struct FailingSource;

#[async_trait::async_trait]
impl EntitySource for FailingSource {
    async fn get_batch_entities(&self, ids: &[String], _space_id: Option<&str>) -> Result<Vec<Entity>, SourceError> {
        Err(SourceError::Transport(format!("unreachable ({} ids)", ids.len())))
    }

    async fn get_entity_backlinks(&self, entity_id: &str, _space_id: &str) -> Result<Vec<EntityRef>, SourceError> {
        Err(SourceError::Lookup { id: entity_id.to_string(), message: "timeout".to_string() })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn property(id: &str, data_type: DataType) -> Property {
    Property { id: id.to_string(), name: None, data_type }
}

fn local_value(entity: &str, property_id: &str, value: &str) -> LocalValue {
    LocalValue {
        entity: EntityRef::new(entity),
        property: property(property_id, DataType::Text),
        space_id: "S".to_string(),
        value: value.to_string(),
        is_deleted: false,
    }
}

fn local_relation(id: &str, from: &str, type_id: &str, to: &str) -> LocalRelation {
    LocalRelation {
        id: id.to_string(),
        entity_id: None,
        from_entity: EntityRef::new(from),
        relation_type: EntityRef::new(type_id),
        to_entity: EntityRef::new(to),
        space_id: "S".to_string(),
        to_space_id: None,
        position: None,
        renderable_type: None,
        is_deleted: false,
    }
}

fn image_entity(id: &str, url: &str) -> Entity {
    Entity {
        id: id.to_string(),
        name: None,
        types: vec![EntityRef::new(system_ids::IMAGE_TYPE)],
        values: vec![EntityValue {
            property: property(system_ids::IMAGE_URL_PROPERTY, DataType::Text),
            value: url.to_string(),
            space_id: Some("S".to_string()),
        }],
        relations: Vec::new(),
    }
}

fn named(id: &str, name: &str) -> Entity {
    Entity { id: id.to_string(), name: Some(name.to_string()), types: Vec::new(), values: Vec::new(), relations: Vec::new() }
}

fn text_block_diff(id: &str, content: &str) -> EntityDiff {
    EntityDiff {
        values: vec![ValueChange {
            property_id: system_ids::MARKDOWN_CONTENT.to_string(),
            property_name: Some("Markdown content".to_string()),
            space_id: "S".to_string(),
            kind: ValueKind::Text { diff: Vec::new() },
            before: None,
            after: Some(content.to_string()),
        }],
        relations: vec![RelationChange::synthetic_add(
            format!("type-{}", id),
            system_ids::TYPES_PROPERTY,
            "S",
            system_ids::TEXT_BLOCK,
        )],
        ..EntityDiff::stub(id)
    }
}

fn engine(store: MemoryStore) -> DiffEngine {
    DiffEngine::new(Arc::new(store))
}

fn block_ids(entity: &EntityDiff) -> Vec<&str> {
    entity.blocks.iter().map(BlockChange::id).collect()
}

#[tokio::test]
async fn test_new_text_value() {
    let values = vec![local_value("E1", "description", "Hello world")];
    let diffs = engine(MemoryStore::new()).from_local("S", &values, &[], None, None).await;

    assert_eq!(diffs.len(), 1);
    let value = &diffs[0].values[0];
    assert_eq!(diffs[0].entity_id, "E1");
    assert_eq!(value.before, None);
    assert_eq!(value.after.as_deref(), Some("Hello world"));
    assert_eq!(value.kind, ValueKind::Text { diff: vec![DiffChunk::added("Hello world")] });
}

#[tokio::test]
async fn test_new_block_nests_under_parent() {
    let values = vec![local_value("B1", system_ids::MARKDOWN_CONTENT, "Intro")];
    let relations = vec![
        local_relation("R1", "P1", system_ids::BLOCKS, "B1"),
        local_relation("R2", "B1", system_ids::TYPES_PROPERTY, system_ids::TEXT_BLOCK),
    ];
    let diffs = engine(MemoryStore::new()).from_local("S", &values, &relations, None, None).await;

    assert_eq!(diffs.len(), 1);
    let parent = &diffs[0];
    assert_eq!(parent.entity_id, "P1");
    assert!(parent.relations.is_empty());
    assert_eq!(
        parent.blocks,
        vec![BlockChange::TextBlock {
            id: "B1".to_string(),
            before: None,
            after: Some("Intro".to_string()),
            diff: vec![DiffChunk::added("Intro")],
        }]
    );
}

#[tokio::test]
async fn test_avatar_update_resolves_remote_urls() {
    let store = MemoryStore::new();
    store.insert(Entity {
        relations: vec![EntityRelation {
            id: "R1".to_string(),
            relation_type: EntityRef::new(system_ids::AVATAR_PROPERTY),
            entity_id: None,
            to_entity: EntityRef::new("IMG_OLD"),
            to_space_id: None,
            position: None,
            renderable_type: None,
        }],
        ..named("P1", "Person")
    });
    store.insert(image_entity("IMG_OLD", "ipfs://old"));
    store.insert(image_entity("IMG_NEW", "ipfs://new"));

    let relations = vec![local_relation("R1", "P1", system_ids::AVATAR_PROPERTY, "IMG_NEW")];
    let diffs = engine(store).from_local("S", &[], &relations, None, None).await;

    assert_eq!(diffs.len(), 1);
    assert!(diffs.iter().all(|d| d.entity_id != "IMG_NEW" && d.entity_id != "IMG_OLD"));
    let relation = &diffs[0].relations[0];
    assert_eq!(relation.change_type, ChangeType::Update);
    assert_eq!(relation.after.as_ref().unwrap().image_url.as_deref(), Some("ipfs://new"));
    assert_eq!(relation.before.as_ref().unwrap().image_url.as_deref(), Some("ipfs://old"));
    assert_eq!(diffs[0].name.as_deref(), Some("Person"));
}

#[tokio::test]
async fn test_orphan_sibling_shares_backlink_parent() {
    let store = MemoryStore::new();
    store.insert(named("P2", "Page two"));
    store.add_backlink("B3", "P2");

    let entities = vec![text_block_diff("B2", "second"), text_block_diff("B3", "third")];
    let diffs = engine(store).post_process_diffs(entities, "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "P2");
    assert_eq!(diffs[0].name.as_deref(), Some("Page two"));
    let mut ids = block_ids(&diffs[0]);
    ids.sort();
    assert_eq!(ids, vec!["B2", "B3"]);
}

#[tokio::test]
async fn test_failing_source_degrades_to_fallback_parent() {
    let entities = vec![
        text_block_diff("B1", "content"),
        EntityDiff {
            name: Some("Page".to_string()),
            ..EntityDiff::stub("P1")
        },
    ];
    let diffs = DiffEngine::new(Arc::new(FailingSource)).post_process_diffs(entities, "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "P1");
    assert_eq!(block_ids(&diffs[0]), vec!["B1"]);
}

#[tokio::test]
async fn test_unplaceable_orphan_is_dropped() {
    let diffs = DiffEngine::new(Arc::new(FailingSource))
        .post_process_diffs(vec![text_block_diff("B1", "lonely")], "S", None)
        .await;
    assert!(diffs.is_empty());
}

#[tokio::test]
async fn test_implied_block_is_synthesized() {
    let store = MemoryStore::new();
    store.insert(Entity {
        types: vec![EntityRef::new(system_ids::TEXT_BLOCK)],
        values: vec![EntityValue {
            property: property(system_ids::MARKDOWN_CONTENT, DataType::Text),
            value: "Body".to_string(),
            space_id: None,
        }],
        ..named("B9", "Block")
    });
    let parent = EntityDiff {
        name: Some("Page".to_string()),
        relations: vec![RelationChange::synthetic_add("b", system_ids::BLOCKS, "S", "B9")],
        ..EntityDiff::stub("P1")
    };

    let diffs = engine(store).post_process_diffs(vec![parent], "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].relations.is_empty());
    assert_eq!(diffs[0].blocks.len(), 1);
    assert_eq!(diffs[0].blocks[0].kind(), BlockKind::TextBlock);
    assert_eq!(diffs[0].blocks[0].after(), Some("Body"));
}

#[tokio::test]
async fn test_media_entity_is_folded_into_relation() {
    let parent = EntityDiff {
        name: Some("Page".to_string()),
        relations: vec![RelationChange {
            renderable_type: Some(RenderableType::Image),
            ..RelationChange::synthetic_add("photo", "photo-property", "S", "IMG")
        }],
        ..EntityDiff::stub("P1")
    };
    let media = EntityDiff {
        values: vec![ValueChange {
            property_id: "blob".to_string(),
            property_name: None,
            space_id: "S".to_string(),
            kind: ValueKind::Text { diff: Vec::new() },
            before: None,
            after: Some("ipfs://cat".to_string()),
        }],
        ..EntityDiff::stub("IMG")
    };

    let diffs = engine(MemoryStore::new()).post_process_diffs(vec![parent, media], "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].relations[0].after.as_ref().unwrap().image_url.as_deref(), Some("ipfs://cat"));
}

#[tokio::test]
async fn test_containment_in_full_relation_set_beats_media() {
    let values = vec![local_value("IMG", system_ids::IMAGE_URL_PROPERTY, "ipfs://x")];
    let mut photo = local_relation("R1", "P1", "photo-property", "IMG");
    photo.renderable_type = Some(RenderableType::Image);
    let relations = vec![photo, local_relation("R2", "IMG", system_ids::TYPES_PROPERTY, system_ids::IMAGE_BLOCK)];
    let mut removed_block = local_relation("R3", "P1", system_ids::BLOCKS, "IMG");
    removed_block.is_deleted = true;

    let diffs = engine(MemoryStore::new())
        .from_local("S", &values, &relations, Some(&[removed_block]), None)
        .await;

    assert_eq!(diffs.len(), 1);
    let parent = &diffs[0];
    assert_eq!(parent.entity_id, "P1");
    assert_eq!(parent.relations[0].after.as_ref().unwrap().image_url, None);
    assert_eq!(parent.blocks.len(), 1);
    assert_eq!(parent.blocks[0].kind(), BlockKind::ImageBlock);
    assert_eq!(parent.blocks[0].after(), Some("ipfs://x"));
}

#[tokio::test]
async fn test_config_entity_merges_into_data_block() {
    let config_entity = EntityDiff {
        relations: vec![RelationChange::synthetic_add("view", system_ids::VIEW_PROPERTY, "S", "TABLE_VIEW")],
        ..EntityDiff::stub("C1")
    };
    let mut config_to_parent = HashMap::new();
    config_to_parent.insert(
        "C1".to_string(),
        ConfigParent { parent_id: "P1".to_string(), data_block_entity_id: "D1".to_string() },
    );

    let diffs = engine(MemoryStore::new())
        .post_process_diffs(vec![config_entity], "S", Some(&config_to_parent))
        .await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "P1");
    match &diffs[0].blocks[..] {
        [BlockChange::DataBlock { id, relations, .. }] => {
            assert_eq!(id, "D1");
            assert_eq!(relations.len(), 1);
            assert_eq!(relations[0].type_id, system_ids::VIEW_PROPERTY);
        }
        other => panic!("Expected one data block, got {:?}", other),
    }
}

#[tokio::test]
async fn test_name_resolution_can_be_disabled() {
    let store = MemoryStore::new();
    store.insert(named("E1", "Remote name"));
    let config = EngineConfig { resolve_names: false, ..EngineConfig::default() };
    let engine = DiffEngine::with_config(Arc::new(store), config);

    let entity = EntityDiff {
        values: vec![ValueChange {
            property_id: "p".to_string(),
            property_name: None,
            space_id: "S".to_string(),
            kind: ValueKind::Boolean,
            before: None,
            after: Some("true".to_string()),
        }],
        ..EntityDiff::stub("E1")
    };
    let diffs = engine.post_process_diffs(vec![entity.clone()], "S", None).await;
    assert_eq!(diffs[0].name, None);

    let store = MemoryStore::new();
    store.insert(named("E1", "Remote name"));
    let diffs = DiffEngine::new(Arc::new(store)).post_process_diffs(vec![entity], "S", None).await;
    assert_eq!(diffs[0].name.as_deref(), Some("Remote name"));
}

#[tokio::test]
async fn test_edited_avatar_image_is_not_page_content() {
    let store = MemoryStore::new();
    store.insert(named("E", "Page"));
    store.insert(image_entity("IMG", "ipfs://old"));

    let values = vec![
        local_value("E", "description", "About this page"),
        local_value("IMG", system_ids::IMAGE_URL_PROPERTY, "ipfs://new"),
    ];
    let all_relations = vec![local_relation("R1", "ALICE", system_ids::AVATAR_PROPERTY, "IMG")];

    let diffs = engine(store).from_local("S", &values, &[], Some(all_relations.as_slice()), None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "E");
    assert!(diffs[0].blocks.is_empty());
}

#[tokio::test]
async fn test_config_merges_into_untyped_data_block_diff() {
    let renamed_block = EntityDiff {
        values: vec![ValueChange {
            property_id: system_ids::NAME_PROPERTY.to_string(),
            property_name: Some("Name".to_string()),
            space_id: "S".to_string(),
            kind: ValueKind::Text { diff: Vec::new() },
            before: Some("Old".to_string()),
            after: Some("Projects".to_string()),
        }],
        ..EntityDiff::stub("D1")
    };
    let config_entity = EntityDiff {
        relations: vec![RelationChange::synthetic_add("view", system_ids::VIEW_PROPERTY, "S", "TABLE_VIEW")],
        ..EntityDiff::stub("C1")
    };
    let mut config_to_parent = HashMap::new();
    config_to_parent.insert(
        "C1".to_string(),
        ConfigParent { parent_id: "P1".to_string(), data_block_entity_id: "D1".to_string() },
    );

    let diffs = engine(MemoryStore::new())
        .post_process_diffs(vec![renamed_block, config_entity], "S", Some(&config_to_parent))
        .await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "P1");
    match &diffs[0].blocks[..] {
        [BlockChange::DataBlock { id, before, after, relations, .. }] => {
            assert_eq!(id, "D1");
            assert_eq!(before.as_deref(), Some("Old"));
            assert_eq!(after.as_deref(), Some("Projects"));
            assert_eq!(relations.len(), 1);
            assert_eq!(relations[0].type_id, system_ids::VIEW_PROPERTY);
        }
        other => panic!("Expected one data block, got {:?}", other),
    }
}

#[tokio::test]
async fn test_config_entity_resolved_through_backlinks() {
    let store = MemoryStore::new();
    store.insert(named("P1", "Page"));
    store.add_backlink("C1", "D1");
    store.add_backlink("D1", "P1");
    let config_entity = EntityDiff {
        relations: vec![RelationChange::synthetic_add("view", system_ids::VIEW_PROPERTY, "S", "TABLE_VIEW")],
        ..EntityDiff::stub("C1")
    };

    let diffs = engine(store).post_process_diffs(vec![config_entity], "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "P1");
    assert_eq!(diffs[0].name.as_deref(), Some("Page"));
    assert_eq!(block_ids(&diffs[0]), vec!["D1"]);
    assert_eq!(diffs[0].blocks[0].kind(), BlockKind::DataBlock);
}

#[tokio::test]
async fn test_synthesized_block_replaces_hollow_server_block() {
    let store = MemoryStore::new();
    store.insert(Entity {
        types: vec![EntityRef::new(system_ids::TEXT_BLOCK)],
        values: vec![EntityValue {
            property: property(system_ids::MARKDOWN_CONTENT, DataType::Text),
            value: "Body".to_string(),
            space_id: None,
        }],
        ..named("B", "Block")
    });
    let parent = EntityDiff {
        name: Some("Page".to_string()),
        relations: vec![RelationChange::synthetic_add("b", system_ids::BLOCKS, "S", "B")],
        blocks: vec![BlockChange::TextBlock { id: "B".to_string(), before: None, after: None, diff: Vec::new() }],
        ..EntityDiff::stub("P1")
    };

    let diffs = engine(store).post_process_diffs(vec![parent], "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert!(diffs[0].relations.is_empty());
    assert_eq!(block_ids(&diffs[0]), vec!["B"]);
    assert_eq!(diffs[0].blocks[0].after(), Some("Body"));
}
