//! Integration tests for geodiff
//!
//! These tests load store fixtures from disk and run the engine end to end.

use std::io::Write;
use std::sync::Arc;

use geodiff_core::{BlockChange, ChangeType, EntityDiff, LocalRelation, LocalValue, ValueKind, system_ids};
use geodiff_engine::{DiffEngine, EngineConfig, MemoryStore};
use serde_json::json;
use tempfile::NamedTempFile;

fn write_json(value: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    file
}

fn text_property(id: &str) -> serde_json::Value {
    json!({ "id": id, "dataType": "TEXT" })
}

/// A page with one existing text block and a person with an avatar.
fn store_fixture() -> serde_json::Value {
    json!({
        "entities": [
            {
                "id": "PAGE",
                "name": "Roadmap",
                "relations": [{
                    "id": "R-PAGE-B1",
                    "type": { "id": system_ids::BLOCKS },
                    "toEntity": { "id": "B1" }
                }]
            },
            {
                "id": "B1",
                "types": [{ "id": system_ids::TEXT_BLOCK }],
                "values": [{
                    "property": text_property(system_ids::MARKDOWN_CONTENT),
                    "value": "Ship the first release"
                }]
            },
            {
                "id": "ALICE",
                "name": "Alice",
                "relations": [{
                    "id": "R-AVATAR",
                    "type": { "id": system_ids::AVATAR_PROPERTY },
                    "toEntity": { "id": "IMG-OLD" }
                }]
            },
            {
                "id": "IMG-OLD",
                "types": [{ "id": system_ids::IMAGE_TYPE }],
                "values": [{ "property": text_property(system_ids::IMAGE_URL_PROPERTY), "value": "ipfs://old" }]
            },
            {
                "id": "IMG-NEW",
                "types": [{ "id": system_ids::IMAGE_TYPE }],
                "values": [{ "property": text_property(system_ids::IMAGE_URL_PROPERTY), "value": "ipfs://new" }]
            },
            { "id": "NOTES", "name": "Meeting notes" }
        ],
        "backlinks": {
            "B1": ["PAGE"],
            "B7": ["NOTES"]
        }
    })
}

fn load_engine() -> DiffEngine {
    let file = write_json(&store_fixture());
    let store = MemoryStore::load(file.path()).unwrap();
    assert_eq!(store.len(), 6);
    DiffEngine::with_config(Arc::new(store), EngineConfig { batch_size: 2, ..EngineConfig::default() })
}

fn block_ids(diff: &EntityDiff) -> Vec<&str> {
    diff.blocks.iter().map(BlockChange::id).collect()
}

/// Test that an edited block nests under the page that holds it
#[tokio::test]
async fn test_local_block_edit_nests_under_page() {
    let engine = load_engine();
    let session = json!({
        "values": [{
            "entity": { "id": "B1" },
            "property": text_property(system_ids::MARKDOWN_CONTENT),
            "spaceId": "S",
            "value": "Ship the second release"
        }],
        "relations": []
    });
    let values: Vec<LocalValue> = serde_json::from_value(session["values"].clone()).unwrap();
    let relations: Vec<LocalRelation> = serde_json::from_value(session["relations"].clone()).unwrap();

    let diffs = engine.from_local("S", &values, &relations, None, None).await;

    assert_eq!(diffs.len(), 1);
    let page = &diffs[0];
    assert_eq!(page.entity_id, "PAGE");
    assert_eq!(page.name.as_deref(), Some("Roadmap"));
    assert_eq!(block_ids(page), vec!["B1"]);
    match &page.blocks[0] {
        BlockChange::TextBlock { before, after, diff, .. } => {
            assert_eq!(before.as_deref(), Some("Ship the first release"));
            assert_eq!(after.as_deref(), Some("Ship the second release"));
            assert!(diff.iter().any(|c| c.removed && c.value.contains("first")));
            assert!(diff.iter().any(|c| c.added && c.value.contains("second")));
        }
        other => panic!("Expected text block, got {:?}", other),
    }
}

/// Test that swapping an avatar renders both images and hides the image entities
#[tokio::test]
async fn test_local_avatar_swap() {
    let engine = load_engine();
    let relations: Vec<LocalRelation> = serde_json::from_value(json!([{
        "id": "R-AVATAR",
        "fromEntity": { "id": "ALICE" },
        "type": { "id": system_ids::AVATAR_PROPERTY },
        "toEntity": { "id": "IMG-NEW" },
        "spaceId": "S"
    }]))
    .unwrap();

    let diffs = engine.from_local("S", &[], &relations, None, None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].name.as_deref(), Some("Alice"));
    let avatar = &diffs[0].relations[0];
    assert_eq!(avatar.change_type, ChangeType::Update);
    assert_eq!(avatar.before.as_ref().and_then(|t| t.image_url.as_deref()), Some("ipfs://old"));
    assert_eq!(avatar.after.as_ref().and_then(|t| t.image_url.as_deref()), Some("ipfs://new"));
}

/// Test that server diffs get text chunks and find their parent through backlinks
#[tokio::test]
async fn test_server_diffs_are_post_processed() {
    let engine = load_engine();
    let payload = json!([{
        "entityId": "B7",
        "name": null,
        "values": [{
            "propertyId": system_ids::MARKDOWN_CONTENT,
            "spaceId": "S",
            "type": "TEXT",
            "before": null,
            "after": "Agenda"
        }],
        "relations": [{
            "relationId": "R-B7-TYPE",
            "typeId": system_ids::TYPES_PROPERTY,
            "spaceId": "S",
            "changeType": "ADD",
            "before": null,
            "after": { "toEntityId": system_ids::TEXT_BLOCK }
        }]
    }]);
    let entities = geodiff_core::parse_api_diffs(&payload.to_string()).unwrap();
    match &entities[0].values[0].kind {
        ValueKind::Text { diff } => assert!(!diff.is_empty()),
        other => panic!("Expected text value, got {:?}", other),
    }

    let diffs = engine.post_process_diffs(entities, "S", None).await;

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].entity_id, "NOTES");
    assert_eq!(diffs[0].name.as_deref(), Some("Meeting notes"));
    assert_eq!(block_ids(&diffs[0]), vec!["B7"]);
    assert_eq!(diffs[0].blocks[0].after(), Some("Agenda"));
}

/// Test that an unreadable store fixture surfaces an error
#[test]
fn test_malformed_store_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(MemoryStore::load(file.path()).is_err());
}
