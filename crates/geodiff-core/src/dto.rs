//! Mapping of server-computed diffs and version snapshots into EntityDiff

use serde::{Deserialize, Serialize};

use crate::block::detect_block_kind_from_types;
use crate::model::{
    BlockChange, BlockKind, ChangeType, DataType, DiffChunk, EntityDiff, EntityId, RelationChange,
    RelationTarget, ValueChange, ValueKind,
};
use crate::system_ids;
use crate::text_diff::compute_text_diff;

/// Parse the server's per-entity diff payload.
///
/// The payload already uses the EntityDiff field names. TEXT values and text
/// blocks that arrive without chunks get them computed here, so downstream
/// code can rely on every TEXT change carrying its diff.
pub fn parse_api_diffs(json: &str) -> Result<Vec<EntityDiff>, serde_json::Error> {
    let mut diffs: Vec<EntityDiff> = serde_json::from_str(json)?;
    for diff in &mut diffs {
        normalize_entity_diff(diff);
    }
    Ok(diffs)
}

/// Fill in missing text chunks on values and text blocks.
pub fn normalize_entity_diff(diff: &mut EntityDiff) {
    for value in &mut diff.values {
        if let ValueKind::Text { diff: chunks } = &mut value.kind {
            if chunks.is_empty() && value.before != value.after {
                *chunks = compute_text_diff(
                    value.before.as_deref().unwrap_or(""),
                    value.after.as_deref().unwrap_or(""),
                );
            }
        }
    }
    for block in &mut diff.blocks {
        if let BlockChange::TextBlock { before, after, diff: chunks, .. } = block {
            if chunks.is_empty() && before != after {
                *chunks = compute_text_diff(before.as_deref().unwrap_or(""), after.as_deref().unwrap_or(""));
            }
        }
    }
}

// ── Version snapshots ───────────────────────────────────────

/// A value in a versioned snapshot. Exactly one typed field is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedValue {
    pub property_id: EntityId,
    pub space_id: EntityId,
    pub text: Option<String>,
    pub boolean: Option<bool>,
    pub integer: Option<i64>,
    pub float: Option<f64>,
    pub decimal: Option<String>,
    pub bytes: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub datetime: Option<String>,
    pub point: Option<String>,
    pub rect: Option<String>,
}

impl VersionedValue {
    /// Data type and canonical string form. Types without a string form
    /// (schedule, embedding) come back as TEXT with no value.
    pub fn serialize_value(&self) -> (DataType, Option<String>) {
        if let Some(v) = &self.text {
            return (DataType::Text, Some(v.clone()));
        }
        if let Some(v) = self.boolean {
            return (DataType::Boolean, Some(v.to_string()));
        }
        if let Some(v) = self.integer {
            return (DataType::Integer, Some(v.to_string()));
        }
        if let Some(v) = self.float {
            return (DataType::Float, Some(v.to_string()));
        }
        let typed = [
            (DataType::Decimal, &self.decimal),
            (DataType::Bytes, &self.bytes),
            (DataType::Date, &self.date),
            (DataType::Time, &self.time),
            (DataType::Datetime, &self.datetime),
            (DataType::Point, &self.point),
            (DataType::Rect, &self.rect),
        ];
        typed
            .into_iter()
            .find_map(|(data_type, v)| v.clone().map(|v| (data_type, Some(v))))
            .unwrap_or((DataType::Text, None))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedRelation {
    pub relation_id: EntityId,
    pub type_id: EntityId,
    pub space_id: EntityId,
    pub to_entity_id: EntityId,
    #[serde(default)]
    pub to_space_id: Option<EntityId>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub values: Vec<VersionedValue>,
    #[serde(default)]
    pub relations: Vec<VersionedRelation>,
}

/// Full state of an entity at one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySnapshot {
    pub id: EntityId,
    #[serde(default)]
    pub values: Vec<VersionedValue>,
    #[serde(default)]
    pub relations: Vec<VersionedRelation>,
    #[serde(default)]
    pub blocks: Vec<BlockSnapshot>,
}

fn snapshot_value_to_change(v: &VersionedValue) -> ValueChange {
    let (data_type, value) = v.serialize_value();
    let kind = match data_type {
        DataType::Text => ValueKind::Text {
            diff: value.iter().map(|s| DiffChunk::added(s.as_str())).collect(),
        },
        other => ValueKind::from_data_type(other),
    };
    ValueChange {
        property_id: v.property_id.clone(),
        property_name: None,
        space_id: v.space_id.clone(),
        kind,
        before: None,
        after: value,
    }
}

fn snapshot_relation_to_change(r: &VersionedRelation) -> RelationChange {
    RelationChange {
        relation_id: r.relation_id.clone(),
        type_id: r.type_id.clone(),
        type_name: None,
        space_id: r.space_id.clone(),
        change_type: ChangeType::Add,
        before: None,
        after: Some(RelationTarget {
            to_entity_id: r.to_entity_id.clone(),
            to_space_id: r.to_space_id.clone(),
            position: r.position.clone(),
            ..Default::default()
        }),
        renderable_type: None,
    }
}

fn text_of(values: &[VersionedValue], property_id: &str) -> Option<String> {
    values
        .iter()
        .find(|v| v.property_id == property_id)
        .and_then(|v| v.text.clone())
}

fn snapshot_block_to_change(block: &BlockSnapshot) -> BlockChange {
    let kind = detect_block_kind_from_types(
        block
            .relations
            .iter()
            .filter(|r| r.type_id == system_ids::TYPES_PROPERTY)
            .map(|r| r.to_entity_id.as_str()),
    )
    .unwrap_or(BlockKind::TextBlock);

    let id = block.id.clone();
    match kind {
        BlockKind::TextBlock => {
            let content = text_of(&block.values, system_ids::MARKDOWN_CONTENT).unwrap_or_default();
            let diff = compute_text_diff("", &content);
            BlockChange::TextBlock { id, before: None, after: Some(content), diff }
        }
        BlockKind::ImageBlock => BlockChange::ImageBlock {
            id,
            before: None,
            after: text_of(&block.values, system_ids::IMAGE_URL_PROPERTY),
        },
        BlockKind::VideoBlock => BlockChange::VideoBlock {
            id,
            before: None,
            after: text_of(&block.values, system_ids::IMAGE_URL_PROPERTY),
        },
        BlockKind::DataBlock => BlockChange::DataBlock {
            id,
            before: None,
            after: text_of(&block.values, system_ids::NAME_PROPERTY),
            block_name: None,
            values: Vec::new(),
            relations: Vec::new(),
        },
    }
}

/// Convert the oldest version of an entity, which has nothing to compare
/// against, into an all-added diff.
pub fn snapshot_to_diff(snapshot: &EntitySnapshot) -> EntityDiff {
    EntityDiff {
        entity_id: snapshot.id.clone(),
        name: text_of(&snapshot.values, system_ids::NAME_PROPERTY),
        values: snapshot.values.iter().map(snapshot_value_to_change).collect(),
        relations: snapshot
            .relations
            .iter()
            .filter(|r| r.type_id != system_ids::BLOCKS)
            .map(snapshot_relation_to_change)
            .collect(),
        blocks: snapshot.blocks.iter().map(snapshot_block_to_change).collect(),
    }
}
