//! Core data structures for entity diffs and the records they are computed from

use serde::{Deserialize, Serialize};

use crate::system_ids;

/// Entity, property, relation and space ids are opaque strings.
pub type EntityId = String;

fn is_false(b: &bool) -> bool {
    !*b
}

// ── Diff output ─────────────────────────────────────────────

/// One run of a word-level text diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffChunk {
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub added: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub removed: bool,
}

impl DiffChunk {
    pub fn unchanged(value: impl Into<String>) -> Self {
        DiffChunk { value: value.into(), added: false, removed: false }
    }

    pub fn added(value: impl Into<String>) -> Self {
        DiffChunk { value: value.into(), added: true, removed: false }
    }

    pub fn removed(value: impl Into<String>) -> Self {
        DiffChunk { value: value.into(), added: false, removed: true }
    }
}

/// Declared data type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Text,
    Boolean,
    Integer,
    Float,
    Decimal,
    Bytes,
    Date,
    Time,
    Datetime,
    Schedule,
    Point,
    Embedding,
    Rect,
    /// Anything the engine doesn't know; displayed as a raw scalar.
    #[serde(other)]
    Unknown,
}

/// Type tag of a value change. TEXT values carry their word diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueKind {
    Text {
        #[serde(default)]
        diff: Vec<DiffChunk>,
    },
    Boolean,
    Integer,
    Float,
    Decimal,
    Bytes,
    Date,
    Time,
    Datetime,
    Schedule,
    Point,
    Embedding,
    Rect,
    #[serde(other)]
    Unknown,
}

impl ValueKind {
    /// Scalar kind for a non-text data type. Text gets an empty diff; callers
    /// that have before/after use [`crate::classify::value_kind`] instead.
    pub fn from_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Text => ValueKind::Text { diff: Vec::new() },
            DataType::Boolean => ValueKind::Boolean,
            DataType::Integer => ValueKind::Integer,
            DataType::Float => ValueKind::Float,
            DataType::Decimal => ValueKind::Decimal,
            DataType::Bytes => ValueKind::Bytes,
            DataType::Date => ValueKind::Date,
            DataType::Time => ValueKind::Time,
            DataType::Datetime => ValueKind::Datetime,
            DataType::Schedule => ValueKind::Schedule,
            DataType::Point => ValueKind::Point,
            DataType::Embedding => ValueKind::Embedding,
            DataType::Rect => ValueKind::Rect,
            DataType::Unknown => ValueKind::Unknown,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ValueKind::Text { .. })
    }
}

/// A changed property value on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub property_id: EntityId,
    #[serde(default)]
    pub property_name: Option<String>,
    pub space_id: EntityId,
    #[serde(flatten)]
    pub kind: ValueKind,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Add,
    Remove,
    Update,
}

/// How the target of a relation is meant to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderableType {
    Image,
    Video,
    Url,
    #[serde(other)]
    Other,
}

impl RenderableType {
    pub fn is_media(self) -> bool {
        matches!(self, RenderableType::Image | RenderableType::Video)
    }
}

/// One side (before or after) of a relation change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RelationTarget {
    pub to_entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_entity_name: Option<String>,
    #[serde(default)]
    pub to_space_id: Option<EntityId>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

impl RelationTarget {
    pub fn to(entity_id: impl Into<EntityId>) -> Self {
        RelationTarget { to_entity_id: entity_id.into(), ..Default::default() }
    }
}

/// A changed relation edge from an entity to a target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationChange {
    pub relation_id: EntityId,
    pub type_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub space_id: EntityId,
    pub change_type: ChangeType,
    pub before: Option<RelationTarget>,
    pub after: Option<RelationTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderable_type: Option<RenderableType>,
}

impl RelationChange {
    /// Target id on the side that best describes the relation: after, else before.
    pub fn target_id(&self) -> Option<&str> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|t| t.to_entity_id.as_str())
    }

    /// Every entity id this relation points at, on either side.
    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.before
            .iter()
            .chain(self.after.iter())
            .map(|t| t.to_entity_id.as_str())
    }

    pub fn is_containment(&self) -> bool {
        self.type_id == system_ids::BLOCKS
    }

    pub fn is_type_relation(&self) -> bool {
        self.type_id == system_ids::TYPES_PROPERTY
    }

    /// Whether the target is a media entity referenced as a property value.
    pub fn is_media(&self) -> bool {
        self.renderable_type.is_some_and(RenderableType::is_media)
            || system_ids::is_media_relation_type(&self.type_id)
    }

    /// The block this containment relation links to, as seen after the change.
    /// ADD/UPDATE use `after`, REMOVE uses `before`.
    pub fn contained_block(&self) -> Option<&str> {
        if !self.is_containment() {
            return None;
        }
        match self.change_type {
            ChangeType::Add | ChangeType::Update => self.after.as_ref(),
            ChangeType::Remove => self.before.as_ref(),
        }
        .map(|t| t.to_entity_id.as_str())
    }

    /// Synthetic ADD relation, used when the engine infers an edge.
    pub fn synthetic_add(
        relation_id: impl Into<EntityId>,
        type_id: &str,
        space_id: &str,
        to_entity_id: &str,
    ) -> Self {
        RelationChange {
            relation_id: relation_id.into(),
            type_id: type_id.to_string(),
            type_name: None,
            space_id: space_id.to_string(),
            change_type: ChangeType::Add,
            before: None,
            after: Some(RelationTarget::to(to_entity_id)),
            renderable_type: None,
        }
    }
}

/// Kind of page content a block entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    TextBlock,
    ImageBlock,
    VideoBlock,
    DataBlock,
}

/// A changed page block, nested under the entity that contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockChange {
    TextBlock {
        id: EntityId,
        before: Option<String>,
        after: Option<String>,
        #[serde(default)]
        diff: Vec<DiffChunk>,
    },
    ImageBlock {
        id: EntityId,
        before: Option<String>,
        after: Option<String>,
    },
    VideoBlock {
        id: EntityId,
        before: Option<String>,
        after: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DataBlock {
        id: EntityId,
        before: Option<String>,
        after: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<ValueChange>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        relations: Vec<RelationChange>,
    },
}

impl BlockChange {
    pub fn id(&self) -> &str {
        match self {
            BlockChange::TextBlock { id, .. }
            | BlockChange::ImageBlock { id, .. }
            | BlockChange::VideoBlock { id, .. }
            | BlockChange::DataBlock { id, .. } => id,
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockChange::TextBlock { .. } => BlockKind::TextBlock,
            BlockChange::ImageBlock { .. } => BlockKind::ImageBlock,
            BlockChange::VideoBlock { .. } => BlockKind::VideoBlock,
            BlockChange::DataBlock { .. } => BlockKind::DataBlock,
        }
    }

    pub fn before(&self) -> Option<&str> {
        match self {
            BlockChange::TextBlock { before, .. }
            | BlockChange::ImageBlock { before, .. }
            | BlockChange::VideoBlock { before, .. }
            | BlockChange::DataBlock { before, .. } => before.as_deref(),
        }
    }

    pub fn after(&self) -> Option<&str> {
        match self {
            BlockChange::TextBlock { after, .. }
            | BlockChange::ImageBlock { after, .. }
            | BlockChange::VideoBlock { after, .. }
            | BlockChange::DataBlock { after, .. } => after.as_deref(),
        }
    }

    /// A hollow block carries neither a before nor an after.
    pub fn is_hollow(&self) -> bool {
        self.before().is_none() && self.after().is_none()
    }
}

/// Renderable before/after view of one changed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDiff {
    pub entity_id: EntityId,
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<ValueChange>,
    #[serde(default)]
    pub relations: Vec<RelationChange>,
    #[serde(default)]
    pub blocks: Vec<BlockChange>,
}

impl EntityDiff {
    /// Parent stub with nothing changed on it except (later) its blocks.
    pub fn stub(entity_id: impl Into<EntityId>) -> Self {
        EntityDiff {
            entity_id: entity_id.into(),
            name: None,
            values: Vec::new(),
            relations: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn has_containment(&self) -> bool {
        self.relations.iter().any(RelationChange::is_containment)
    }
}

// ── Remote snapshots ────────────────────────────────────────

/// Id plus optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(id: impl Into<EntityId>) -> Self {
        EntityRef { id: id.into(), name: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    pub data_type: DataType,
}

/// A value as stored on a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityValue {
    pub property: Property,
    pub value: String,
    #[serde(default)]
    pub space_id: Option<EntityId>,
}

/// A relation as stored on a remote entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub relation_type: EntityRef,
    /// Entity that represents the relation itself (carries its configuration).
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    pub to_entity: EntityRef,
    #[serde(default)]
    pub to_space_id: Option<EntityId>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub renderable_type: Option<RenderableType>,
}

/// Current remote state of an entity, as returned by a batch lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<EntityRef>,
    #[serde(default)]
    pub values: Vec<EntityValue>,
    #[serde(default)]
    pub relations: Vec<EntityRelation>,
}

impl Entity {
    /// First value whose string form starts with `prefix`.
    pub fn value_with_prefix(&self, prefix: &str) -> Option<&str> {
        self.values
            .iter()
            .map(|v| v.value.as_str())
            .find(|v| v.starts_with(prefix))
    }

    pub fn value_of(&self, property_id: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.property.id == property_id)
            .map(|v| v.value.as_str())
    }
}

// ── Local edit session ──────────────────────────────────────

/// A pending value edit from the local mutation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalValue {
    pub entity: EntityRef,
    pub property: Property,
    pub space_id: EntityId,
    pub value: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A pending relation edit from the local mutation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRelation {
    pub id: EntityId,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    pub from_entity: EntityRef,
    #[serde(rename = "type")]
    pub relation_type: EntityRef,
    pub to_entity: EntityRef,
    pub space_id: EntityId,
    #[serde(default)]
    pub to_space_id: Option<EntityId>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub renderable_type: Option<RenderableType>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl LocalRelation {
    pub fn is_media(&self) -> bool {
        self.renderable_type.is_some_and(RenderableType::is_media)
            || system_ids::is_media_relation_type(&self.relation_type.id)
    }
}

/// Where a data block configuration entity belongs, known locally before
/// the configuration has been published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParent {
    pub parent_id: EntityId,
    pub data_block_entity_id: EntityId,
}
