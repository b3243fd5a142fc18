//! Geodiff Core — entity diff data model, change classification and text diffing

pub mod model;
pub mod system_ids;
pub mod text_diff;
pub mod block;
pub mod classify;
pub mod builder;
pub mod dto;


pub use model::{
    BlockChange, BlockKind, ChangeType, ConfigParent, DataType, DiffChunk, Entity, EntityDiff, EntityId,
    EntityRef, EntityRelation, EntityValue, LocalRelation, LocalValue, Property, RelationChange,
    RelationTarget, RenderableType, ValueChange, ValueKind,
};
pub use block::{block_kind_for_type, detect_block_kind, detect_block_kind_from_types, entity_diff_to_block_change};
pub use builder::build_entity_diff;
pub use classify::{classify_relation, classify_value};
pub use dto::{parse_api_diffs, snapshot_to_diff, EntitySnapshot};
pub use text_diff::compute_text_diff;
