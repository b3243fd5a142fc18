//! Well-known entity ids of the knowledge graph
//!
//! These are ordinary entity ids that the graph itself assigns meaning to:
//! the property that holds a name, the relation type that links a page to its
//! blocks, the type entities that mark a block as text/image/video/data, and
//! so on. The diff engine dispatches on them, so they live in one place.
//!
//! Ids come from the core system id set. The avatar property and the video
//! ids belong to the content id set and are grouped separately below.

// ── Core properties ─────────────────────────────────────────

/// Property holding an entity's display name.
pub const NAME_PROPERTY: &str = "LuBWqZAu6pz54eiJS5mLv8";

/// The "is-a" relation type. Its targets are type entities.
pub const TYPES_PROPERTY: &str = "Jfmby78N4BCseZinBmdVov";

/// Containment relation type linking a page entity to its blocks.
pub const BLOCKS: &str = "QYbjCM6NT9xmh2hFGsqpQX";

/// Markdown content of a text block.
pub const MARKDOWN_CONTENT: &str = "V9A2298ZHL135zFRH4qcRg";

// ── Block types ─────────────────────────────────────────────

pub const TEXT_BLOCK: &str = "Fc836HBAyTaLaZgBzcTS2a";
pub const IMAGE_BLOCK: &str = "V6R8hWrKfLZmtyv4dQyyzo";
pub const DATA_BLOCK: &str = "PnQsGwnnztrLNRCm9mcKKY";

/// Type of a standalone image entity (an image "value").
pub const IMAGE_TYPE: &str = "Q1LaZhnzj8AtCzx8T1HRMf";

// ── Media ───────────────────────────────────────────────────

/// Property holding the binary URL of an image or video entity.
pub const IMAGE_URL_PROPERTY: &str = "J6cw1v8xUHCFsEdPeuB1Uo";

pub const COVER_PROPERTY: &str = "7YHk6qYkNDaAtNb8GwmysF";

// ── Content ids ─────────────────────────────────────────────

pub const AVATAR_PROPERTY: &str = "235ba0e8dc7e4bdda1e16d0d4497f133";

// TODO: replace the two video ids with the published content ids once the
// content id set ships them. Until then they are local ids that only match
// fixtures built against this crate.
pub const VIDEO_BLOCK: &str = "a4f1cd6bd2e04b4c8a0f8b2b8c7e9d10";

/// Type of a standalone video entity.
pub const VIDEO_TYPE: &str = "d7a5b2c9e3f14a8b9c6d0e1f2a3b4c5d";

// ── Data block configuration ────────────────────────────────

/// View (table/list/gallery) selected for a data block.
pub const VIEW_PROPERTY: &str = "46GzPiTRPG36jX9dmNE9ic";

/// Columns shown by a data block view.
pub const SHOWN_COLUMNS: &str = "9AecPe8JTN7uJRaX1Mk1XV";

/// Filter expression of a data block.
pub const FILTER: &str = "3YqoLJ7uAPmthXyXmXKoSa";

/// Type ids that mark an entity as page content.
pub const BLOCK_TYPES: [&str; 4] = [TEXT_BLOCK, IMAGE_BLOCK, VIDEO_BLOCK, DATA_BLOCK];

/// Relation types that only make sense as data block view configuration.
pub const CONFIG_RELATION_TYPES: [&str; 2] = [VIEW_PROPERTY, SHOWN_COLUMNS];

/// Value properties that only make sense as data block view configuration.
pub const CONFIG_VALUE_PROPERTIES: [&str; 1] = [FILTER];

/// Block types proper. Image and video content types are excluded: an
/// entity typed only as an image is media unless something contains it.
pub fn is_block_type(type_id: &str) -> bool {
    BLOCK_TYPES.contains(&type_id)
}

/// Relation types whose target is a media entity holding a URL.
pub fn is_media_relation_type(type_id: &str) -> bool {
    type_id == AVATAR_PROPERTY || type_id == COVER_PROPERTY
}

pub fn is_config_relation_type(type_id: &str) -> bool {
    CONFIG_RELATION_TYPES.contains(&type_id)
}

pub fn is_config_value_property(property_id: &str) -> bool {
    CONFIG_VALUE_PROPERTIES.contains(&property_id)
}
