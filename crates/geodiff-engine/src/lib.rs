//! Geodiff Engine — async reconciliation pipeline over remote entity lookups
//!
//! Takes per-entity diffs (from a local edit session or computed by the
//! server), resolves media, configuration entities and orphan blocks against
//! an [`EntitySource`], synthesizes implied blocks and nests every block
//! under the entity that contains it.

pub mod error;
pub mod config;
pub mod source;
pub mod memory;
pub mod fanout;
pub mod media;
pub mod config_blocks;
pub mod orphans;
pub mod synth;
pub mod grouping;
pub mod names;
pub mod pipeline;

#[cfg(test)]
pub mod tests;

pub use config::EngineConfig;
pub use error::{ConfigError, SourceError};
pub use memory::{MemoryStore, StoreFixture};
pub use pipeline::{DiffEngine, SessionContext};
pub use source::EntitySource;
