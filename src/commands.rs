//! CLI command implementations

use anyhow::Context;
use geodiff_core::{ConfigParent, EntityDiff, EntityId, EntitySnapshot, LocalRelation, LocalValue};
use geodiff_engine::{DiffEngine, EngineConfig, MemoryStore};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A pending local edit session as written by the browser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSession {
    #[serde(default)]
    pub values: Vec<LocalValue>,
    #[serde(default)]
    pub relations: Vec<LocalRelation>,
    #[serde(default)]
    pub all_relations: Option<Vec<LocalRelation>>,
    #[serde(default)]
    pub config_to_parent: Option<HashMap<EntityId, ConfigParent>>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_engine(store: &Path, config: EngineConfig) -> anyhow::Result<DiffEngine> {
    let store = MemoryStore::load(store)
        .with_context(|| format!("Failed to load store from {}", store.display()))?;
    Ok(DiffEngine::with_config(Arc::new(store), config))
}

fn print_diffs(diffs: &[EntityDiff]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(diffs)?);
    Ok(())
}

pub async fn local(store: &Path, session: &Path, space: &str, config: EngineConfig) -> anyhow::Result<()> {
    let engine = load_engine(store, config)?;
    let session: LocalSession = read_json(session)?;
    tracing::info!(
        "Diffing {} values and {} relations in space {}",
        session.values.len(),
        session.relations.len(),
        space
    );

    let diffs = engine
        .from_local(
            space,
            &session.values,
            &session.relations,
            session.all_relations.as_deref(),
            session.config_to_parent.as_ref(),
        )
        .await;
    print_diffs(&diffs)
}

pub async fn process(store: &Path, diffs: &Path, space: &str, config: EngineConfig) -> anyhow::Result<()> {
    let engine = load_engine(store, config)?;
    let payload = std::fs::read_to_string(diffs)
        .with_context(|| format!("Failed to read {}", diffs.display()))?;
    let entities = geodiff_core::parse_api_diffs(&payload)
        .with_context(|| format!("Failed to parse diffs from {}", diffs.display()))?;
    tracing::info!("Post-processing {} server diffs in space {}", entities.len(), space);

    let processed = engine.post_process_diffs(entities, space, None).await;
    print_diffs(&processed)
}

pub fn snapshot(input: &Path) -> anyhow::Result<()> {
    let snapshot: EntitySnapshot = read_json(input)?;
    let diff = geodiff_core::snapshot_to_diff(&snapshot);
    print_diffs(std::slice::from_ref(&diff))
}
