//! The diff engine: local session diffing and the shared post-processing pipeline

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use geodiff_core::{
    ConfigParent, Entity, EntityDiff, EntityId, LocalRelation, LocalValue, RelationChange,
    build_entity_diff, system_ids,
};
use indexmap::{IndexMap, IndexSet};

use crate::config::EngineConfig;
use crate::config_blocks::resolve_config_entities;
use crate::fanout::fetch_entities;
use crate::grouping::group_blocks_under_parents;
use crate::media::resolve_media;
use crate::names::resolve_names;
use crate::orphans::{OrphanHints, resolve_orphans};
use crate::source::EntitySource;
use crate::synth::synthesize_blocks;

/// What the local session knows beyond the changed entities themselves.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Targets of every containment edge in the full relation set
    pub known_blocks: HashSet<EntityId>,
    /// Block id -> parent id from the full relation set
    pub known_parents: IndexMap<EntityId, EntityId>,
    /// Targets of image/video property relations in the full relation set
    pub known_media: HashSet<EntityId>,
    pub config_to_parent: HashMap<EntityId, ConfigParent>,
    /// Remote snapshots fetched while diffing
    pub snapshots: HashMap<EntityId, Entity>,
}

impl SessionContext {
    /// Containment and media knowledge from the complete relation set, deleted edges included.
    ///
    /// A containment edge that has its own relation entity is where a data
    /// block keeps its view configuration, so that entity maps to the block
    /// and its page.
    pub fn from_relations(all_relations: &[LocalRelation]) -> Self {
        let mut context = SessionContext::default();
        for relation in all_relations {
            if relation.relation_type.id == system_ids::BLOCKS {
                context.note_containment(
                    &relation.from_entity.id,
                    &relation.to_entity.id,
                    relation.entity_id.as_deref(),
                    !relation.is_deleted,
                );
            } else if relation.is_media() {
                context.known_media.insert(relation.to_entity.id.clone());
            }
        }
        context
    }

    /// Fold in containment edges stored on remote snapshots.
    pub fn absorb_snapshots(&mut self, snapshots: &HashMap<EntityId, Entity>) {
        for entity in snapshots.values() {
            for relation in entity.relations.iter().filter(|r| r.relation_type.id == system_ids::BLOCKS) {
                self.note_containment(&entity.id, &relation.to_entity.id, relation.entity_id.as_deref(), true);
            }
        }
    }

    fn note_containment(&mut self, parent_id: &str, block_id: &str, relation_entity: Option<&str>, live: bool) {
        self.known_blocks.insert(block_id.to_string());
        if !live {
            return;
        }
        self.known_parents
            .entry(block_id.to_string())
            .or_insert_with(|| parent_id.to_string());
        if let Some(config_id) = relation_entity {
            self.config_to_parent.entry(config_id.to_string()).or_insert_with(|| ConfigParent {
                parent_id: parent_id.to_string(),
                data_block_entity_id: block_id.to_string(),
            });
        }
    }
}

/// Computes renderable entity diffs against a remote knowledge graph.
pub struct DiffEngine {
    source: Arc<dyn EntitySource>,
    config: EngineConfig,
}

impl DiffEngine {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: Arc<dyn EntitySource>, config: EngineConfig) -> Self {
        DiffEngine { source, config: config.clamped() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Diff a pending local edit session against the remote baseline.
    ///
    /// `all_relations` is the full current relation set, unedited relations
    /// included; without it an image that is also a block may be mistaken
    /// for an avatar-style media entity.
    pub async fn from_local(
        &self,
        space_id: &str,
        values: &[LocalValue],
        relations: &[LocalRelation],
        all_relations: Option<&[LocalRelation]>,
        config_to_parent: Option<&HashMap<EntityId, ConfigParent>>,
    ) -> Vec<EntityDiff> {
        let mut changed: IndexSet<EntityId> = IndexSet::new();
        changed.extend(values.iter().map(|v| v.entity.id.clone()));
        changed.extend(relations.iter().map(|r| r.from_entity.id.clone()));

        let media_targets = relations.iter().filter(|r| r.is_media()).map(|r| r.to_entity.id.clone());
        let to_fetch: IndexSet<EntityId> = changed.iter().cloned().chain(media_targets).collect();

        let source = self.source.as_ref();
        let mut snapshots =
            fetch_entities(source, to_fetch.into_iter().collect(), Some(space_id), &self.config).await;

        // Media the remote side points at, so removed avatars still show their image.
        let second_hop: IndexSet<EntityId> = snapshots
            .values()
            .flat_map(|e| e.relations.iter())
            .filter(|r| {
                r.renderable_type.is_some_and(|t| t.is_media())
                    || system_ids::is_media_relation_type(&r.relation_type.id)
            })
            .map(|r| r.to_entity.id.clone())
            .filter(|id| !snapshots.contains_key(id))
            .collect();
        if !second_hop.is_empty() {
            let media = fetch_entities(source, second_hop.into_iter().collect(), Some(space_id), &self.config).await;
            snapshots.extend(media);
        }

        let mut diffs = Vec::new();
        for entity_id in &changed {
            let entity_values: Vec<&LocalValue> = values.iter().filter(|v| &v.entity.id == entity_id).collect();
            let entity_relations: Vec<&LocalRelation> =
                relations.iter().filter(|r| &r.from_entity.id == entity_id).collect();
            if let Some(diff) = build_entity_diff(
                entity_id,
                space_id,
                &entity_values,
                &entity_relations,
                &snapshots,
                &self.config.media_url_prefix,
            ) {
                diffs.push(diff);
            }
        }
        backfill_block_types(&mut diffs, &snapshots, space_id);
        tracing::info!("Built {} entity diffs from {} changed entities", diffs.len(), changed.len());

        let mut context = all_relations.map(SessionContext::from_relations).unwrap_or_default();
        context.absorb_snapshots(&snapshots);
        if let Some(map) = config_to_parent {
            context.config_to_parent.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        context.snapshots = snapshots;

        self.run(diffs, space_id, &context).await
    }

    /// Shared tail pipeline for local and server-computed diffs.
    pub async fn post_process_diffs(
        &self,
        entities: Vec<EntityDiff>,
        space_id: &str,
        config_to_parent: Option<&HashMap<EntityId, ConfigParent>>,
    ) -> Vec<EntityDiff> {
        let context = SessionContext {
            config_to_parent: config_to_parent.cloned().unwrap_or_default(),
            ..SessionContext::default()
        };
        self.run(entities, space_id, &context).await
    }

    async fn run(&self, entities: Vec<EntityDiff>, space_id: &str, context: &SessionContext) -> Vec<EntityDiff> {
        let source = self.source.as_ref();
        let config = &self.config;
        let input = entities.len();

        let media = resolve_media(
            entities,
            space_id,
            &context.known_blocks,
            &context.known_media,
            &context.snapshots,
            source,
            config,
        )
        .await;
        let configs = resolve_config_entities(media.entities, space_id, &context.config_to_parent, source, config).await;
        let hints = OrphanHints {
            parent_hints: Some(&configs.parent_hints),
            known_parents: Some(&context.known_parents),
            known_blocks: Some(&context.known_blocks),
            media_ids: Some(&media.media_ids),
        };
        let placed = resolve_orphans(configs.entities, space_id, hints, source, config).await;
        let synthesized = synthesize_blocks(placed, space_id, source, config).await;
        let grouped = group_blocks_under_parents(synthesized, &config.media_url_prefix);

        let output = if config.resolve_names {
            resolve_names(grouped, source, config).await
        } else {
            grouped
        };
        tracing::debug!("Post-processed {} diffs into {}", input, output.len());
        output
    }
}

/// Give changed entities that are blocks remotely, but whose edits don't
/// touch their type, the TYPES relation later stages recognise blocks by.
/// Only block types count; an entity typed as plain image or video is media.
fn backfill_block_types(diffs: &mut [EntityDiff], snapshots: &HashMap<EntityId, Entity>, space_id: &str) {
    for diff in diffs.iter_mut() {
        if diff.relations.iter().any(RelationChange::is_type_relation) {
            continue;
        }
        let Some(remote) = snapshots.get(&diff.entity_id) else {
            continue;
        };
        if let Some(block_type) = remote.types.iter().find(|t| system_ids::is_block_type(&t.id)) {
            diff.relations.push(RelationChange::synthetic_add(
                format!("remote-type-{}", diff.entity_id),
                system_ids::TYPES_PROPERTY,
                space_id,
                &block_type.id,
            ));
        }
    }
}
