//! Bounded fan-out of independent lookups

use std::collections::HashMap;
use std::future::Future;

use futures_util::stream::{self, StreamExt};
use geodiff_core::{Entity, EntityId};

use crate::config::EngineConfig;
use crate::error::SourceError;
use crate::source::EntitySource;

/// Run `lookup` for every item with at most `limit` in flight.
///
/// Results come back in input order, and only once every lookup has settled.
/// A failed lookup is logged and yields `None` for that item alone.
pub async fn gather<I, T, F, Fut>(items: Vec<I>, limit: usize, stage: &str, lookup: F) -> Vec<(I, Option<T>)>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    stream::iter(items)
        .map(|item| {
            let pending = lookup(item.clone());
            async move {
                match pending.await {
                    Ok(value) => (item, Some(value)),
                    Err(e) => {
                        tracing::warn!("{} lookup failed: {}", stage, e);
                        (item, None)
                    }
                }
            }
        })
        .buffered(limit.max(1))
        .collect()
        .await
}

/// Fetch remote snapshots for `ids`, split into `batch_size` chunks.
///
/// Ids the source doesn't know are simply absent from the map. A failed
/// chunk is logged and its ids are treated the same way.
pub async fn fetch_entities(
    source: &dyn EntitySource,
    ids: Vec<EntityId>,
    space_id: Option<&str>,
    config: &EngineConfig,
) -> HashMap<EntityId, Entity> {
    if ids.is_empty() {
        return HashMap::new();
    }

    let chunks: Vec<Vec<EntityId>> = ids.chunks(config.batch_size.max(1)).map(|c| c.to_vec()).collect();
    tracing::debug!(
        "Fetching {} entities in {} batch(es) from {}",
        ids.len(),
        chunks.len(),
        source.name()
    );

    let results: Vec<_> = stream::iter(chunks)
        .map(|chunk| async move {
            let fetched = source.get_batch_entities(&chunk, space_id).await;
            (chunk, fetched)
        })
        .buffered(config.max_concurrent_lookups.max(1))
        .collect()
        .await;

    let mut entities = HashMap::new();
    for (chunk, fetched) in results {
        match fetched {
            Ok(batch) => {
                for entity in batch {
                    entities.insert(entity.id.clone(), entity);
                }
            }
            Err(e) => tracing::error!("Failed to fetch batch of {} entities: {}", chunk.len(), e),
        }
    }
    entities
}
