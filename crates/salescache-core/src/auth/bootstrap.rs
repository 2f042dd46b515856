//! Post-login warm-up of every cached entity.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::info;

use crate::api::EntityFetcher;
use crate::cache::storage::KeyValueStore;
use crate::cache::{CacheManager, EntityKind, FetchOptions};

/// Outcome of a warm-up run.
#[derive(Debug, Clone)]
pub struct WarmUpReport {
    /// Record count per entity after the refresh, in `EntityKind::ALL` order.
    pub counts: Vec<(EntityKind, usize)>,
    pub elapsed: Duration,
}

impl WarmUpReport {
    pub fn total_records(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    pub fn count(&self, kind: EntityKind) -> Option<usize> {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
    }
}

/// Force-refresh every entity concurrently and wait for all of them.
///
/// Individual failures are absorbed by the cache (each entity falls back to
/// its previous or empty value), so one unreachable endpoint never blocks
/// the rest. Raw settings are refreshed through the categorized read.
pub async fn warm_up_all<S, F>(cache: &CacheManager<S, F>) -> WarmUpReport
where
    S: KeyValueStore,
    F: EntityFetcher,
{
    let started = Instant::now();
    info!("Warm-up started");

    let kinds: Vec<EntityKind> = EntityKind::ALL
        .iter()
        .copied()
        .filter(|k| !matches!(k, EntityKind::Settings | EntityKind::CategorizedSettings))
        .collect();

    let refreshes = kinds.iter().map(|&kind| async move {
        let value = cache.get(kind, FetchOptions::refresh(true)).await;
        (kind, kind.policy().shape.record_count(&value))
    });

    let (mut counts, categorized) = futures::join!(
        join_all(refreshes),
        cache.app_categorized_settings(true)
    );

    let settings = cache.peek(EntityKind::Settings, false);
    counts.push((
        EntityKind::Settings,
        settings.as_ref().and_then(|v| v.as_array()).map_or(0, Vec::len),
    ));
    counts.push((EntityKind::CategorizedSettings, categorized.total()));
    counts.sort_by_key(|(kind, _)| *kind);

    let report = WarmUpReport {
        counts,
        elapsed: started.elapsed(),
    };
    info!(
        entities = report.counts.len(),
        records = report.total_records(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Warm-up complete"
    );
    report
}
