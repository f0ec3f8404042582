use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::expiry::ExpiryPolicy;
use super::reconcile::{reconcile, CycleReport};
use super::store::SightingStore;
use crate::error::{NdzError, Result};
use crate::feed::{parse_report, FeedDevice, FeedSource};
use crate::owner::OwnerSource;
use crate::publisher::Publisher;
use crate::zone::NoFlyZone;

/// Running totals exposed on the stats endpoint
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
    pub last_error: Option<String>,
    pub device: Option<FeedDevice>,
}

/// Owns the sighting store and runs one cycle at a time.
///
/// `run_cycle` takes `&mut self`, so whoever holds the runner is the single
/// writer. The store is replaced only after a cycle has fully finished; a
/// cycle that fails or is dropped part way leaves it as it was.
pub struct CycleRunner {
    feed: Arc<dyn FeedSource>,
    owners: Arc<dyn OwnerSource>,
    zone: NoFlyZone,
    expiry: ExpiryPolicy,
    store: SightingStore,
    generation: u64,
    publisher: Publisher,
    stats: Arc<RwLock<CycleStats>>,
}

impl CycleRunner {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        owners: Arc<dyn OwnerSource>,
        zone: NoFlyZone,
        expiry: ExpiryPolicy,
        publisher: Publisher,
    ) -> Self {
        Self {
            feed,
            owners,
            zone,
            expiry,
            store: SightingStore::new(),
            generation: 0,
            publisher,
            stats: Arc::new(RwLock::new(CycleStats::default())),
        }
    }

    /// Handle to the shared stats (read-only access from handlers).
    pub fn stats_handle(&self) -> Arc<RwLock<CycleStats>> {
        self.stats.clone()
    }

    pub fn store(&self) -> &SightingStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fetch → normalize → reconcile → publish.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let body = self.feed.fetch_report().await?;
        let batch = parse_report(&body, &self.zone)?;

        let reconciled = reconcile(
            &self.store,
            &batch,
            self.owners.as_ref(),
            &self.expiry,
            Utc::now(),
        )
        .await;

        // Nothing below awaits once the stats lock is held.
        let mut stats = self.stats.write().await;

        let completed_at = Utc::now();
        self.store = reconciled.store;
        self.generation += 1;
        self.publisher
            .publish(self.store.snapshot(self.generation, completed_at));

        let report = reconciled.report;
        stats.cycles_completed += 1;
        stats.last_success_at = Some(completed_at);
        stats.last_report = Some(report.clone());
        stats.last_error = None;
        if let Some(device) = batch.device() {
            stats.device = Some(device.clone());
        }
        drop(stats);

        info!(
            "Cycle {} done: {} records, {} updated, {} new, {} owner failures, {} expired, {} tracked",
            self.generation,
            report.records,
            report.updated,
            report.created,
            report.enrichment_failures,
            report.expired,
            report.total
        );
        Ok(report)
    }

    /// Record a cycle that did not complete. The store is not touched.
    pub async fn record_failure(&self, error: &NdzError) {
        warn!("Cycle abandoned, keeping previous state: {}", error);
        let mut stats = self.stats.write().await;
        stats.cycles_failed += 1;
        stats.last_error = Some(error.to_string());
    }
}
