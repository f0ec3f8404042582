use chrono::{DateTime, Duration, Utc};
use ndz_common::Sighting;

use super::store::SightingStore;

pub const DEFAULT_RETENTION_MINUTES: i64 = 10;

/// Drops sightings not observed within the retention window.
///
/// A sighting last seen exactly `retention` ago is kept; anything older goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    retention: Duration,
}

impl ExpiryPolicy {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Oldest `lastSeenAt` still retained at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub fn is_expired(&self, sighting: &Sighting, now: DateTime<Utc>) -> bool {
        sighting.last_seen_at < self.cutoff(now)
    }

    pub fn expire(&self, store: SightingStore, now: DateTime<Utc>) -> SightingStore {
        let mut store = store;
        store.retain(|sighting| !self.is_expired(sighting, now));
        store
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_RETENTION_MINUTES))
    }
}
