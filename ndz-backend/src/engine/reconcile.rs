use chrono::{DateTime, Utc};
use ndz_common::{Owner, Sighting};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::expiry::ExpiryPolicy;
use super::store::SightingStore;
use crate::feed::{Batch, Observation};
use crate::owner::{fetch_owners, OwnerSource};

/// What one reconciliation did to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// Snapshot timestamp of the merged batch
    pub observed_at: DateTime<Utc>,
    /// Usable records in the batch
    pub records: usize,
    /// Records dropped by the normalizer
    pub skipped_records: usize,
    /// Existing sightings refreshed by this batch
    pub updated: usize,
    /// New violations stored with their owner
    pub created: usize,
    /// New violations left out because the owner lookup failed
    pub enrichment_failures: usize,
    /// Unknown aircraft outside the zone
    pub discarded: usize,
    pub expired: usize,
    /// Store size after the cycle
    pub total: usize,
}

/// Next store plus the report of how it was derived
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub store: SightingStore,
    pub report: CycleReport,
}

/// Fold a fresh observation into an already tracked sighting.
///
/// `closest_distance` only ever shrinks and `first_violation_at` is only
/// ever set once. An observation older than `last_seen_at` cannot move the
/// last-seen time, position or altitude backwards.
pub fn merge_observation(sighting: &mut Sighting, observation: &Observation) {
    if observation.observed_at >= sighting.last_seen_at {
        sighting.last_seen_at = observation.observed_at;
        sighting.position = observation.position;
        sighting.altitude = observation.altitude;
    }

    if observation.is_violation && sighting.first_violation_at.is_none() {
        sighting.first_violation_at = Some(observation.observed_at);
    }

    sighting.closest_distance = sighting.closest_distance.min(observation.distance);
}

fn new_violation(observation: &Observation, owner: Owner) -> Sighting {
    Sighting {
        id: observation.id.clone(),
        model: observation.model.clone(),
        manufacturer: observation.manufacturer.clone(),
        position: observation.position,
        altitude: observation.altitude,
        last_seen_at: observation.observed_at,
        first_violation_at: Some(observation.observed_at),
        closest_distance: observation.distance,
        owner: Some(owner),
    }
}

/// Merge `batch` into `current` and return the next store.
///
/// `current` is left untouched; the result is a new value. Sightings are
/// only ever created for violations whose owner lookup succeeded, and
/// sightings missing from the batch are kept until `expiry` drops them.
pub async fn reconcile<O>(
    current: &SightingStore,
    batch: &Batch,
    owners: &O,
    expiry: &ExpiryPolicy,
    now: DateTime<Utc>,
) -> Reconciled
where
    O: OwnerSource + ?Sized,
{
    let mut next = current.clone();
    let mut report = CycleReport {
        observed_at: batch.observed_at(),
        records: batch.len(),
        skipped_records: batch.skipped(),
        updated: 0,
        created: 0,
        enrichment_failures: 0,
        discarded: 0,
        expired: 0,
        total: 0,
    };

    let mut candidates: Vec<&Observation> = Vec::new();
    for observation in batch.records() {
        if let Some(sighting) = next.get_mut(&observation.id) {
            merge_observation(sighting, observation);
            report.updated += 1;
        } else if observation.is_violation {
            candidates.push(observation);
        } else {
            report.discarded += 1;
        }
    }

    if !candidates.is_empty() {
        let serials: Vec<&str> = candidates.iter().map(|o| o.id.as_str()).collect();
        debug!("Looking up owners for {} new violations", serials.len());

        let results = fetch_owners(owners, &serials).await;
        for (observation, result) in candidates.into_iter().zip(results) {
            match result {
                Ok(owner) => {
                    info!(
                        "New violation: {} at {:.2} km, pilot {} ({})",
                        observation.id,
                        observation.distance,
                        owner.full_name(),
                        owner.pilot_id
                    );
                    next.insert(new_violation(observation, owner));
                    report.created += 1;
                }
                Err(e) => {
                    warn!(
                        "Owner lookup failed for {}, retrying next cycle: {}",
                        observation.id, e
                    );
                    report.enrichment_failures += 1;
                }
            }
        }
    }

    let before_expiry = next.len();
    let next = expiry.expire(next, now);
    report.expired = before_expiry - next.len();
    report.total = next.len();

    Reconciled { store: next, report }
}
