use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ndz_common::{Sighting, SightingSnapshot};

/// Current sightings keyed by aircraft serial.
///
/// Only the cycle runner holds one of these. Every cycle builds the next
/// store as a new value; readers only ever see [`SightingSnapshot`]s taken
/// from a finished store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SightingStore {
    entries: HashMap<String, Sighting>,
}

impl SightingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Sighting> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sighting> {
        self.entries.values()
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Sighting> {
        self.entries.get_mut(id)
    }

    /// Insert keyed by `sighting.id`, replacing any entry with the same id.
    pub(crate) fn insert(&mut self, sighting: Sighting) {
        self.entries.insert(sighting.id.clone(), sighting);
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Sighting) -> bool) {
        self.entries.retain(|_, sighting| keep(sighting));
    }

    /// Copy out an immutable snapshot, most recently seen first.
    pub fn snapshot(&self, generation: u64, completed_at: DateTime<Utc>) -> SightingSnapshot {
        let mut sightings: Vec<Sighting> = self.iter().cloned().collect();
        sightings.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        SightingSnapshot {
            generation,
            completed_at: Some(completed_at),
            sightings,
        }
    }
}

impl FromIterator<Sighting> for SightingStore {
    fn from_iter<I: IntoIterator<Item = Sighting>>(iter: I) -> Self {
        let mut store = SightingStore::new();
        for sighting in iter {
            store.insert(sighting);
        }
        store
    }
}
