//! Snapshot publisher
//!
//! A watch channel holding the latest [`SightingSnapshot`]. The cycle runner
//! is the only writer; it swaps in a whole new snapshot after each completed
//! cycle. Readers either take the current value or subscribe to a stream
//! that starts with the current value.

use std::sync::Arc;

use ndz_common::SightingSnapshot;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

#[derive(Clone)]
pub struct Publisher {
    tx: Arc<watch::Sender<Arc<SightingSnapshot>>>,
}

impl Publisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(SightingSnapshot::empty()));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current snapshot and notify every subscriber.
    pub fn publish(&self, snapshot: SightingSnapshot) {
        let subscribers = self.tx.receiver_count();
        tracing::debug!(
            "Publishing generation {} ({} sightings) to {} subscribers",
            snapshot.generation,
            snapshot.sightings.len(),
            subscribers
        );
        self.tx.send_replace(Arc::new(snapshot));
    }

    /// Re-send the current snapshot to every subscriber without changing it.
    pub fn republish(&self) {
        self.tx.send_modify(|_| {});
    }

    pub fn current(&self) -> Arc<SightingSnapshot> {
        self.tx.borrow().clone()
    }

    /// Stream of snapshots; yields the current one immediately.
    pub fn subscribe(&self) -> WatchStream<Arc<SightingSnapshot>> {
        WatchStream::new(self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}
