//! Sighting reconciliation engine
//!
//! - [`store`]: the authoritative id → sighting map
//! - [`reconcile`]: merges one feed batch into the store
//! - [`expiry`]: retention window policy
//! - [`runner`]: one poll → merge → publish cycle

pub mod expiry;
pub mod reconcile;
pub mod runner;
pub mod store;

pub use expiry::ExpiryPolicy;
pub use reconcile::{reconcile, CycleReport, Reconciled};
pub use runner::{CycleRunner, CycleStats};
pub use store::SightingStore;
