//! Pilot registry lookups
//!
//! Owners are fetched once, when an aircraft is first seen inside the zone.

pub mod client;

use async_trait::async_trait;
use futures::future::join_all;
use ndz_common::Owner;

use crate::error::Result;

pub use client::HttpOwnerSource;

/// Source of owner identity for an aircraft serial.
#[async_trait]
pub trait OwnerSource: Send + Sync {
    async fn fetch_owner(&self, serial: &str) -> Result<Owner>;
}

/// Look up every serial concurrently and wait for all of them.
///
/// Results come back in the order of `serials`.
pub async fn fetch_owners<O>(source: &O, serials: &[&str]) -> Vec<Result<Owner>>
where
    O: OwnerSource + ?Sized,
{
    join_all(serials.iter().map(|serial| source.fetch_owner(serial))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NdzError;
    use chrono::Utc;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowRegistry {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl OwnerSource for SlowRegistry {
        async fn fetch_owner(&self, serial: &str) -> Result<Owner> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if serial == "unknown" {
                return Err(NdzError::OwnerStatus {
                    serial: serial.to_string(),
                    status: StatusCode::NOT_FOUND,
                });
            }
            Ok(Owner {
                pilot_id: format!("P-{}", serial),
                first_name: "Test".to_string(),
                last_name: "Pilot".to_string(),
                phone_number: "+358000".to_string(),
                email: "pilot@example.com".to_string(),
                created_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_owners_fans_out_and_keeps_order() {
        let registry = SlowRegistry {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        let results = fetch_owners(&registry, &["a", "unknown", "c"]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().pilot_id, "P-a");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().pilot_id, "P-c");
        assert_eq!(registry.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_owners_empty() {
        let registry = SlowRegistry {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        assert!(fetch_owners(&registry, &[]).await.is_empty());
    }
}
