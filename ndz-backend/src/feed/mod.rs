//! Drone position feed
//!
//! Fetches one snapshot report per poll and normalizes it into a [`Batch`]
//! of observations sharing the report's snapshot timestamp.

pub mod client;
pub mod parser;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use client::HttpFeedSource;
pub use parser::parse_report;
pub use types::{Batch, FeedDevice, Observation};

/// Source of raw snapshot reports.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the current report body. Parsing happens in [`parse_report`].
    async fn fetch_report(&self) -> Result<String>;
}
