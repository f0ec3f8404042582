use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by a reconciliation cycle and its collaborators.
///
/// None of these are fatal to the service: a failed cycle leaves the
/// previous snapshot in place and the next tick tries again.
#[derive(Debug, Error)]
pub enum NdzError {
    #[error("feed request failed: {0}")]
    FeedUnavailable(#[source] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    FeedStatus(StatusCode),

    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("owner lookup for {serial} failed: {source}")]
    OwnerUnavailable {
        serial: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("owner lookup for {serial} returned HTTP {status}")]
    OwnerStatus { serial: String, status: StatusCode },

    #[error("reconciliation cycle timed out after {0:?}")]
    CycleTimeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl NdzError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        NdzError::MalformedFeed(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        NdzError::Config(reason.into())
    }
}

pub type Result<T, E = NdzError> = std::result::Result<T, E>;
