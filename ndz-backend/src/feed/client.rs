use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::FeedSource;
use crate::error::{NdzError, Result};

const USER_AGENT: &str = concat!("ndz-backend/", env!("CARGO_PKG_VERSION"));

/// Fetches snapshot reports over HTTP
pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(NdzError::HttpClient)?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_report(&self) -> Result<String> {
        tracing::debug!("Fetching drone report from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(NdzError::FeedUnavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NdzError::FeedStatus(status));
        }

        response.text().await.map_err(NdzError::FeedUnavailable)
    }
}
