use std::time::Duration;

use async_trait::async_trait;
use ndz_common::Owner;
use reqwest::Client;

use super::OwnerSource;
use crate::error::{NdzError, Result};

const USER_AGENT: &str = concat!("ndz-backend/", env!("CARGO_PKG_VERSION"));

/// Pilot registry client: `GET {base_url}/{serial}`
pub struct HttpOwnerSource {
    client: Client,
    base_url: String,
}

impl HttpOwnerSource {
    /// `timeout` bounds each lookup, so one stuck request cannot stall a cycle.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(NdzError::HttpClient)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn owner_url(&self, serial: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(serial)
        )
    }
}

#[async_trait]
impl OwnerSource for HttpOwnerSource {
    async fn fetch_owner(&self, serial: &str) -> Result<Owner> {
        let url = self.owner_url(serial);
        tracing::debug!("Fetching owner of {} from {}", serial, url);

        let unavailable = |source| NdzError::OwnerUnavailable {
            serial: serial.to_string(),
            source,
        };

        let response = self.client.get(&url).send().await.map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NdzError::OwnerStatus {
                serial: serial.to_string(),
                status,
            });
        }

        response.json::<Owner>().await.map_err(unavailable)
    }
}
