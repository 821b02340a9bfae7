//! HTTP page fetcher
//!
//! Plain GET without JavaScript rendering.

use crate::types::PageFetcher;
use reqwest::Client;
use spotscrape_common::{Error, Result};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("SpotScrape/", env!("CARGO_PKG_VERSION"));
const SERVICE: &str = "page";

pub struct HttpPageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "Fetching page");
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout.as_millis() as u64)
            } else {
                Error::external(SERVICE, e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::external_status(
                SERVICE,
                status.as_u16(),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| Error::external(SERVICE, format!("Failed to read body: {}", e)))
    }
}
