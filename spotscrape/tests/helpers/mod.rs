//! Test helper utilities
//!
//! In-memory fakes for the outbound capabilities plus app/router builders.

#![allow(dead_code)]

pub mod fakes;

pub use fakes::{album, numbered_tracks, FakeAnalyzer, FakePageFetcher, FakePlaylistService};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use spotscrape::services::SessionStore;
use spotscrape::types::ContentAnalyzer;
use spotscrape::{AppState, Capabilities};
use spotscrape_common::config::SpotScrapeConfig;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// Album ids used across tests (22 alphanumerics)
pub const ID_A: &str = "4aawyAB9vmqN3uQ7FjRGTy";
pub const ID_B: &str = "1DFixLWuPkv3KT3TnV35m3";
pub const ID_C: &str = "6dVIqQ8qmQ5GBnJ9shOYGE";
pub const ID_D: &str = "2noRn2Aes5aoNVsU6iWThc";

/// Config with fast retries
pub fn test_config() -> SpotScrapeConfig {
    let mut config = SpotScrapeConfig::default();
    config.retry.max_attempts = 2;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.timeout_ms = 2_000;
    config.retry.max_concurrency = 4;
    config
}

pub fn capabilities(
    fetcher: FakePageFetcher,
    service: Arc<FakePlaylistService>,
    analyzer: Option<FakeAnalyzer>,
) -> Capabilities {
    Capabilities {
        fetcher: Arc::new(fetcher),
        service,
        analyzer: analyzer.map(|a| Arc::new(a) as Arc<dyn ContentAnalyzer>),
    }
}

pub fn test_state(capabilities: Capabilities) -> AppState {
    AppState::new(test_config(), capabilities)
}

/// Send a JSON request through the router, returning status and parsed body
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Wait until the session leaves `running`
pub async fn wait_until_settled(store: &SessionStore) {
    for _ in 0..500 {
        if store.status().await.is_terminal() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan did not settle in time");
}

/// Page linking to the given album ids in a few different notations
pub fn album_page(ids: &[&str]) -> String {
    let mut html = String::from("<html><body><main><h1>Best albums</h1>");
    for (i, id) in ids.iter().enumerate() {
        match i % 3 {
            0 => html.push_str(&format!(
                r#"<a href="https://open.spotify.com/album/{}?si=abc">Album</a>"#,
                id
            )),
            1 => html.push_str(&format!(r#"<a href="/album/{}">Album</a>"#, id)),
            _ => html.push_str(&format!(
                r#"<script>var link = "https:\/\/open.spotify.com\/album\/{}";</script>"#,
                id
            )),
        }
    }
    html.push_str("</main></body></html>");
    html
}
