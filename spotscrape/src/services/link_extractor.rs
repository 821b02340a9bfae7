//! Link-scan extraction backend
//!
//! Finds Spotify album identifiers in a page's HTML and looks each one up
//! through the playlist service.
//!
//! Progress bands: fetch 10%, scan 30%, lookups 50-95%.

use crate::models::{RawCandidate, ScanMethod};
use crate::types::{Extractor, PageFetcher, PlaylistService, ScanSink};
use futures::stream::{FuturesUnordered, StreamExt};
use regex::Regex;
use scraper::{Html, Selector};
use spotscrape_common::events::LogLevel;
use spotscrape_common::{Error, Result};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use url::Url;

fn album_id_regex() -> &'static Regex {
    static ALBUM_ID: OnceLock<Regex> = OnceLock::new();
    ALBUM_ID.get_or_init(|| {
        Regex::new(
            r"(?i)(?:open\.spotify\.com/album/|play\.spotify\.com/album/|spotify:album:|spotify\.com/album/|embed/album/|api\.spotify\.com/v1/albums/|/album/)([a-z0-9]{22})\b",
        )
        .expect("album id pattern is valid")
    })
}

fn anchor_selector() -> &'static Selector {
    static ANCHOR: OnceLock<Selector> = OnceLock::new();
    ANCHOR.get_or_init(|| Selector::parse("a[href]").expect("anchor selector is valid"))
}

/// Undo JSON and HTML escaping that hides links in inline scripts
fn unescape(content: &str) -> String {
    content.replace("\\/", "/").replace("&amp;", "&")
}

/// Spotify album ids found in `html`, de-duplicated in first-seen order
///
/// Scans the raw content first, then every anchor `href` resolved against
/// `page_url`.
pub fn extract_album_ids(html: &str, page_url: &str) -> Vec<String> {
    let regex = album_id_regex();
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let mut push = |id: &str| {
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    };

    let content = unescape(html);
    for capture in regex.captures_iter(&content) {
        if let Some(id) = capture.get(1) {
            push(id.as_str());
        }
    }

    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    for anchor in document.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = unescape(href.trim());
        let resolved = match &base {
            Some(b) => b.join(&href).map(|u| u.to_string()).unwrap_or(href),
            None => href,
        };
        for capture in regex.captures_iter(&resolved) {
            if let Some(id) = capture.get(1) {
                push(id.as_str());
            }
        }
    }

    ids
}

pub struct LinkExtractor {
    fetcher: Arc<dyn PageFetcher>,
    service: Arc<dyn PlaylistService>,
}

impl LinkExtractor {
    /// `service` is expected to bound its own concurrency (see
    /// `RetryingPlaylistService`); lookups are issued all at once.
    pub fn new(fetcher: Arc<dyn PageFetcher>, service: Arc<dyn PlaylistService>) -> Self {
        Self { fetcher, service }
    }

    /// Fetch `url`, scan it for album links and look each album up
    pub async fn extract_links(&self, url: &str, sink: &dyn ScanSink) -> Result<Vec<RawCandidate>> {
        sink.progress(10, &format!("Fetching page {}", url)).await;
        let html = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| Error::Extraction(format!("Could not load page {}: {}", url, e)))?;

        sink.progress(30, "Scanning page for Spotify album links").await;
        let ids = extract_album_ids(&html, url);
        if ids.is_empty() {
            sink.log(LogLevel::Warning, "No Spotify album links found on page").await;
            return Ok(Vec::new());
        }
        info!(url, album_links = ids.len(), "Album links found");
        sink.progress(50, &format!("Found {} album links, looking up albums", ids.len()))
            .await;

        let total = ids.len();
        let mut lookups: FuturesUnordered<_> = ids
            .into_iter()
            .map(|id| {
                let service = self.service.clone();
                async move {
                    let outcome = service.get_album(&id).await;
                    (id, outcome)
                }
            })
            .collect();

        let mut candidates = Vec::new();
        let mut done = 0usize;
        while let Some((id, outcome)) = lookups.next().await {
            done += 1;
            match outcome {
                Ok(Some(album)) => {
                    debug!(album_id = %id, "Album resolved");
                    let candidate = album.to_candidate(url);
                    sink.candidate(candidate.clone()).await;
                    candidates.push(candidate);
                }
                Ok(None) => {
                    sink.log(LogLevel::Warning, &format!("Album not found: {}", id)).await;
                }
                Err(e) => {
                    warn!(album_id = %id, error = %e, "Album lookup failed");
                    sink.log(
                        LogLevel::Warning,
                        &format!("Failed to look up album {}: {}", id, e),
                    )
                    .await;
                }
            }
            let percent = 50 + (done * 45 / total) as u8;
            sink.progress(percent, "").await;
        }

        Ok(candidates)
    }
}

#[async_trait::async_trait]
impl Extractor for LinkExtractor {
    fn method(&self) -> ScanMethod {
        ScanMethod::Links
    }

    async fn extract(&self, url: &str, sink: &dyn ScanSink) -> Result<Vec<RawCandidate>> {
        self.extract_links(url, sink).await
    }
}
