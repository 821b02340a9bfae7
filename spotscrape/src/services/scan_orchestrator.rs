//! Scan and playlist job orchestration
//!
//! Builds the extractor for a scan method, runs it as the single background
//! producer for the new generation, and runs playlist jobs against the
//! settled result set.

use crate::models::{PlaylistJob, PlaylistResult, PlaylistStatus, ScanMethod};
use crate::services::ai_extractor::AiExtractor;
use crate::services::link_extractor::LinkExtractor;
use crate::services::playlist_materializer::PlaylistMaterializer;
use crate::services::session_store::{PlaylistWriter, SessionStore};
use crate::types::{ContentAnalyzer, Extractor, PageFetcher, PlaylistService};
use spotscrape_common::{Error, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Parse a scan URL; only absolute http(s) URLs with a host are accepted
pub fn validate_scan_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("URL is required".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("Invalid URL '{}': {}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "Unsupported URL scheme '{}': use http or https",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::Validation(format!("URL has no host: {}", trimmed)));
    }
    Ok(url)
}

/// Plain-language message for a failed scan
fn failure_message(err: &Error) -> String {
    match err {
        Error::Extraction(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Handle to a started scan
pub struct ScanHandle {
    pub session_id: Uuid,
    pub generation: u64,
    /// Producer task; completes once the session is terminal or replaced
    pub task: JoinHandle<()>,
}

pub struct ScanOrchestrator {
    store: SessionStore,
    fetcher: Arc<dyn PageFetcher>,
    service: Arc<dyn PlaylistService>,
    /// Absent when no analyzer credentials are configured
    analyzer: Option<Arc<dyn ContentAnalyzer>>,
    max_chunk_chars: usize,
}

impl ScanOrchestrator {
    pub fn new(
        store: SessionStore,
        fetcher: Arc<dyn PageFetcher>,
        service: Arc<dyn PlaylistService>,
        analyzer: Option<Arc<dyn ContentAnalyzer>>,
        max_chunk_chars: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            service,
            analyzer,
            max_chunk_chars,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Extractor for `method`
    pub fn extractor(&self, method: ScanMethod) -> Result<Arc<dyn Extractor>> {
        match method {
            ScanMethod::Links => Ok(Arc::new(LinkExtractor::new(
                self.fetcher.clone(),
                self.service.clone(),
            ))),
            ScanMethod::Ai => {
                let analyzer = self.analyzer.clone().ok_or_else(|| {
                    Error::Config(
                        "AI scanning needs an OpenAI API key: set OPENAI_API_KEY or [openai] api_key"
                            .to_string(),
                    )
                })?;
                Ok(Arc::new(AiExtractor::new(
                    self.fetcher.clone(),
                    analyzer,
                    self.service.clone(),
                    self.max_chunk_chars,
                )))
            }
        }
    }

    /// Start a scan of `url`, replacing any running one
    ///
    /// Input problems are reported here; everything after the spawn ends up
    /// in the session state.
    pub async fn start_scan(&self, url: &str, method: ScanMethod) -> Result<ScanHandle> {
        let url = validate_scan_url(url)?;
        let extractor = self.extractor(method)?;

        let writer = self.store.start_scan(url.as_str(), method).await;
        let session_id = writer.session_id();
        let generation = writer.generation();
        let cancel = writer.cancellation_token();

        let task = tokio::spawn(async move {
            info!(session_id = %session_id, generation, "Background scan task started");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(session_id = %session_id, generation, "Scan superseded by a newer scan");
                    return;
                }
                outcome = extractor.extract(url.as_str(), &writer) => outcome,
            };

            match outcome {
                Ok(candidates) => {
                    writer.complete().await;
                    info!(
                        session_id = %session_id,
                        candidates = candidates.len(),
                        "Background scan task completed"
                    );
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Background scan task failed");
                    writer.fail(&failure_message(&e)).await;
                }
            }
        });

        Ok(ScanHandle {
            session_id,
            generation,
            task,
        })
    }

    /// Run a validated playlist job on its own task and wait for the result
    ///
    /// The job keeps running if the caller goes away; its outcome is still
    /// recorded through `writer`.
    pub async fn run_playlist(&self, job: PlaylistJob, writer: PlaylistWriter) -> Result<PlaylistResult> {
        let results = self.store.results().await;
        let materializer = PlaylistMaterializer::new(self.service.clone());

        let task = tokio::spawn(async move {
            match materializer.create_playlist(job, &results, &writer).await {
                Ok(result) => result,
                Err(e) => {
                    let result = PlaylistResult {
                        status: PlaylistStatus::Failed,
                        playlist_id: None,
                        playlist_url: None,
                        tracks_added: 0,
                        albums: Vec::new(),
                        error: Some(e.to_string()),
                    };
                    writer.finish(&result).await;
                    result
                }
            }
        });

        task.await
            .map_err(|e| Error::Internal(format!("playlist task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_scan_url_accepts_http_and_https() {
        assert!(validate_scan_url("https://example.com/best-of-2024").is_ok());
        assert!(validate_scan_url("  http://example.com ").is_ok());
    }

    #[test]
    fn test_validate_scan_url_rejects_malformed() {
        for bad in ["", "not a url", "ftp://example.com/file", "file:///etc/passwd", "mailto:a@b.c"] {
            let err = validate_scan_url(bad).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_failure_message_unwraps_extraction() {
        let err = Error::Extraction("Could not load page".to_string());
        assert_eq!(failure_message(&err), "Could not load page");
    }
}
