//! AI-assisted extraction backend
//!
//! Cleans the page text, splits it into chunks, asks the content analyzer
//! for `Artist - Album` pairs, then resolves each pair with an album search.
//!
//! Progress bands: fetch 5-10%, cleaning 20%, chunk analysis 40-70%,
//! resolution 70-98%.

use crate::models::{RawCandidate, ScanMethod};
use crate::services::html_text::{chunk_text, clean_html};
use crate::types::{AlbumMention, ContentAnalyzer, Extractor, PageFetcher, PlaylistService, ScanSink};
use futures::stream::{FuturesUnordered, StreamExt};
use spotscrape_common::events::LogLevel;
use spotscrape_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Words marking non-album releases
const EXCLUDED_WORDS: &[&str] = &["ep", "single", "remix", "feat"];

/// True for lines naming an EP, single, remix or featured track
pub fn is_excluded_release(line: &str) -> bool {
    line.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| EXCLUDED_WORDS.contains(&word))
}

/// Parse analyzer output: one `Artist - Album` pair per line
///
/// Surrounding quotes and list markers are stripped; lines without a
/// separator, with an empty side, or naming excluded releases are dropped.
pub fn parse_mentions(response: &str) -> Vec<AlbumMention> {
    response
        .lines()
        .filter_map(|line| {
            let line = line
                .trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'')
                .trim();
            if line.is_empty() || is_excluded_release(line) {
                return None;
            }
            let (artist, album) = line.split_once(" - ")?;
            let artist = artist.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
            let album = album.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
            if artist.is_empty() || album.is_empty() {
                return None;
            }
            Some(AlbumMention {
                artist: artist.to_string(),
                album: album.to_string(),
            })
        })
        .collect()
}

/// Order-preserving de-duplication, case-insensitive
pub fn dedupe_mentions(mentions: impl IntoIterator<Item = AlbumMention>) -> Vec<AlbumMention> {
    let mut seen = HashSet::new();
    mentions
        .into_iter()
        .filter(|m| seen.insert((m.artist.to_lowercase(), m.album.to_lowercase())))
        .collect()
}

pub struct AiExtractor {
    fetcher: Arc<dyn PageFetcher>,
    analyzer: Arc<dyn ContentAnalyzer>,
    service: Arc<dyn PlaylistService>,
    max_chunk_chars: usize,
}

impl AiExtractor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        analyzer: Arc<dyn ContentAnalyzer>,
        service: Arc<dyn PlaylistService>,
        max_chunk_chars: usize,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            service,
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    /// Analyze every chunk; results come back in chunk order
    async fn analyze_chunks(&self, chunks: Vec<String>, sink: &dyn ScanSink) -> Result<Vec<AlbumMention>> {
        let total = chunks.len();
        let mut analyses: FuturesUnordered<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let analyzer = self.analyzer.clone();
                async move { (index, analyzer.analyze_content(&chunk).await) }
            })
            .collect();

        let mut per_chunk: Vec<Option<Vec<AlbumMention>>> = vec![None; total];
        let mut done = 0usize;
        let mut failed = 0usize;
        while let Some((index, outcome)) = analyses.next().await {
            done += 1;
            match outcome {
                Ok(mentions) => {
                    let kept: Vec<AlbumMention> = mentions
                        .into_iter()
                        .filter(|m| !is_excluded_release(&format!("{} - {}", m.artist, m.album)))
                        .collect();
                    debug!(chunk = index + 1, mentions = kept.len(), "Chunk analyzed");
                    per_chunk[index] = Some(kept);
                }
                Err(e) => {
                    failed += 1;
                    warn!(chunk = index + 1, error = %e, "Chunk analysis failed");
                    sink.log(
                        LogLevel::Warning,
                        &format!("Error analyzing chunk {}/{}: {}", index + 1, total, e),
                    )
                    .await;
                }
            }
            let percent = 40 + (done * 30 / total) as u8;
            sink.progress(percent, &format!("Analyzed chunk {}/{}", done, total))
                .await;
        }

        if failed == total {
            return Err(Error::Extraction(
                "Content analysis failed for every part of the page".to_string(),
            ));
        }
        Ok(dedupe_mentions(per_chunk.into_iter().flatten().flatten()))
    }

    /// Fetch `url`, analyze its text and resolve each mentioned album
    pub async fn extract_via_ai(&self, url: &str, sink: &dyn ScanSink) -> Result<Vec<RawCandidate>> {
        sink.progress(5, &format!("Fetching page {}", url)).await;
        let html = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| Error::Extraction(format!("Could not load page {}: {}", url, e)))?;
        sink.progress(10, "Page loaded").await;

        sink.progress(20, "Cleaning page content").await;
        let text = clean_html(&html);
        if text.is_empty() {
            return Err(Error::Extraction("No readable text found on page".to_string()));
        }
        let chunks = chunk_text(&text, self.max_chunk_chars);
        info!(url, chars = text.len(), chunks = chunks.len(), "Page text prepared for analysis");
        sink.progress(40, &format!("Analyzing content in {} chunks", chunks.len()))
            .await;

        let mentions = self.analyze_chunks(chunks, sink).await?;
        if mentions.is_empty() {
            sink.log(LogLevel::Warning, "No albums mentioned on page").await;
            return Ok(Vec::new());
        }
        sink.progress(70, &format!("Found {} albums, searching Spotify", mentions.len()))
            .await;

        let total = mentions.len();
        let mut searches: FuturesUnordered<_> = mentions
            .into_iter()
            .map(|mention| {
                let service = self.service.clone();
                async move {
                    let outcome = service.search_album(&mention.artist, &mention.album).await;
                    (mention, outcome)
                }
            })
            .collect();

        let mut candidates = Vec::new();
        let mut done = 0usize;
        while let Some((mention, outcome)) = searches.next().await {
            done += 1;
            let candidate = match outcome {
                Ok(Some(album)) => album.to_candidate(url),
                Ok(None) => {
                    sink.log(
                        LogLevel::Warning,
                        &format!("Not found on Spotify: {} - {}", mention.artist, mention.album),
                    )
                    .await;
                    RawCandidate::new(&mention.artist, &mention.album, url)
                }
                Err(e) => {
                    warn!(artist = %mention.artist, album = %mention.album, error = %e, "Album search failed");
                    sink.log(
                        LogLevel::Warning,
                        &format!(
                            "Search failed for {} - {}: {}",
                            mention.artist, mention.album, e
                        ),
                    )
                    .await;
                    RawCandidate::new(&mention.artist, &mention.album, url)
                }
            };
            sink.candidate(candidate.clone()).await;
            candidates.push(candidate);

            let percent = 70 + (done * 28 / total) as u8;
            sink.progress(percent, "").await;
        }

        Ok(candidates)
    }
}

#[async_trait::async_trait]
impl Extractor for AiExtractor {
    fn method(&self) -> ScanMethod {
        ScanMethod::Ai
    }

    async fn extract(&self, url: &str, sink: &dyn ScanSink) -> Result<Vec<RawCandidate>> {
        self.extract_via_ai(url, sink).await
    }
}
