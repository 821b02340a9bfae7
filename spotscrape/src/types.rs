//! Core types and capability traits
//!
//! The scan pipeline talks to the outside world only through these traits:
//! - [`Extractor`]: turns a page URL into raw album candidates
//! - [`PageFetcher`]: fetches page HTML
//! - [`ContentAnalyzer`]: extracts `Artist - Album` mentions from text
//! - [`PlaylistService`]: album lookup and playlist creation
//!
//! Adapters live in `services::*`; tests substitute in-memory fakes.

use crate::models::{RawCandidate, ScanMethod, TrackPolicy};
use serde::{Deserialize, Serialize};
use spotscrape_common::events::LogLevel;
use spotscrape_common::Result;

/// Playlist identifier issued by the playlist service
pub type PlaylistId = String;

/// Album as described by the playlist service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub id: String,
    pub name: String,
    /// Listed artists, primary artist first
    pub artists: Vec<String>,
    pub popularity: Option<u8>,
    pub image_urls: Vec<String>,
    pub external_url: Option<String>,
}

impl AlbumMetadata {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    /// Candidate for this album, attributed to `source_url`
    pub fn to_candidate(&self, source_url: &str) -> RawCandidate {
        let mut candidate = RawCandidate::new(self.primary_artist(), &self.name, source_url)
            .with_external_id(&self.id)
            .with_images(self.image_urls.clone());
        if let Some(popularity) = self.popularity {
            candidate = candidate.with_popularity(popularity as u32);
        }
        let link = self
            .external_url
            .clone()
            .unwrap_or_else(|| format!("https://open.spotify.com/album/{}", self.id));
        candidate.with_external_link(link)
    }
}

/// Track on an album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: String,
    pub name: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub popularity: Option<u8>,
}

impl TrackRef {
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

/// `Artist - Album` pair reported by a content analyzer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumMention {
    pub artist: String,
    pub album: String,
}

/// Playlist service capability (Spotify Web API in production)
#[async_trait::async_trait]
pub trait PlaylistService: Send + Sync {
    /// Look up an album by service id; `Ok(None)` when it does not exist
    async fn get_album(&self, album_id: &str) -> Result<Option<AlbumMetadata>>;

    /// Best match for an artist/title pair
    async fn search_album(&self, artist: &str, title: &str) -> Result<Option<AlbumMetadata>>;

    /// Tracks of an album in album order
    ///
    /// `policy` lets adapters skip work (e.g. popularity lookups) the policy
    /// does not need; it does not filter the returned tracks.
    async fn get_album_tracks(&self, album_id: &str, policy: TrackPolicy) -> Result<Vec<TrackRef>>;

    /// Create an empty playlist owned by the authenticated user
    async fn create_playlist(&self, name: &str, description: &str) -> Result<PlaylistId>;

    /// Append tracks to a playlist, preserving order
    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackRef]) -> Result<()>;
}

/// AI content analysis capability
#[async_trait::async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze_content(&self, text: &str) -> Result<Vec<AlbumMention>>;
}

/// Page retrieval capability
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page body as HTML text
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Receiver of extraction progress and candidates
#[async_trait::async_trait]
pub trait ScanSink: Send + Sync {
    /// Report progress (0-100) with a log line
    async fn progress(&self, percent: u8, message: &str);

    /// Append a log line without changing progress
    async fn log(&self, level: LogLevel, message: &str);

    /// Offer a candidate as soon as it is produced
    async fn candidate(&self, candidate: RawCandidate);
}

/// Extraction backend
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    fn method(&self) -> ScanMethod;

    /// Extract candidates from one page
    ///
    /// Every returned candidate has also been passed to `sink`. An `Err`
    /// is a session-level failure; per-item failures are logged to the sink.
    async fn extract(&self, url: &str, sink: &dyn ScanSink) -> Result<Vec<RawCandidate>>;
}
