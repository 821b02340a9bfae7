//! Playlist jobs and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spotscrape_common::{Error, Result};

pub const DEFAULT_PLAYLIST_NAME: &str = "SpotScrape Playlist";
pub const DEFAULT_PLAYLIST_DESCRIPTION: &str = "Created with SpotScrape";

/// Which tracks of each album go into the playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPolicy {
    #[default]
    AllTracks,
    MostPopularTrack,
    FirstTrack,
}

impl TrackPolicy {
    /// Whether per-track popularity must be fetched
    pub fn needs_popularity(&self) -> bool {
        matches!(self, TrackPolicy::MostPopularTrack)
    }
}

/// Request to materialize selected albums into a playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistJob {
    pub target_album_ids: Vec<String>,
    #[serde(default)]
    pub track_policy: TrackPolicy,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl PlaylistJob {
    pub fn new(target_album_ids: Vec<String>, track_policy: TrackPolicy) -> Self {
        Self {
            target_album_ids,
            track_policy,
            name: String::new(),
            description: String::new(),
        }
    }

    /// Validate and fill defaults for blank name/description
    ///
    /// Blank album ids are dropped; an empty selection is a validation error.
    pub fn validated(mut self) -> Result<Self> {
        self.target_album_ids = self
            .target_album_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if self.target_album_ids.is_empty() {
            return Err(Error::Validation("No albums selected".to_string()));
        }
        if self.name.trim().is_empty() {
            self.name = DEFAULT_PLAYLIST_NAME.to_string();
        }
        if self.description.trim().is_empty() {
            self.description = DEFAULT_PLAYLIST_DESCRIPTION.to_string();
        }
        Ok(self)
    }
}

/// Playlist job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistStatus {
    Running,
    Succeeded,
    FailedPartial,
    Failed,
}

impl PlaylistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistStatus::Running => "running",
            PlaylistStatus::Succeeded => "succeeded",
            PlaylistStatus::FailedPartial => "failed_partial",
            PlaylistStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlaylistStatus::Running)
    }
}

/// Per-album outcome: resolved track count or failure reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumOutcome {
    pub album_id: String,
    /// Tracks contributed by this album; `None` on failure
    pub resolved: Option<usize>,
    pub failure: Option<String>,
}

impl AlbumOutcome {
    pub fn resolved(album_id: impl Into<String>, tracks: usize) -> Self {
        Self {
            album_id: album_id.into(),
            resolved: Some(tracks),
            failure: None,
        }
    }

    pub fn failed(album_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            album_id: album_id.into(),
            resolved: None,
            failure: Some(reason.into()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Final outcome of a playlist job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistResult {
    pub status: PlaylistStatus,
    pub playlist_id: Option<String>,
    pub playlist_url: Option<String>,
    pub tracks_added: usize,
    pub albums: Vec<AlbumOutcome>,
    pub error: Option<String>,
}

/// Web URL for a Spotify playlist id
pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://open.spotify.com/playlist/{}", playlist_id)
}

/// Playlist job progress, tracked inside the scan session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistProgress {
    pub status: PlaylistStatus,
    pub percent: u8,
    pub name: String,
    pub result: Option<PlaylistResult>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PlaylistProgress {
    pub fn started(name: impl Into<String>) -> Self {
        Self {
            status: PlaylistStatus::Running,
            percent: 0,
            name: name.into(),
            result: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }
}
