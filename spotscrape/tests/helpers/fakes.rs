//! In-memory capability fakes

use spotscrape::models::TrackPolicy;
use spotscrape::services::ai_extractor::parse_mentions;
use spotscrape::types::{
    AlbumMention, AlbumMetadata, ContentAnalyzer, PageFetcher, PlaylistId, PlaylistService, TrackRef,
};
use spotscrape_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn album(id: &str, artist: &str, name: &str, popularity: u8) -> AlbumMetadata {
    AlbumMetadata {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![artist.to_string()],
        popularity: Some(popularity),
        image_urls: vec![format!("https://i.scdn.co/image/{}", id)],
        external_url: Some(format!("https://open.spotify.com/album/{}", id)),
    }
}

/// `count` tracks for `album_id`, numbered from 1 on disc 1
pub fn numbered_tracks(album_id: &str, count: u32) -> Vec<TrackRef> {
    (1..=count)
        .map(|n| TrackRef {
            id: format!("{}-t{}", album_id, n),
            name: format!("Track {}", n),
            track_number: n,
            disc_number: 1,
            popularity: Some((n * 10).min(100) as u8),
        })
        .collect()
}

/// Pages by URL; unknown URLs answer 404
#[derive(Default)]
pub struct FakePageFetcher {
    pages: HashMap<String, String>,
    /// URLs whose fetch never completes
    hanging: HashSet<String>,
    pub fetches: AtomicUsize,
}

impl FakePageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn with_hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }
}

#[async_trait::async_trait]
impl PageFetcher for FakePageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::external_status("page", 404, format!("no page at {}", url)))
    }
}

/// Replies with the same analyzer output for every chunk
pub struct FakeAnalyzer {
    reply: std::result::Result<String, u16>,
    pub calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with HTTP `status`
    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ContentAnalyzer for FakeAnalyzer {
    async fn analyze_content(&self, _text: &str) -> Result<Vec<AlbumMention>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(text) => Ok(parse_mentions(text)),
            Err(status) => Err(Error::external_status("openai", *status, "analysis rejected")),
        }
    }
}

/// Playlist service over in-memory albums
#[derive(Default)]
pub struct FakePlaylistService {
    albums: HashMap<String, AlbumMetadata>,
    /// Lowercased `(artist, title)` → album
    search: HashMap<(String, String), AlbumMetadata>,
    tracks: HashMap<String, Vec<TrackRef>>,
    failing_tracks: HashSet<String>,
    fail_add_tracks: bool,
    lookup_delay: Option<Duration>,

    pub created: Mutex<Vec<(String, String)>>,
    pub added: Mutex<Vec<(String, Vec<TrackRef>)>>,
    pub track_requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl FakePlaylistService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_album(mut self, metadata: AlbumMetadata) -> Self {
        self.albums.insert(metadata.id.clone(), metadata);
        self
    }

    pub fn with_search(mut self, artist: &str, title: &str, metadata: AlbumMetadata) -> Self {
        self.search
            .insert((artist.to_lowercase(), title.to_lowercase()), metadata);
        self
    }

    pub fn with_tracks(mut self, album_id: &str, tracks: Vec<TrackRef>) -> Self {
        self.tracks.insert(album_id.to_string(), tracks);
        self
    }

    pub fn with_failing_tracks(mut self, album_id: &str) -> Self {
        self.failing_tracks.insert(album_id.to_string());
        self
    }

    pub fn with_failing_add_tracks(mut self) -> Self {
        self.fail_add_tracks = true;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn added_track_ids(&self) -> Vec<String> {
        self.added
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, tracks)| tracks.iter().map(|t| t.id.clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl PlaylistService for FakePlaylistService {
    async fn get_album(&self, album_id: &str) -> Result<Option<AlbumMetadata>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.albums.get(album_id).cloned())
    }

    async fn search_album(&self, artist: &str, title: &str) -> Result<Option<AlbumMetadata>> {
        Ok(self
            .search
            .get(&(artist.to_lowercase(), title.to_lowercase()))
            .cloned())
    }

    async fn get_album_tracks(&self, album_id: &str, _policy: TrackPolicy) -> Result<Vec<TrackRef>> {
        self.track_requests.lock().unwrap().push(album_id.to_string());
        if self.failing_tracks.contains(album_id) {
            return Err(Error::external_status("spotify", 404, format!("album {} not found", album_id)));
        }
        Ok(self.tracks.get(album_id).cloned().unwrap_or_default())
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<PlaylistId> {
        let mut created = self.created.lock().unwrap();
        created.push((name.to_string(), description.to_string()));
        Ok(format!("playlist{}", created.len()))
    }

    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackRef]) -> Result<()> {
        if self.fail_add_tracks {
            return Err(Error::external_status("spotify", 403, "not allowed to modify playlist"));
        }
        self.added
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), tracks.to_vec()));
        Ok(())
    }
}
