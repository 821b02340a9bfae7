//! Retry and queue decorators for outbound capabilities
//!
//! Each call takes a [`RequestQueue`] slot per attempt and runs under the
//! [`RetryPolicy`]. The attempt deadline starts once the slot is held, and
//! slots are released while backing off.

use crate::models::TrackPolicy;
use crate::types::{AlbumMention, AlbumMetadata, ContentAnalyzer, PageFetcher, PlaylistId, PlaylistService, TrackRef};
use crate::utils::{execute_queued, RequestQueue, RetryPolicy};
use spotscrape_common::Result;
use std::sync::Arc;

pub struct RetryingPlaylistService {
    inner: Arc<dyn PlaylistService>,
    queue: RequestQueue,
    policy: RetryPolicy,
}

impl RetryingPlaylistService {
    pub fn new(inner: Arc<dyn PlaylistService>, queue: RequestQueue, policy: RetryPolicy) -> Self {
        Self { inner, queue, policy }
    }
}

#[async_trait::async_trait]
impl PlaylistService for RetryingPlaylistService {
    async fn get_album(&self, album_id: &str) -> Result<Option<AlbumMetadata>> {
        Ok(execute_queued("spotify get_album", &self.policy, &self.queue, || {
            self.inner.get_album(album_id)
        })
        .await?)
    }

    async fn search_album(&self, artist: &str, title: &str) -> Result<Option<AlbumMetadata>> {
        Ok(execute_queued("spotify search_album", &self.policy, &self.queue, || {
            self.inner.search_album(artist, title)
        })
        .await?)
    }

    async fn get_album_tracks(&self, album_id: &str, policy: TrackPolicy) -> Result<Vec<TrackRef>> {
        Ok(execute_queued("spotify get_album_tracks", &self.policy, &self.queue, || {
            self.inner.get_album_tracks(album_id, policy)
        })
        .await?)
    }

    async fn create_playlist(&self, name: &str, description: &str) -> Result<PlaylistId> {
        Ok(execute_queued("spotify create_playlist", &self.policy, &self.queue, || {
            self.inner.create_playlist(name, description)
        })
        .await?)
    }

    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackRef]) -> Result<()> {
        Ok(execute_queued("spotify add_tracks", &self.policy, &self.queue, || {
            self.inner.add_tracks(playlist_id, tracks)
        })
        .await?)
    }
}

pub struct RetryingContentAnalyzer {
    inner: Arc<dyn ContentAnalyzer>,
    queue: RequestQueue,
    policy: RetryPolicy,
}

impl RetryingContentAnalyzer {
    pub fn new(inner: Arc<dyn ContentAnalyzer>, queue: RequestQueue, policy: RetryPolicy) -> Self {
        Self { inner, queue, policy }
    }
}

#[async_trait::async_trait]
impl ContentAnalyzer for RetryingContentAnalyzer {
    async fn analyze_content(&self, text: &str) -> Result<Vec<AlbumMention>> {
        Ok(execute_queued("analyzer analyze_content", &self.policy, &self.queue, || {
            self.inner.analyze_content(text)
        })
        .await?)
    }
}

pub struct RetryingPageFetcher {
    inner: Arc<dyn PageFetcher>,
    queue: RequestQueue,
    policy: RetryPolicy,
}

impl RetryingPageFetcher {
    pub fn new(inner: Arc<dyn PageFetcher>, queue: RequestQueue, policy: RetryPolicy) -> Self {
        Self { inner, queue, policy }
    }
}

#[async_trait::async_trait]
impl PageFetcher for RetryingPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        Ok(execute_queued("page fetch", &self.policy, &self.queue, || self.inner.fetch(url)).await?)
    }
}
