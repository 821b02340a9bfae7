//! Playlist materialization
//!
//! Resolves each selected album to a service id, picks tracks per the job's
//! policy, then creates one playlist and adds every track in one call.
//! Per-album failures are collected and do not stop the run.

use crate::models::playlist::playlist_url;
use crate::models::{
    AlbumOutcome, AlbumRecord, PlaylistJob, PlaylistResult, PlaylistStatus, TrackPolicy,
};
use crate::services::session_store::PlaylistWriter;
use crate::types::{PlaylistService, TrackRef};
use spotscrape_common::events::LogLevel;
use spotscrape_common::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Pick tracks from an album's track list according to `policy`
///
/// - `all_tracks`: every track, album order
/// - `most_popular_track`: highest popularity, first returned wins ties
/// - `first_track`: track 1 on disc 1, else the first returned
pub fn select_tracks(tracks: Vec<TrackRef>, policy: TrackPolicy) -> Vec<TrackRef> {
    match policy {
        TrackPolicy::AllTracks => tracks,
        TrackPolicy::MostPopularTrack => {
            let mut best: Option<TrackRef> = None;
            for track in tracks {
                let better = match &best {
                    None => true,
                    Some(current) => {
                        track.popularity.unwrap_or(0) > current.popularity.unwrap_or(0)
                    }
                };
                if better {
                    best = Some(track);
                }
            }
            best.into_iter().collect()
        }
        TrackPolicy::FirstTrack => {
            let opener = tracks
                .iter()
                .position(|t| t.track_number == 1 && t.disc_number == 1)
                .unwrap_or(0);
            tracks.into_iter().nth(opener).into_iter().collect()
        }
    }
}

pub struct PlaylistMaterializer {
    service: Arc<dyn PlaylistService>,
}

impl PlaylistMaterializer {
    pub fn new(service: Arc<dyn PlaylistService>) -> Self {
        Self { service }
    }

    /// Service album id for `album_id`, or a failure reason
    async fn resolve_album_id(
        &self,
        album_id: &str,
        results: &[AlbumRecord],
    ) -> std::result::Result<String, String> {
        let Some(record) = results.iter().find(|r| r.id == album_id) else {
            return Ok(album_id.to_string());
        };
        if let Some(external_id) = &record.external_id {
            return Ok(external_id.clone());
        }
        match self.service.search_album(&record.artist, &record.title).await {
            Ok(Some(found)) => Ok(found.id),
            Ok(None) => Err(format!("Not found on Spotify: {}", record.display_name())),
            Err(e) => Err(format!("Search failed for {}: {}", record.display_name(), e)),
        }
    }

    /// Run `job` against the current `results`
    ///
    /// The job is validated first; a validation failure is returned as `Err`
    /// before any outbound call. Every other failure is reported inside the
    /// returned [`PlaylistResult`].
    pub async fn create_playlist(
        &self,
        job: PlaylistJob,
        results: &[AlbumRecord],
        progress: &PlaylistWriter,
    ) -> Result<PlaylistResult> {
        let job = job.validated()?;
        let total = job.target_album_ids.len();

        info!(albums = total, policy = ?job.track_policy, playlist_name = %job.name, "Materializing playlist");

        let mut outcomes = Vec::with_capacity(total);
        let mut tracks: Vec<TrackRef> = Vec::new();

        for (index, album_id) in job.target_album_ids.iter().enumerate() {
            let percent = ((index * 80) / total) as u8;
            progress
                .progress(percent, &format!("Processing album {}/{}", index + 1, total))
                .await;

            let service_id = match self.resolve_album_id(album_id, results).await {
                Ok(id) => id,
                Err(reason) => {
                    warn!(album_id = %album_id, reason = %reason, "Album not resolved");
                    progress.log(LogLevel::Warning, &reason).await;
                    outcomes.push(AlbumOutcome::failed(album_id, reason));
                    continue;
                }
            };

            match self.service.get_album_tracks(&service_id, job.track_policy).await {
                Ok(album_tracks) => {
                    let picked = select_tracks(album_tracks, job.track_policy);
                    if picked.is_empty() {
                        let reason = format!("No tracks found for album {}", service_id);
                        progress.log(LogLevel::Warning, &reason).await;
                        outcomes.push(AlbumOutcome::failed(album_id, reason));
                    } else {
                        outcomes.push(AlbumOutcome::resolved(album_id, picked.len()));
                        tracks.extend(picked);
                    }
                }
                Err(e) => {
                    let reason = format!("Failed to get tracks for album {}: {}", service_id, e);
                    warn!(album_id = %album_id, error = %e, "Track lookup failed");
                    progress.log(LogLevel::Warning, &reason).await;
                    outcomes.push(AlbumOutcome::failed(album_id, reason));
                }
            }
        }

        let resolved = outcomes.iter().filter(|o| o.is_resolved()).count();
        if resolved == 0 {
            let result = PlaylistResult {
                status: PlaylistStatus::Failed,
                playlist_id: None,
                playlist_url: None,
                tracks_added: 0,
                albums: outcomes,
                error: Some("No tracks could be resolved from the selected albums".to_string()),
            };
            progress.finish(&result).await;
            return Ok(result);
        }

        progress
            .progress(85, &format!("Creating playlist with {} tracks", tracks.len()))
            .await;

        let playlist_id = match self.service.create_playlist(&job.name, &job.description).await {
            Ok(id) => id,
            Err(e) => {
                let result = PlaylistResult {
                    status: PlaylistStatus::Failed,
                    playlist_id: None,
                    playlist_url: None,
                    tracks_added: 0,
                    albums: outcomes,
                    error: Some(format!("Failed to create playlist: {}", e)),
                };
                progress.finish(&result).await;
                return Ok(result);
            }
        };
        let url = playlist_url(&playlist_id);

        progress.progress(90, "Adding tracks to playlist").await;

        let album_status = if resolved == total {
            PlaylistStatus::Succeeded
        } else {
            PlaylistStatus::FailedPartial
        };

        let result = match self.service.add_tracks(&playlist_id, &tracks).await {
            Ok(()) => PlaylistResult {
                status: album_status,
                playlist_id: Some(playlist_id),
                playlist_url: Some(url),
                tracks_added: tracks.len(),
                albums: outcomes,
                error: None,
            },
            Err(e) => PlaylistResult {
                status: PlaylistStatus::Failed,
                playlist_id: Some(playlist_id),
                playlist_url: Some(url),
                tracks_added: 0,
                albums: outcomes,
                error: Some(format!("Playlist created but adding tracks failed: {}", e)),
            },
        };
        progress.finish(&result).await;
        Ok(result)
    }
}
