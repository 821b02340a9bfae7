//! POST /api/playlist

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{PlaylistJob, PlaylistResult, TrackPolicy};
use crate::AppState;

/// POST /api/playlist request
#[derive(Debug, Deserialize)]
pub struct PlaylistRequest {
    /// Albums to include, in order; the current selection when omitted
    #[serde(default)]
    pub selected_ids: Option<Vec<String>>,
    #[serde(default)]
    pub track_policy: TrackPolicy,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// POST /api/playlist
///
/// Runs the job to completion and returns its result. Album-level failures
/// are reported in the body; only malformed or conflicting requests fail
/// with an error status.
pub async fn create_playlist(
    State(state): State<AppState>,
    Json(request): Json<PlaylistRequest>,
) -> ApiResult<Json<PlaylistResult>> {
    let session = state.store.snapshot().await;
    let album_ids = match request.selected_ids {
        Some(ids) => ids,
        None => {
            state.selection.sync(&session).await;
            state
                .selection
                .state(session.results.as_slice())
                .await
                .selected_ids
        }
    };

    let job = PlaylistJob {
        target_album_ids: album_ids,
        track_policy: request.track_policy,
        name: request.name,
        description: request.description,
    }
    .validated()?;

    let writer = state.store.begin_playlist(&job.name).await?;
    tracing::info!(
        albums = job.target_album_ids.len(),
        playlist_name = %job.name,
        "Playlist requested"
    );

    let result = state.orchestrator.run_playlist(job, writer).await?;
    Ok(Json(result))
}

pub fn playlist_routes() -> Router<AppState> {
    Router::new().route("/api/playlist", post(create_playlist))
}
