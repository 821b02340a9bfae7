//! Result listing and filtered views
//!
//! - GET /api/results
//! - POST /api/results/view

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::models::{AlbumRecord, FilterSortSpec, ScanStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub status: ScanStatus,
    pub albums: Vec<AlbumRecord>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub status: ScanStatus,
    pub albums: Vec<AlbumRecord>,
    pub selected_ids: Vec<String>,
}

/// GET /api/results
///
/// Every album in insertion order, unfiltered.
pub async fn get_results(State(state): State<AppState>) -> Json<ResultsResponse> {
    let session = state.store.snapshot().await;
    Json(ResultsResponse {
        status: session.status,
        albums: session.results.as_slice().to_vec(),
    })
}

/// POST /api/results/view
///
/// Makes `spec` the current view and returns it with the reconciled selection.
pub async fn apply_view(
    State(state): State<AppState>,
    Json(spec): Json<FilterSortSpec>,
) -> Json<ViewResponse> {
    tracing::debug!(?spec, "Applying result view");
    state.selection.set_view(spec).await;

    let session = state.store.snapshot().await;
    let albums = state.selection.sync(&session).await;
    let selection = state.selection.state(session.results.as_slice()).await;

    Json(ViewResponse {
        status: session.status,
        albums,
        selected_ids: selection.selected_ids,
    })
}

pub fn results_routes() -> Router<AppState> {
    Router::new()
        .route("/api/results", get(get_results))
        .route("/api/results/view", post(apply_view))
}
