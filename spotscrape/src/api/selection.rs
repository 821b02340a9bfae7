//! Selection endpoints
//!
//! Selection applies to the current view (see POST /api/results/view); ids
//! outside it are ignored.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub id: String,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub selected_ids: Vec<String>,
    pub selected_count: usize,
    /// Whether the request changed the selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

async fn selection_response(state: &AppState, changed: Option<bool>) -> SelectionResponse {
    let session = state.store.snapshot().await;
    let selection = state.selection.state(session.results.as_slice()).await;
    SelectionResponse {
        selected_count: selection.selected_ids.len(),
        selected_ids: selection.selected_ids,
        changed,
    }
}

/// GET /api/selection
pub async fn get_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    let session = state.store.snapshot().await;
    state.selection.sync(&session).await;
    Json(selection_response(&state, None).await)
}

/// POST /api/selection
pub async fn set_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> Json<SelectionResponse> {
    let session = state.store.snapshot().await;
    let view = state.selection.sync(&session).await;
    let changed = state
        .selection
        .set_selected(&request.id, request.selected, &view)
        .await;
    Json(selection_response(&state, Some(changed)).await)
}

/// POST /api/selection/all
///
/// Selects every album in the current view.
pub async fn select_all(State(state): State<AppState>) -> Json<SelectionResponse> {
    let session = state.store.snapshot().await;
    let view = state.selection.sync(&session).await;
    let count = state.selection.select_all(&view).await;
    tracing::debug!(selected = count, "Selected all albums in view");
    Json(selection_response(&state, Some(!view.is_empty())).await)
}

/// DELETE /api/selection
pub async fn clear_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    state.selection.clear().await;
    Json(selection_response(&state, Some(true)).await)
}

pub fn selection_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/selection",
            get(get_selection).post(set_selection).delete(clear_selection),
        )
        .route("/api/selection/all", post(select_all))
}
