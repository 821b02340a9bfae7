//! Progress polling and SSE stream
//!
//! - GET /api/progress?tail=N&since=SEQ
//! - GET /api/progress/stream

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use spotscrape_common::sse::{scrape_event_sse_stream, HEARTBEAT_INTERVAL};
use std::convert::Infallible;

use crate::services::ProgressReport;
use crate::AppState;

/// Log lines returned when neither `tail` nor `since` is given
pub const DEFAULT_LOG_TAIL: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    /// Keep the last N matching log entries
    pub tail: Option<usize>,
    /// Only log entries with `seq > since`
    pub since: Option<u64>,
}

/// GET /api/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<ProgressReport> {
    let tail = match (query.tail, query.since) {
        (None, None) => Some(DEFAULT_LOG_TAIL),
        (tail, _) => tail,
    };
    Json(state.store.progress_report(tail, query.since).await)
}

/// GET /api/progress/stream
///
/// Pushes every session store event, with a heartbeat comment while idle.
pub async fn progress_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    scrape_event_sse_stream("spotscrape", state.event_bus.subscribe(), HEARTBEAT_INTERVAL)
}

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/api/progress", get(get_progress))
        .route("/api/progress/stream", get(progress_stream))
}
