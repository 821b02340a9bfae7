//! POST /api/scan

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use spotscrape_common::Error;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ScanMethod;
use crate::AppState;

/// POST /api/scan request
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub url: String,
    /// `links` (default) or `ai`; `url` and `gpt` are accepted aliases
    #[serde(default)]
    pub method: Option<String>,
}

/// POST /api/scan response
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub status: String,
    pub session_id: Uuid,
    pub generation: u64,
}

/// POST /api/scan
///
/// Starts a scan in the background, replacing any scan in progress.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let method = match request.method.as_deref().map(str::trim) {
        None | Some("") => ScanMethod::Links,
        Some(raw) => raw.parse::<ScanMethod>().map_err(ApiError::BadRequest)?,
    };

    let handle = state
        .orchestrator
        .start_scan(&request.url, method)
        .await
        .map_err(|e| match e {
            // Missing analyzer credentials are a property of the request's method
            Error::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        })?;

    tracing::info!(
        session_id = %handle.session_id,
        generation = handle.generation,
        method = method.as_str(),
        "Scan requested"
    );

    Ok(Json(ScanResponse {
        status: "started".to_string(),
        session_id: handle.session_id,
        generation: handle.generation,
    }))
}

pub fn scan_routes() -> Router<AppState> {
    Router::new().route("/api/scan", post(start_scan))
}
