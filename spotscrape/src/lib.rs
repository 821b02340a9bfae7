//! SpotScrape library interface
//!
//! Exposes the service pipeline and the router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use spotscrape_common::config::SpotScrapeConfig;
use spotscrape_common::events::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{
    HttpPageFetcher, OpenAiAnalyzer, RetryingContentAnalyzer, RetryingPageFetcher,
    RetryingPlaylistService, ScanOrchestrator, SelectionManager, SessionStore, SpotifyClient,
};
use crate::types::{ContentAnalyzer, PageFetcher, PlaylistService};
use crate::utils::{RequestQueue, RetryPolicy};

/// Broadcast capacity of the event bus
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Outbound capabilities, before retry and queue decoration
#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn PageFetcher>,
    pub service: Arc<dyn PlaylistService>,
    pub analyzer: Option<Arc<dyn ContentAnalyzer>>,
}

impl Capabilities {
    /// Production adapters for `config`
    pub fn from_config(config: &SpotScrapeConfig) -> spotscrape_common::Result<Self> {
        let timeout = Duration::from_millis(config.retry.timeout_ms);

        let credentials = config::resolve_spotify_credentials(&config.spotify);
        let spotify = SpotifyClient::new(credentials, config.spotify.market.clone(), timeout)?;

        let analyzer = config::resolve_openai_api_key(&config.openai).map(|key| {
            Arc::new(OpenAiAnalyzer::new(&config.openai, key, timeout)) as Arc<dyn ContentAnalyzer>
        });

        Ok(Self {
            fetcher: Arc::new(HttpPageFetcher::new(timeout)?),
            service: Arc::new(spotify),
            analyzer,
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SessionStore,
    pub selection: SelectionManager,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub config: Arc<SpotScrapeConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire `capabilities` behind one shared request queue and retry policy
    pub fn new(config: SpotScrapeConfig, capabilities: Capabilities) -> Self {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let store = SessionStore::new(event_bus.clone(), config.session.message_log_limit);
        let selection = SelectionManager::new(event_bus.clone());

        let queue = RequestQueue::new(config.retry.max_concurrency);
        let policy = RetryPolicy::from_config(&config.retry);

        let fetcher: Arc<dyn PageFetcher> = Arc::new(RetryingPageFetcher::new(
            capabilities.fetcher,
            queue.clone(),
            policy.clone(),
        ));
        let service: Arc<dyn PlaylistService> = Arc::new(RetryingPlaylistService::new(
            capabilities.service,
            queue.clone(),
            policy.clone(),
        ));
        let analyzer = capabilities.analyzer.map(|inner| {
            Arc::new(RetryingContentAnalyzer::new(inner, queue.clone(), policy.clone()))
                as Arc<dyn ContentAnalyzer>
        });

        let orchestrator = ScanOrchestrator::new(
            store.clone(),
            fetcher,
            service,
            analyzer,
            config.openai.max_chunk_chars,
        );

        Self {
            store,
            selection,
            event_bus,
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::scan_routes())
        .merge(api::progress_routes())
        .merge(api::results_routes())
        .merge(api::selection_routes())
        .merge(api::playlist_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
