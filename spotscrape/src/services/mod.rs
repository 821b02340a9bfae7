//! Service layer for SpotScrape
//!
//! Core pipeline (normalizer, session store, view, selection, materializer)
//! plus the adapters behind the capability traits in [`crate::types`].

pub mod ai_extractor;
pub mod filter_view;
pub mod html_text;
pub mod link_extractor;
pub mod normalizer;
pub mod openai_client;
pub mod page_fetcher;
pub mod playlist_materializer;
pub mod progress_poller;
pub mod retrying_service;
pub mod scan_orchestrator;
pub mod selection;
pub mod session_store;
pub mod spotify_client;

pub use ai_extractor::AiExtractor;
pub use link_extractor::LinkExtractor;
pub use openai_client::{LlmError, OpenAiAnalyzer};
pub use page_fetcher::HttpPageFetcher;
pub use playlist_materializer::PlaylistMaterializer;
pub use progress_poller::{ProgressPoller, WatchOutput};
pub use retrying_service::{RetryingContentAnalyzer, RetryingPageFetcher, RetryingPlaylistService};
pub use scan_orchestrator::{ScanHandle, ScanOrchestrator};
pub use selection::{SelectionManager, SelectionState};
pub use session_store::{PlaylistBusy, PlaylistWriter, ProgressReport, SessionStore, SessionWriter};
pub use spotify_client::{SpotifyClient, SpotifyError};
