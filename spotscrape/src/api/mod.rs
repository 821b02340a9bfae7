//! HTTP API handlers for SpotScrape
//!
//! JSON endpoints under `/api` plus `/health`. Progress is available both
//! by polling and as an SSE stream.

pub mod health;
pub mod playlist;
pub mod progress;
pub mod results;
pub mod scan;
pub mod selection;

pub use health::health_routes;
pub use playlist::playlist_routes;
pub use progress::progress_routes;
pub use results::results_routes;
pub use scan::scan_routes;
pub use selection::selection_routes;
