//! # SpotScrape Common Library
//!
//! Shared code for the SpotScrape service and its command-line tools:
//! - Error type shared by every layer
//! - Event types (ScrapeEvent enum) and the EventBus
//! - Configuration loading (TOML + environment)
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
