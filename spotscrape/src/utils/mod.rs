//! Utility modules for the SpotScrape service

pub mod request_queue;
pub mod retry;

pub use request_queue::RequestQueue;
pub use retry::{execute, execute_queued, RetryError, RetryPolicy, Retryable};
