//! Common error types for SpotScrape

use thiserror::Error;

/// Common result type for SpotScrape operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the SpotScrape crates
#[derive(Error, Debug)]
pub enum Error {
    /// Backend could not fetch or parse a page. Ends the scan in `error`.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A single candidate was dropped during normalization
    #[error("Candidate skipped: {0}")]
    NormalizationSkip(String),

    /// Call to an external service (Spotify, LLM provider, web page) failed
    #[error("{service} error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    ExternalService {
        service: String,
        status: Option<u16>,
        message: String,
    },

    /// Malformed request rejected before any work starts
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Outbound call exceeded its deadline
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an [`Error::ExternalService`] without an HTTP status
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExternalService {
            service: service.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::ExternalService`] carrying an HTTP status
    pub fn external_status(
        service: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Error::ExternalService {
            service: service.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether a retry of the same call could succeed.
    ///
    /// Transport failures, timeouts, throttling (429) and 5xx responses are
    /// transient. Other 4xx responses and local errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ExternalService { status: None, .. } => true,
            Error::ExternalService {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Error::Timeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_service_display_includes_status() {
        let err = Error::external_status("spotify", 503, "Service Unavailable");
        assert_eq!(err.to_string(), "spotify error (503): Service Unavailable");

        let err = Error::external("openai", "connection reset");
        assert_eq!(err.to_string(), "openai error: connection reset");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::external("spotify", "reset").is_transient());
        assert!(Error::external_status("spotify", 500, "boom").is_transient());
        assert!(Error::external_status("spotify", 429, "slow down").is_transient());
        assert!(Error::Timeout(100).is_transient());

        assert!(!Error::external_status("spotify", 404, "missing").is_transient());
        assert!(!Error::external_status("spotify", 401, "expired").is_transient());
        assert!(!Error::Validation("empty".into()).is_transient());
        assert!(!Error::Config("no key".into()).is_transient());
    }
}
