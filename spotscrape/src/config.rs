//! Credential resolution for the SpotScrape service
//!
//! Credentials resolve with ENV → TOML priority. A value present in both
//! places is reported with a warning and the environment wins. Missing
//! credentials are not an error here; they surface when a request needs them.

use spotscrape_common::config::{OpenAiConfig, SpotifyConfig};
use tracing::{debug, info, warn};

pub const SPOTIFY_CLIENT_ID_ENV: &str = "SPOTIPY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "SPOTIPY_CLIENT_SECRET";
pub const SPOTIFY_REFRESH_TOKEN_ENV: &str = "SPOTIFY_REFRESH_TOKEN";
pub const SPOTIFY_ACCESS_TOKEN_ENV: &str = "SPOTIFY_ACCESS_TOKEN";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Spotify credentials after resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Used as-is when no refresh grant is possible
    pub access_token: Option<String>,
}

impl SpotifyCredentials {
    /// Whether a refresh-token grant can be made
    pub fn can_refresh(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }

    pub fn is_configured(&self) -> bool {
        self.can_refresh() || self.access_token.is_some()
    }
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one secret from `env_var`, falling back to `toml_value`
pub fn resolve_secret(name: &str, env_var: &str, toml_value: Option<&str>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in multiple sources: environment, TOML. Using environment (highest priority).",
            name
        );
    }

    if let Some(value) = env_value {
        debug!("{} loaded from environment variable {}", name, env_var);
        return Some(value.trim().to_string());
    }
    if let Some(value) = toml_value {
        debug!("{} loaded from TOML config", name);
        return Some(value.trim().to_string());
    }
    None
}

pub fn resolve_spotify_credentials(config: &SpotifyConfig) -> SpotifyCredentials {
    let credentials = SpotifyCredentials {
        client_id: resolve_secret(
            "Spotify client id",
            SPOTIFY_CLIENT_ID_ENV,
            config.client_id.as_deref(),
        ),
        client_secret: resolve_secret(
            "Spotify client secret",
            SPOTIFY_CLIENT_SECRET_ENV,
            config.client_secret.as_deref(),
        ),
        refresh_token: resolve_secret(
            "Spotify refresh token",
            SPOTIFY_REFRESH_TOKEN_ENV,
            config.refresh_token.as_deref(),
        ),
        access_token: resolve_secret(
            "Spotify access token",
            SPOTIFY_ACCESS_TOKEN_ENV,
            config.access_token.as_deref(),
        ),
    };

    if credentials.can_refresh() {
        info!("Spotify credentials configured (refresh token grant)");
    } else if credentials.access_token.is_some() {
        info!("Spotify credentials configured (static access token)");
    } else {
        warn!(
            "Spotify credentials not configured; album lookups and playlist creation will fail until {}, {} and {} are set",
            SPOTIFY_CLIENT_ID_ENV, SPOTIFY_CLIENT_SECRET_ENV, SPOTIFY_REFRESH_TOKEN_ENV
        );
    }
    credentials
}

pub fn resolve_openai_api_key(config: &OpenAiConfig) -> Option<String> {
    let key = resolve_secret("OpenAI API key", OPENAI_API_KEY_ENV, config.api_key.as_deref());
    if key.is_none() {
        warn!("OpenAI API key not configured; AI scans are unavailable until {} is set", OPENAI_API_KEY_ENV);
    }
    key
}
