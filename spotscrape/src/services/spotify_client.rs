//! Spotify Web API client
//!
//! Implements [`PlaylistService`] over the public Web API:
//! - refresh-token grant with a cached access token
//! - 10 requests/second client-side rate limit (`governor`)
//! - `add_tracks` sent in batches of 100 URIs
//! - track popularity fetched via `/v1/tracks?ids=` in batches of 50

use crate::config::SpotifyCredentials;
use crate::models::TrackPolicy;
use crate::types::{AlbumMetadata, PlaylistId, PlaylistService, TrackRef};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use spotscrape_common::Error;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const REQUESTS_PER_SECOND: u32 = 10;
const ADD_TRACKS_BATCH: usize = 100;
const TRACK_LOOKUP_BATCH: usize = 50;
const SEARCH_LIMIT: u32 = 5;
/// Minimum similarity for a search hit to count as a match
const MIN_MATCH_SCORE: f64 = 0.5;
/// Refresh tokens this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Spotify client errors
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 401 for a cached token that can be refreshed
    #[error("{0} rejected the access token")]
    TokenRejected(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<SpotifyError> for Error {
    fn from(err: SpotifyError) -> Self {
        const SERVICE: &str = "spotify";
        match err {
            SpotifyError::Network(msg) => Error::external(SERVICE, msg),
            SpotifyError::Timeout => Error::external(SERVICE, "request timeout"),
            SpotifyError::NotFound(what) => Error::external_status(SERVICE, 404, format!("not found: {}", what)),
            SpotifyError::RateLimited => Error::external_status(SERVICE, 429, "rate limit exceeded"),
            SpotifyError::Auth(msg) => Error::external_status(SERVICE, 401, msg),
            // No status: a retry runs with a freshly refreshed token
            SpotifyError::TokenRejected(what) => {
                Error::external(SERVICE, format!("{} rejected the access token", what))
            }
            SpotifyError::Api(status, msg) => Error::external_status(SERVICE, status, msg),
            SpotifyError::Parse(msg) => Error::external(SERVICE, msg),
        }
    }
}

// Web API response types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    popularity: Option<u32>,
    #[serde(default)]
    images: Vec<ImageObject>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

impl From<AlbumObject> for AlbumMetadata {
    fn from(album: AlbumObject) -> Self {
        AlbumMetadata {
            id: album.id,
            name: album.name,
            artists: album.artists.into_iter().map(|a| a.name).collect(),
            popularity: album.popularity.map(|p| p.min(100) as u8),
            image_urls: album.images.into_iter().map(|i| i.url).collect(),
            external_url: album.external_urls.spotify,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: Paging<AlbumObject>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    /// Local files have no id
    id: Option<String>,
    name: String,
    track_number: u32,
    disc_number: u32,
    popularity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    tracks: Vec<Option<TrackObject>>,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Similarity between a search hit and the requested pair (0.0 - 1.0)
pub fn match_score(artist: &str, title: &str, candidate: &AlbumMetadata) -> f64 {
    let wanted_artist = artist.trim().to_lowercase();
    let wanted_title = title.trim().to_lowercase();
    let got_artist = candidate.primary_artist().to_lowercase();
    let got_title = candidate.name.to_lowercase();

    let artist_score = candidate
        .artists
        .iter()
        .map(|a| strsim::jaro_winkler(&wanted_artist, &a.to_lowercase()))
        .fold(strsim::jaro_winkler(&wanted_artist, &got_artist), f64::max);
    let title_score = strsim::normalized_levenshtein(&wanted_title, &got_title);
    (artist_score + title_score) / 2.0
}

/// Highest-scoring hit at or above [`MIN_MATCH_SCORE`]; earlier hits win ties
pub fn best_match(artist: &str, title: &str, hits: Vec<AlbumMetadata>) -> Option<AlbumMetadata> {
    let mut best: Option<(f64, AlbumMetadata)> = None;
    for hit in hits {
        let score = match_score(artist, title, &hit);
        if score < MIN_MATCH_SCORE {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _)| score > *current) {
            best = Some((score, hit));
        }
    }
    best.map(|(_, hit)| hit)
}

type DirectRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub struct SpotifyClient {
    client: Client,
    credentials: SpotifyCredentials,
    api_base_url: String,
    token_url: String,
    market: Option<String>,
    token: Mutex<Option<CachedToken>>,
    user_id: Mutex<Option<String>>,
    rate_limiter: DirectRateLimiter,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials, market: Option<String>, timeout: Duration) -> Result<Self, SpotifyError> {
        Self::with_endpoints(credentials, market, timeout, API_BASE_URL, ACCOUNTS_TOKEN_URL)
    }

    /// Client against custom endpoints (used by tests and proxies)
    pub fn with_endpoints(
        credentials: SpotifyCredentials,
        market: Option<String>,
        timeout: Duration,
        api_base_url: &str,
        token_url: &str,
    ) -> Result<Self, SpotifyError> {
        let quota = governor::Quota::per_second(
            NonZeroU32::new(REQUESTS_PER_SECOND).unwrap_or(NonZeroU32::MIN),
        );
        let client = Client::builder()
            .user_agent(concat!("SpotScrape/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SpotifyError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            market,
            token: Mutex::new(None),
            user_id: Mutex::new(None),
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Valid access token, refreshing when needed
    async fn access_token(&self) -> Result<String, SpotifyError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.token.clone());
            }
        }

        if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
            self.credentials.refresh_token.as_deref(),
        ) {
            debug!("Refreshing Spotify access token");
            let response = self
                .client
                .post(&self.token_url)
                .basic_auth(client_id, Some(client_secret))
                .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
                .send()
                .await
                .map_err(network_error)?;

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                warn!(status, "Spotify token refresh rejected");
                return Err(SpotifyError::Auth(format!("token refresh failed ({}): {}", status, body)));
            }

            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| SpotifyError::Parse(format!("token response: {}", e)))?;
            info!(expires_in = token.expires_in, "Spotify access token refreshed");
            let value = token.access_token.clone();
            *cached = Some(CachedToken {
                token: token.access_token,
                expires_at: Instant::now() + Duration::from_secs(token.expires_in),
            });
            return Ok(value);
        }

        if let Some(token) = self.credentials.access_token.as_deref() {
            return Ok(token.to_string());
        }

        Err(SpotifyError::Auth(
            "Spotify credentials not configured. Set SPOTIPY_CLIENT_ID, SPOTIPY_CLIENT_SECRET and \
             SPOTIFY_REFRESH_TOKEN (or SPOTIFY_ACCESS_TOKEN), or add them to the [spotify] config section"
                .to_string(),
        ))
    }

    /// Authenticated, rate-limited request
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, SpotifyError> {
        let token = self.access_token().await?;
        self.rate_limiter.until_ready().await;

        let response = request.bearer_auth(token).send().await.map_err(network_error)?;
        let status = response.status();
        match status {
            s if s.is_success() => response
                .json()
                .await
                .map_err(|e| SpotifyError::Parse(format!("{}: {}", what, e))),
            StatusCode::NOT_FOUND => Err(SpotifyError::NotFound(what.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(SpotifyError::RateLimited),
            StatusCode::UNAUTHORIZED => {
                // Force a refresh on the next call
                *self.token.lock().await = None;
                if self.credentials.can_refresh() {
                    Err(SpotifyError::TokenRejected(what.to_string()))
                } else {
                    Err(SpotifyError::Auth(format!("{} rejected the access token", what)))
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SpotifyError::Api(status.as_u16(), body))
            }
        }
    }

    async fn current_user_id(&self) -> Result<String, SpotifyError> {
        if let Some(id) = self.user_id.lock().await.clone() {
            return Ok(id);
        }
        let url = format!("{}/me", self.api_base_url);
        let user: UserObject = self.send(self.client.get(&url), "current user").await?;
        *self.user_id.lock().await = Some(user.id.clone());
        Ok(user.id)
    }

    fn with_market(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.market {
            Some(market) => request.query(&[("market", market.as_str())]),
            None => request,
        }
    }

    async fn fetch_album(&self, album_id: &str) -> Result<Option<AlbumMetadata>, SpotifyError> {
        let url = format!("{}/albums/{}", self.api_base_url, album_id);
        let request = self.with_market(self.client.get(&url));
        match self.send::<AlbumObject>(request, &format!("album {}", album_id)).await {
            Ok(album) => Ok(Some(album.into())),
            Err(SpotifyError::NotFound(_)) => Ok(None),
            // Malformed ids come back as 400 "invalid id"
            Err(SpotifyError::Api(400, _)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn track_popularity(&self, ids: &[String]) -> Result<HashMap<String, u8>, SpotifyError> {
        let mut popularity = HashMap::new();
        for batch in ids.chunks(TRACK_LOOKUP_BATCH) {
            let url = format!("{}/tracks", self.api_base_url);
            let request = self
                .with_market(self.client.get(&url))
                .query(&[("ids", batch.join(","))]);
            let response: TracksResponse = self.send(request, "tracks").await?;
            for track in response.tracks.into_iter().flatten() {
                if let (Some(id), Some(p)) = (track.id, track.popularity) {
                    popularity.insert(id, p.min(100) as u8);
                }
            }
        }
        Ok(popularity)
    }
}

fn network_error(e: reqwest::Error) -> SpotifyError {
    if e.is_timeout() {
        SpotifyError::Timeout
    } else {
        SpotifyError::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl PlaylistService for SpotifyClient {
    async fn get_album(&self, album_id: &str) -> spotscrape_common::Result<Option<AlbumMetadata>> {
        Ok(self.fetch_album(album_id).await?)
    }

    async fn search_album(&self, artist: &str, title: &str) -> spotscrape_common::Result<Option<AlbumMetadata>> {
        let url = format!("{}/search", self.api_base_url);
        let query = format!("album:{} artist:{}", title, artist);
        let limit = SEARCH_LIMIT.to_string();
        let request = self
            .with_market(self.client.get(&url))
            .query(&[("q", query.as_str()), ("type", "album"), ("limit", limit.as_str())]);
        let response: SearchResponse = self.send(request, "album search").await?;

        let hits: Vec<AlbumMetadata> = response.albums.items.into_iter().map(Into::into).collect();
        let Some(best) = best_match(artist, title, hits) else {
            debug!(artist, title, "No matching album in search results");
            return Ok(None);
        };

        // Search results omit popularity; the full album object has it
        match self.fetch_album(&best.id).await {
            Ok(Some(full)) => Ok(Some(full)),
            Ok(None) => Ok(Some(best)),
            Err(e) => {
                warn!(album_id = %best.id, error = %e, "Full album lookup failed, using search result");
                Ok(Some(best))
            }
        }
    }

    async fn get_album_tracks(&self, album_id: &str, policy: TrackPolicy) -> spotscrape_common::Result<Vec<TrackRef>> {
        let mut tracks = Vec::new();
        let mut next = Some(format!("{}/albums/{}/tracks?limit=50", self.api_base_url, album_id));
        while let Some(url) = next {
            let request = self.with_market(self.client.get(&url));
            let page: Paging<TrackObject> = self
                .send(request, &format!("tracks of album {}", album_id))
                .await?;
            for track in page.items {
                let Some(id) = track.id else { continue };
                tracks.push(TrackRef {
                    id,
                    name: track.name,
                    track_number: track.track_number,
                    disc_number: track.disc_number,
                    popularity: track.popularity.map(|p| p.min(100) as u8),
                });
            }
            next = page.next;
        }

        if policy.needs_popularity() && !tracks.is_empty() {
            let ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
            let popularity = self.track_popularity(&ids).await?;
            for track in &mut tracks {
                track.popularity = popularity.get(&track.id).copied();
            }
        }
        Ok(tracks)
    }

    async fn create_playlist(&self, name: &str, description: &str) -> spotscrape_common::Result<PlaylistId> {
        let user_id = self.current_user_id().await?;
        let url = format!("{}/users/{}/playlists", self.api_base_url, user_id);
        let body = serde_json::json!({
            "name": name,
            "description": description,
            "public": true,
        });
        let playlist: PlaylistObject = self
            .send(self.client.post(&url).json(&body), "create playlist")
            .await?;
        info!(playlist_id = %playlist.id, "Spotify playlist created");
        Ok(playlist.id)
    }

    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackRef]) -> spotscrape_common::Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base_url, playlist_id);
        for (index, batch) in tracks.chunks(ADD_TRACKS_BATCH).enumerate() {
            let uris: Vec<String> = batch.iter().map(TrackRef::uri).collect();
            let body = serde_json::json!({ "uris": uris });
            let _: serde_json::Value = self
                .send(self.client.post(&url).json(&body), "add tracks")
                .await?;
            debug!(playlist_id, batch = index + 1, tracks = batch.len(), "Tracks added");
        }
        Ok(())
    }
}
