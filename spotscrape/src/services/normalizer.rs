//! Deduplication and normalization of raw album candidates
//!
//! Identity is the trimmed external id when present, otherwise
//! `norm:` + the first 16 hex digits of SHA-256 over the case-folded,
//! whitespace-collapsed `artist|title`. Merging into an existing record only
//! fills empty fields; non-empty values are never overwritten.

use crate::models::{AlbumRecord, RawCandidate, ScanSession};
use chrono::Utc;
use sha2::{Digest, Sha256};
use spotscrape_common::events::LogLevel;
use spotscrape_common::{Error, Result};

/// Outcome of a successful merge
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Record state after the merge
    pub record: AlbumRecord,
    /// True when the candidate introduced a new record
    pub created: bool,
}

/// Case-fold and collapse runs of whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Identity for a candidate, or `None` when it has no identity source
pub fn candidate_identity(raw: &RawCandidate) -> Option<String> {
    if let Some(id) = raw.external_id.as_deref().map(str::trim) {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    let artist = normalize_text(&raw.artist);
    let title = normalize_text(&raw.title);
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(derived_id(&artist, &title))
}

fn derived_id(artist: &str, title: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}", artist, title).as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("norm:{}", hex)
}

fn clamp_popularity(popularity: Option<u32>) -> u8 {
    popularity.map(|p| p.min(100) as u8).unwrap_or(0)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Merge `raw` into the session's result set
///
/// Appends `Found: ...` or `Updated: ...` to the session log. Candidates
/// without any identity source are rejected with
/// [`Error::NormalizationSkip`] and leave the session untouched; the caller
/// decides how to log the skip.
pub fn normalize_and_merge(raw: RawCandidate, into: &mut ScanSession) -> Result<Merged> {
    let Some(id) = candidate_identity(&raw) else {
        return Err(Error::NormalizationSkip(format!(
            "missing artist or title (artist: '{}', title: '{}')",
            raw.artist.trim(),
            raw.title.trim()
        )));
    };

    let artist = raw.artist.trim().to_string();
    let title = raw.title.trim().to_string();
    let popularity = clamp_popularity(raw.popularity);
    let external_id = non_blank(raw.external_id);
    let external_link = non_blank(raw.external_link);
    let image_urls: Vec<String> = raw
        .image_urls
        .into_iter()
        .filter(|u| !u.trim().is_empty())
        .collect();

    if let Some(existing) = into.results.get_mut(&id) {
        if existing.artist.trim().is_empty() && !artist.is_empty() {
            existing.artist = artist;
        }
        if existing.title.trim().is_empty() && !title.is_empty() {
            existing.title = title;
        }
        if existing.popularity == 0 && popularity > 0 {
            existing.popularity = popularity;
        }
        if existing.image_urls.is_empty() && !image_urls.is_empty() {
            existing.image_urls = image_urls;
        }
        if existing.external_link.is_none() {
            existing.external_link = external_link;
        }
        if existing.external_id.is_none() {
            existing.external_id = external_id;
        }
        let record = existing.clone();
        into.append_log(LogLevel::Info, format!("Updated: {}", record.display_name()));
        return Ok(Merged {
            record,
            created: false,
        });
    }

    let record = AlbumRecord {
        id,
        artist,
        title,
        external_id,
        popularity,
        image_urls,
        external_link,
        source_url: raw.source_url,
        first_seen: Utc::now(),
    };
    into.append_log(LogLevel::Info, format!("Found: {}", record.display_name()));
    into.results.insert(record.clone());
    Ok(Merged {
        record,
        created: true,
    })
}
