//! Album candidates and canonical album records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Album reference as produced by an extraction backend, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub artist: String,
    pub title: String,
    /// Spotify album id, when directly discoverable
    pub external_id: Option<String>,
    /// 0-100; values above 100 are clamped during merge
    pub popularity: Option<u32>,
    pub image_urls: Vec<String>,
    pub external_link: Option<String>,
    pub source_url: String,
}

impl RawCandidate {
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            external_id: None,
            popularity: None,
            image_urls: Vec::new(),
            external_link: None,
            source_url: source_url.into(),
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_popularity(mut self, popularity: u32) -> Self {
        self.popularity = Some(popularity);
        self
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    pub fn with_external_link(mut self, link: impl Into<String>) -> Self {
        self.external_link = Some(link.into());
        self
    }
}

/// Canonical, deduplicated album record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    /// Stable identity: the external id, or `norm:<hash>` of artist|title
    pub id: String,
    pub artist: String,
    pub title: String,
    pub external_id: Option<String>,
    pub popularity: u8,
    pub image_urls: Vec<String>,
    pub external_link: Option<String>,
    pub source_url: String,
    pub first_seen: DateTime<Utc>,
}

impl AlbumRecord {
    /// `Artist - Title` as shown in log lines
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Album records keyed by id, iterated in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<AlbumRecord>,
    index: HashMap<String, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&AlbumRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AlbumRecord> {
        match self.index.get(id) {
            Some(&i) => self.records.get_mut(i),
            None => None,
        }
    }

    /// Insert a record whose id is not yet present
    ///
    /// Returns `false` (and leaves the set unchanged) on a duplicate id.
    pub fn insert(&mut self, record: AlbumRecord) -> bool {
        if self.index.contains_key(&record.id) {
            return false;
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlbumRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[AlbumRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

impl Serialize for ResultSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<AlbumRecord>::deserialize(deserializer)?;
        let mut set = ResultSet::new();
        for record in records {
            set.insert(record);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> AlbumRecord {
        AlbumRecord {
            id: id.to_string(),
            artist: "Artist".to_string(),
            title: id.to_string(),
            external_id: None,
            popularity: 0,
            image_urls: vec![],
            external_link: None,
            source_url: "https://example.com".to_string(),
            first_seen: Utc::now(),
        }
    }

    #[test]
    fn test_result_set_keeps_insertion_order() {
        let mut set = ResultSet::new();
        assert!(set.insert(record("c")));
        assert!(set.insert(record("a")));
        assert!(set.insert(record("b")));
        assert!(!set.insert(record("a")));

        let ids: Vec<_> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(set.len(), 3);
        assert!(set.contains("b"));
    }

    #[test]
    fn test_result_set_serializes_as_list() {
        let mut set = ResultSet::new();
        set.insert(record("x"));
        set.insert(record("y"));

        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[1]["id"], "y");

        let back: ResultSet = serde_json::from_value(json).unwrap();
        assert_eq!(back.get("y").map(|r| r.id.as_str()), Some("y"));
    }
}
