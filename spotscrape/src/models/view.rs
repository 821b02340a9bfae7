//! Filter/sort view configuration
//!
//! Pure configuration; applying it never mutates album records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterField {
    #[default]
    Artist,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopularityOperator {
    /// Keep `popularity >= threshold`
    #[default]
    GreaterThan,
    /// Keep `popularity <= threshold`
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Artist,
    Title,
    Popularity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// View over the result set
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSortSpec {
    /// Empty means inactive
    pub text_filter: String,
    pub filter_field: FilterField,
    pub popularity_threshold: Option<u8>,
    pub popularity_operator: PopularityOperator,
    /// `None` keeps insertion order
    pub sort_field: Option<SortField>,
    pub sort_direction: SortDirection,
}

impl FilterSortSpec {
    /// True when this view neither filters nor sorts
    pub fn is_identity(&self) -> bool {
        self.text_filter.trim().is_empty()
            && self.popularity_threshold.is_none()
            && self.sort_field.is_none()
    }
}
