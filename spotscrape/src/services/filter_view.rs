//! Filter/sort view over album records
//!
//! Pure and deterministic: the input slice is never modified and identical
//! inputs always produce identical output.

use crate::models::{
    AlbumRecord, FilterField, FilterSortSpec, PopularityOperator, SortDirection, SortField,
};
use std::cmp::Ordering;

/// Records matching `spec`, in the order `spec` asks for
///
/// Filters compose with AND. Sorting is stable and string comparison is
/// case-insensitive; a descending sort reverses the comparator so ties keep
/// insertion order.
pub fn apply(spec: &FilterSortSpec, results: &[AlbumRecord]) -> Vec<AlbumRecord> {
    let needle = spec.text_filter.trim().to_lowercase();

    let mut view: Vec<AlbumRecord> = results
        .iter()
        .filter(|record| matches_text(record, spec.filter_field, &needle))
        .filter(|record| matches_popularity(record, spec))
        .cloned()
        .collect();

    if let Some(field) = spec.sort_field {
        view.sort_by(|a, b| {
            let ordering = compare(a, b, field);
            match spec.sort_direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
    view
}

fn matches_text(record: &AlbumRecord, field: FilterField, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let haystack = match field {
        FilterField::Artist => &record.artist,
        FilterField::Title => &record.title,
    };
    haystack.to_lowercase().contains(needle)
}

fn matches_popularity(record: &AlbumRecord, spec: &FilterSortSpec) -> bool {
    match spec.popularity_threshold {
        None => true,
        Some(threshold) => match spec.popularity_operator {
            PopularityOperator::GreaterThan => record.popularity >= threshold,
            PopularityOperator::LessThan => record.popularity <= threshold,
        },
    }
}

fn compare(a: &AlbumRecord, b: &AlbumRecord, field: SortField) -> Ordering {
    match field {
        SortField::Artist => a.artist.to_lowercase().cmp(&b.artist.to_lowercase()),
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortField::Popularity => a.popularity.cmp(&b.popularity),
    }
}
