//! Data models for the SpotScrape service
//!
//! - Album candidates and canonical records
//! - Scan session state (status, progress, message log)
//! - Filter/sort view configuration
//! - Playlist jobs and their outcomes

pub mod album;
pub mod playlist;
pub mod session;
pub mod view;

pub use album::{AlbumRecord, RawCandidate, ResultSet};
pub use playlist::{AlbumOutcome, PlaylistJob, PlaylistProgress, PlaylistResult, PlaylistStatus, TrackPolicy};
pub use session::{LogEntry, ScanMethod, ScanSession, ScanStatus};
pub use view::{FilterField, FilterSortSpec, PopularityOperator, SortDirection, SortField};
