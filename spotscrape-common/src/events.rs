//! Event types for the SpotScrape event system
//!
//! Every accepted write to the session store is published here so SSE
//! subscribers see the same sequence a poller would.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a session log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// SpotScrape event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScrapeEvent {
    /// A new scan replaced the previous session
    ScanStarted {
        session_id: Uuid,
        generation: u64,
        url: String,
        method: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan progress advanced
    ScanProgress {
        session_id: Uuid,
        generation: u64,
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A line was appended to the session message log
    LogAppended {
        generation: u64,
        seq: u64,
        level: LogLevel,
        text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An album record was created or enriched
    AlbumMerged {
        generation: u64,
        album_id: String,
        artist: String,
        title: String,
        created: bool,
        result_count: usize,
    },

    /// Scan finished successfully
    ScanCompleted {
        session_id: Uuid,
        generation: u64,
        result_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan ended with a session-level error
    ScanFailed {
        session_id: Uuid,
        generation: u64,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playlist job progress advanced
    PlaylistProgress {
        generation: u64,
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playlist job reached a terminal status
    PlaylistFinished {
        generation: u64,
        status: String,
        playlist_url: Option<String>,
        tracks_added: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Selected album ids changed
    SelectionChanged {
        selected_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScrapeEvent {
    /// SSE event name for this variant
    pub fn event_type(&self) -> &'static str {
        match self {
            ScrapeEvent::ScanStarted { .. } => "ScanStarted",
            ScrapeEvent::ScanProgress { .. } => "ScanProgress",
            ScrapeEvent::LogAppended { .. } => "LogAppended",
            ScrapeEvent::AlbumMerged { .. } => "AlbumMerged",
            ScrapeEvent::ScanCompleted { .. } => "ScanCompleted",
            ScrapeEvent::ScanFailed { .. } => "ScanFailed",
            ScrapeEvent::PlaylistProgress { .. } => "PlaylistProgress",
            ScrapeEvent::PlaylistFinished { .. } => "PlaylistFinished",
            ScrapeEvent::SelectionChanged { .. } => "SelectionChanged",
        }
    }

    /// Scan generation the event belongs to, if it is generation-scoped
    pub fn generation(&self) -> Option<u64> {
        match self {
            ScrapeEvent::ScanStarted { generation, .. }
            | ScrapeEvent::ScanProgress { generation, .. }
            | ScrapeEvent::LogAppended { generation, .. }
            | ScrapeEvent::AlbumMerged { generation, .. }
            | ScrapeEvent::ScanCompleted { generation, .. }
            | ScrapeEvent::ScanFailed { generation, .. }
            | ScrapeEvent::PlaylistProgress { generation, .. }
            | ScrapeEvent::PlaylistFinished { generation, .. } => Some(*generation),
            ScrapeEvent::SelectionChanged { .. } => None,
        }
    }
}

/// Broadcast bus for [`ScrapeEvent`]s
///
/// Slow subscribers lag rather than block the producer; lagged receivers get
/// `RecvError::Lagged` and resume from the oldest retained event.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScrapeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// ```
    /// use spotscrape_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScrapeEvent,
    ) -> Result<usize, broadcast::error::SendError<ScrapeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ScrapeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let count = bus
            .emit(ScrapeEvent::SelectionChanged {
                selected_count: 3,
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(count, 1);

        match rx.recv().await.unwrap() {
            ScrapeEvent::SelectionChanged { selected_count, .. } => assert_eq!(selected_count, 3),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        assert!(bus
            .emit(ScrapeEvent::PlaylistProgress {
                generation: 1,
                percent: 10,
                timestamp: chrono::Utc::now(),
            })
            .is_err());

        // Lossy variant swallows the error
        bus.emit_lossy(ScrapeEvent::PlaylistProgress {
            generation: 1,
            percent: 20,
            timestamp: chrono::Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ScrapeEvent::LogAppended {
            generation: 2,
            seq: 7,
            level: LogLevel::Warning,
            text: "Skipped candidate".to_string(),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LogAppended");
        assert_eq!(json["level"], "warning");
        assert_eq!(event.event_type(), "LogAppended");
        assert_eq!(event.generation(), Some(2));
    }
}
