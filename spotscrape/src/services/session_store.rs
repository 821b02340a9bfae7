//! Session state store
//!
//! Holds the single [`ScanSession`] behind an `Arc<RwLock<..>>`. Producers
//! write through a [`SessionWriter`] (or [`PlaylistWriter`]) tagged with the
//! generation it was issued for; readers get cloned snapshots. Every
//! accepted write is mirrored on the [`EventBus`].

use crate::models::{
    AlbumRecord, LogEntry, PlaylistProgress, PlaylistResult, PlaylistStatus, RawCandidate,
    ScanMethod, ScanSession, ScanStatus,
};
use crate::services::normalizer::normalize_and_merge;
use crate::types::ScanSink;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use spotscrape_common::events::{EventBus, LogLevel, ScrapeEvent};
use spotscrape_common::Error;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct StoreState {
    session: ScanSession,
    /// Cancels the producer of the current generation
    cancel: CancellationToken,
    /// Bumped whenever the result set changes
    results_version: u64,
}

/// Why a playlist job could not start
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaylistBusy {
    #[error("A scan is still running")]
    ScanRunning,
    #[error("A playlist job is already running")]
    JobRunning,
}

/// Progress view returned to pollers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: ScanStatus,
    pub percent: u8,
    pub message_log_tail: Vec<LogEntry>,
    pub error: Option<String>,
    pub generation: u64,
    pub session_id: Uuid,
    pub result_count: usize,
    pub playlist: Option<PlaylistProgress>,
}

/// Shared handle to the session state
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<StoreState>>,
    event_bus: EventBus,
    message_log_limit: usize,
}

fn emit_log(bus: &EventBus, generation: u64, entry: &LogEntry) {
    bus.emit_lossy(ScrapeEvent::LogAppended {
        generation,
        seq: entry.seq,
        level: entry.level,
        text: entry.text.clone(),
        timestamp: entry.timestamp,
    });
}

impl SessionStore {
    pub fn new(event_bus: EventBus, message_log_limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreState {
                session: ScanSession::idle(message_log_limit),
                cancel: CancellationToken::new(),
                results_version: 0,
            })),
            event_bus,
            message_log_limit,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Replace the session with a fresh running one
    ///
    /// Cancels the previous producer and bumps the generation, so any late
    /// write from the old producer is dropped.
    pub async fn start_scan(&self, url: impl Into<String>, method: ScanMethod) -> SessionWriter {
        let url = url.into();
        let mut state = self.inner.write().await;

        state.cancel.cancel();
        let generation = state.session.generation + 1;
        let mut session = ScanSession::new(generation, url.clone(), method, self.message_log_limit);
        session.status = ScanStatus::Running;
        let entry = session.append_log(
            LogLevel::Info,
            format!("Starting {} scan of {}", method.as_str(), url),
        );

        let cancel = CancellationToken::new();
        let session_id = session.session_id;
        state.session = session;
        state.cancel = cancel.clone();
        state.results_version += 1;

        info!(session_id = %session_id, generation, url = %url, method = method.as_str(), "Scan session started");

        self.event_bus.emit_lossy(ScrapeEvent::ScanStarted {
            session_id,
            generation,
            url,
            method: method.as_str().to_string(),
            timestamp: Utc::now(),
        });
        emit_log(&self.event_bus, generation, &entry);

        SessionWriter {
            store: self.clone(),
            generation,
            session_id,
            cancel,
        }
    }

    /// Cloned copy of the current session
    pub async fn snapshot(&self) -> ScanSession {
        self.inner.read().await.session.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.inner.read().await.session.generation
    }

    pub async fn status(&self) -> ScanStatus {
        self.inner.read().await.session.status
    }

    /// Current results in insertion order
    pub async fn results(&self) -> Vec<AlbumRecord> {
        self.inner.read().await.session.results.as_slice().to_vec()
    }

    pub async fn results_version(&self) -> u64 {
        self.inner.read().await.results_version
    }

    /// Status, percent and the requested slice of the message log
    pub async fn progress_report(&self, tail: Option<usize>, since: Option<u64>) -> ProgressReport {
        let state = self.inner.read().await;
        let session = &state.session;
        ProgressReport {
            status: session.status,
            percent: session.progress_percent,
            message_log_tail: session.log_tail(tail, since),
            error: session.error.clone(),
            generation: session.generation,
            session_id: session.session_id,
            result_count: session.results.len(),
            playlist: session.playlist.clone(),
        }
    }

    /// Start tracking a playlist job in the current session
    ///
    /// Refused while a scan or another playlist job is running.
    pub async fn begin_playlist(&self, name: &str) -> Result<PlaylistWriter, PlaylistBusy> {
        let mut state = self.inner.write().await;
        let session = &mut state.session;

        if session.status == ScanStatus::Running {
            return Err(PlaylistBusy::ScanRunning);
        }
        if matches!(
            session.playlist.as_ref().map(|p| p.status),
            Some(PlaylistStatus::Running)
        ) {
            return Err(PlaylistBusy::JobRunning);
        }

        session.playlist = Some(PlaylistProgress::started(name));
        let generation = session.generation;
        let entry = session.append_log(LogLevel::Info, format!("Creating playlist '{}'", name));
        emit_log(&self.event_bus, generation, &entry);
        self.event_bus.emit_lossy(ScrapeEvent::PlaylistProgress {
            generation,
            percent: 0,
            timestamp: Utc::now(),
        });

        info!(generation, playlist_name = name, "Playlist job started");

        Ok(PlaylistWriter {
            store: self.clone(),
            generation,
        })
    }
}

/// Write handle for one scan generation
#[derive(Clone)]
pub struct SessionWriter {
    store: SessionStore,
    generation: u64,
    session_id: Uuid,
    cancel: CancellationToken,
}

impl SessionWriter {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Token cancelled when a newer scan replaces this one
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Apply `f` if this writer is still current and the scan is not terminal
    async fn write<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut StoreState, &EventBus) -> R,
    ) -> Option<R> {
        let mut state = self.store.inner.write().await;
        if state.session.generation != self.generation {
            debug!(
                op,
                generation = self.generation,
                current = state.session.generation,
                "Dropping stale session write"
            );
            return None;
        }
        if state.session.is_terminal() {
            debug!(
                op,
                session_id = %self.session_id,
                status = ?state.session.status,
                "Ignoring write after terminal state"
            );
            return None;
        }
        Some(f(&mut state, &self.store.event_bus))
    }

    /// Raise progress (never lowers it) and append `message`
    pub async fn record_progress(&self, percent: u8, message: &str) -> bool {
        let session_id = self.session_id;
        self.write("record_progress", |state, bus| {
            let session = &mut state.session;
            let before = session.progress_percent;
            let percent = session.advance_progress(percent);
            if percent != before {
                bus.emit_lossy(ScrapeEvent::ScanProgress {
                    session_id,
                    generation: session.generation,
                    percent,
                    timestamp: Utc::now(),
                });
            }
            if !message.is_empty() {
                let entry = session.append_log(LogLevel::Info, message);
                emit_log(bus, session.generation, &entry);
            }
        })
        .await
        .is_some()
    }

    /// Append a log line without changing progress
    pub async fn log(&self, level: LogLevel, message: &str) -> bool {
        self.write("log", |state, bus| {
            let entry = state.session.append_log(level, message);
            emit_log(bus, state.session.generation, &entry);
        })
        .await
        .is_some()
    }

    /// Normalize and merge one candidate
    ///
    /// Returns the record after the merge, or `None` when the write was
    /// dropped or the candidate skipped.
    pub async fn merge(&self, candidate: RawCandidate) -> Option<AlbumRecord> {
        let session_id = self.session_id;
        self.write("merge", |state, bus| {
            let generation = state.session.generation;
            match normalize_and_merge(candidate, &mut state.session) {
                Ok(merged) => {
                    state.results_version += 1;
                    let result_count = state.session.results.len();
                    debug!(
                        session_id = %session_id,
                        album_id = %merged.record.id,
                        created = merged.created,
                        "Merged album candidate"
                    );
                    bus.emit_lossy(ScrapeEvent::AlbumMerged {
                        generation,
                        album_id: merged.record.id.clone(),
                        artist: merged.record.artist.clone(),
                        title: merged.record.title.clone(),
                        created: merged.created,
                        result_count,
                    });
                    if let Some(entry) = state.session.message_log.back() {
                        emit_log(bus, generation, entry);
                    }
                    Some(merged.record)
                }
                Err(Error::NormalizationSkip(reason)) => {
                    warn!(session_id = %session_id, reason = %reason, "Skipping album candidate");
                    let entry = state
                        .session
                        .append_log(LogLevel::Warning, format!("Skipped candidate: {}", reason));
                    emit_log(bus, generation, &entry);
                    None
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Merge failed");
                    None
                }
            }
        })
        .await
        .flatten()
    }

    /// Terminal success; sets progress to 100
    pub async fn complete(&self) -> bool {
        let session_id = self.session_id;
        self.write("complete", |state, bus| {
            let session = &mut state.session;
            session.advance_progress(100);
            session.status = ScanStatus::Complete;
            session.ended_at = Some(Utc::now());
            let result_count = session.results.len();
            let entry = session.append_log(
                LogLevel::Info,
                format!("Scan complete: {} albums found", result_count),
            );

            info!(session_id = %session_id, generation = session.generation, result_count, "Scan completed");

            bus.emit_lossy(ScrapeEvent::ScanProgress {
                session_id,
                generation: session.generation,
                percent: 100,
                timestamp: Utc::now(),
            });
            emit_log(bus, session.generation, &entry);
            bus.emit_lossy(ScrapeEvent::ScanCompleted {
                session_id,
                generation: session.generation,
                result_count,
                timestamp: Utc::now(),
            });
        })
        .await
        .is_some()
    }

    /// Terminal failure with a plain-language message
    pub async fn fail(&self, error: &str) -> bool {
        let session_id = self.session_id;
        self.write("fail", |state, bus| {
            let session = &mut state.session;
            session.status = ScanStatus::Error;
            session.error = Some(error.to_string());
            session.ended_at = Some(Utc::now());
            let entry = session.append_log(LogLevel::Error, format!("Error: {}", error));

            warn!(session_id = %session_id, generation = session.generation, error, "Scan failed");

            emit_log(bus, session.generation, &entry);
            bus.emit_lossy(ScrapeEvent::ScanFailed {
                session_id,
                generation: session.generation,
                error: error.to_string(),
                timestamp: Utc::now(),
            });
        })
        .await
        .is_some()
    }
}

#[async_trait::async_trait]
impl ScanSink for SessionWriter {
    async fn progress(&self, percent: u8, message: &str) {
        self.record_progress(percent, message).await;
    }

    async fn log(&self, level: LogLevel, message: &str) {
        SessionWriter::log(self, level, message).await;
    }

    async fn candidate(&self, candidate: RawCandidate) {
        self.merge(candidate).await;
    }
}

/// Write handle for a playlist job
///
/// Accepted after the scan is terminal; dropped once a newer scan starts or
/// the job has finished.
#[derive(Clone)]
pub struct PlaylistWriter {
    store: SessionStore,
    generation: u64,
}

impl PlaylistWriter {
    async fn write<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut ScanSession, &EventBus) -> R,
    ) -> Option<R> {
        let mut state = self.store.inner.write().await;
        let session = &mut state.session;
        if session.generation != self.generation {
            debug!(
                op,
                generation = self.generation,
                current = session.generation,
                "Dropping stale playlist write"
            );
            return None;
        }
        let running = matches!(
            session.playlist.as_ref().map(|p| p.status),
            Some(PlaylistStatus::Running)
        );
        if !running {
            debug!(op, generation = self.generation, "Ignoring write to finished playlist job");
            return None;
        }
        Some(f(session, &self.store.event_bus))
    }

    /// Raise playlist progress and append `message`
    pub async fn progress(&self, percent: u8, message: &str) -> bool {
        self.write("playlist_progress", |session, bus| {
            let generation = session.generation;
            if let Some(playlist) = session.playlist.as_mut() {
                let clamped = percent.min(100);
                if clamped > playlist.percent {
                    playlist.percent = clamped;
                    bus.emit_lossy(ScrapeEvent::PlaylistProgress {
                        generation,
                        percent: clamped,
                        timestamp: Utc::now(),
                    });
                }
            }
            if !message.is_empty() {
                let entry = session.append_log(LogLevel::Info, message);
                emit_log(bus, generation, &entry);
            }
        })
        .await
        .is_some()
    }

    pub async fn log(&self, level: LogLevel, message: &str) -> bool {
        self.write("playlist_log", |session, bus| {
            let entry = session.append_log(level, message);
            emit_log(bus, session.generation, &entry);
        })
        .await
        .is_some()
    }

    /// Record the terminal result
    pub async fn finish(&self, result: &PlaylistResult) -> bool {
        self.write("playlist_finish", |session, bus| {
            let generation = session.generation;
            let summary = match result.status {
                PlaylistStatus::Succeeded => {
                    format!("Playlist created with {} tracks", result.tracks_added)
                }
                PlaylistStatus::FailedPartial => format!(
                    "Playlist created with {} tracks; some albums failed",
                    result.tracks_added
                ),
                _ => format!(
                    "Playlist creation failed: {}",
                    result.error.as_deref().unwrap_or("no tracks resolved")
                ),
            };
            let level = match result.status {
                PlaylistStatus::Succeeded => LogLevel::Info,
                PlaylistStatus::FailedPartial => LogLevel::Warning,
                _ => LogLevel::Error,
            };

            if let Some(playlist) = session.playlist.as_mut() {
                playlist.status = result.status;
                playlist.percent = 100;
                playlist.result = Some(result.clone());
                playlist.ended_at = Some(Utc::now());
            }
            let entry = session.append_log(level, summary);
            emit_log(bus, generation, &entry);
            bus.emit_lossy(ScrapeEvent::PlaylistFinished {
                generation,
                status: result.status.as_str().to_string(),
                playlist_url: result.playlist_url.clone(),
                tracks_added: result.tracks_added,
                timestamp: Utc::now(),
            });

            info!(
                generation,
                status = result.status.as_str(),
                tracks_added = result.tracks_added,
                "Playlist job finished"
            );
        })
        .await
        .is_some()
    }
}
