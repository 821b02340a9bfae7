//! Scan session state
//!
//! Status lifecycle: `idle` → `running` → `complete | error`. Only one
//! session exists at a time; a new scan replaces it with a higher generation.

use super::album::ResultSet;
use super::playlist::PlaylistProgress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spotscrape_common::events::LogLevel;
use std::collections::VecDeque;
use std::str::FromStr;
use uuid::Uuid;

/// Extraction strategy requested for a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMethod {
    /// Scan the page for Spotify album links
    Links,
    /// Send cleaned page text to the content analyzer
    Ai,
}

impl ScanMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMethod::Links => "links",
            ScanMethod::Ai => "ai",
        }
    }
}

impl FromStr for ScanMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "links" | "url" => Ok(ScanMethod::Links),
            "ai" | "gpt" => Ok(ScanMethod::Ai),
            other => Err(format!("unknown scan method '{}'", other)),
        }
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Running,
    Complete,
    Error,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Complete | ScanStatus::Error)
    }
}

/// One line of the session message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing within a session
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub text: String,
}

/// The single active scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: Uuid,
    pub generation: u64,
    pub url: String,
    pub method: ScanMethod,
    pub status: ScanStatus,
    /// 0-100, non-decreasing within one generation
    pub progress_percent: u8,
    pub message_log: VecDeque<LogEntry>,
    pub message_log_limit: usize,
    next_seq: u64,
    pub results: ResultSet,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub playlist: Option<PlaylistProgress>,
}

impl ScanSession {
    /// Empty session used before the first scan
    pub fn idle(message_log_limit: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            generation: 0,
            url: String::new(),
            method: ScanMethod::Links,
            status: ScanStatus::Idle,
            progress_percent: 0,
            message_log: VecDeque::new(),
            message_log_limit: message_log_limit.max(1),
            next_seq: 1,
            results: ResultSet::new(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            playlist: None,
        }
    }

    /// Fresh session for a new scan generation
    pub fn new(generation: u64, url: String, method: ScanMethod, message_log_limit: usize) -> Self {
        Self {
            generation,
            url,
            method,
            ..Self::idle(message_log_limit)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a log line, evicting the oldest entry at capacity
    pub fn append_log(&mut self, level: LogLevel, text: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            seq: self.next_seq,
            timestamp: Utc::now(),
            level,
            text: text.into(),
        };
        self.next_seq += 1;

        while self.message_log.len() >= self.message_log_limit {
            self.message_log.pop_front();
        }
        self.message_log.push_back(entry.clone());
        entry
    }

    /// Raise progress; lower values are ignored and values clamp to 100
    ///
    /// Returns the effective percent.
    pub fn advance_progress(&mut self, percent: u8) -> u8 {
        let clamped = percent.min(100);
        if clamped > self.progress_percent {
            self.progress_percent = clamped;
        }
        self.progress_percent
    }

    /// Log entries with `seq > since`, limited to the last `tail` of them
    pub fn log_tail(&self, tail: Option<usize>, since: Option<u64>) -> Vec<LogEntry> {
        let after: Vec<&LogEntry> = self
            .message_log
            .iter()
            .filter(|e| since.map_or(true, |s| e.seq > s))
            .collect();
        let skip = match tail {
            Some(n) => after.len().saturating_sub(n),
            None => 0,
        };
        after.into_iter().skip(skip).cloned().collect()
    }
}
