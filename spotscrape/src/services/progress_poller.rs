//! Client-side progress poller
//!
//! Polls `GET /api/progress` of a running server through the retry policy
//! and forwards each report until the session settles or the poller is
//! cancelled. Backs the `spotscrape watch` command.

use crate::models::PlaylistStatus;
use crate::services::session_store::ProgressReport;
use crate::utils::{execute, RetryPolicy};
use reqwest::Client;
use spotscrape_common::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default time between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Nothing left to watch: the scan is terminal and no playlist job runs
pub fn is_settled(report: &ProgressReport) -> bool {
    let playlist_running = matches!(
        report.playlist.as_ref().map(|p| p.status),
        Some(PlaylistStatus::Running)
    );
    report.status.is_terminal() && !playlist_running
}

/// Terminal lines for `spotscrape watch`
///
/// Status and error lines are printed only when they change.
#[derive(Debug, Default)]
pub struct WatchOutput {
    last_percent: Option<(u64, u8)>,
    last_error: Option<(u64, String)>,
}

impl WatchOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, report: &ProgressReport) -> Vec<String> {
        let mut lines = Vec::new();
        let percent = (report.generation, report.percent);
        if self.last_percent != Some(percent) {
            lines.push(format!("[{:>3}%] status: {:?}", report.percent, report.status));
            self.last_percent = Some(percent);
        }
        for entry in &report.message_log_tail {
            lines.push(format!(
                "{} {:<7} {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.level.to_string(),
                entry.text
            ));
        }
        if let Some(error) = &report.error {
            let current = (report.generation, error.clone());
            if self.last_error.as_ref() != Some(&current) {
                lines.push(format!("error: {}", error));
                self.last_error = Some(current);
            }
        }
        lines
    }
}

pub struct ProgressPoller {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    interval: Duration,
}

impl ProgressPoller {
    pub fn new(base_url: &str, policy: RetryPolicy, interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            interval,
        })
    }

    async fn fetch_report(&self, since: Option<u64>) -> Result<ProgressReport> {
        let url = format!("{}/api/progress", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(seq) = since {
            request = request.query(&[("since", seq)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.policy.timeout.as_millis() as u64)
            } else {
                Error::external("spotscrape", e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::external_status(
                "spotscrape",
                status.as_u16(),
                format!("GET {} returned {}", url, status),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| Error::external("spotscrape", format!("invalid progress response: {}", e)))
    }

    /// One progress report with log entries after `since`, retried per policy
    pub async fn poll_once(&self, since: Option<u64>) -> Result<ProgressReport> {
        Ok(execute("progress poll", &self.policy, || self.fetch_report(since)).await?)
    }

    /// Poll in the background until settled or cancelled
    ///
    /// Each report only carries log entries not sent before. A report from a
    /// new generation is re-read from its first log entry. The task ends
    /// with the error of a poll that exhausted its retries.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<ProgressReport>, JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            let mut since: Option<u64> = None;
            let mut generation: Option<u64> = None;

            loop {
                let report = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Progress poller cancelled");
                        return Ok(());
                    }
                    report = self.poll_once(since) => report?,
                };

                if generation.is_some_and(|g| g != report.generation) {
                    // Log sequence numbers restart with every generation, so
                    // this report was filtered with a cursor from the old one
                    info!(generation = report.generation, "New scan generation detected");
                    generation = Some(report.generation);
                    since = Some(0);
                    continue;
                }
                generation = Some(report.generation);
                if let Some(last) = report.message_log_tail.last() {
                    since = Some(last.seq);
                }

                let settled = is_settled(&report);
                if tx.send(report).await.is_err() {
                    warn!("Progress receiver dropped, stopping poller");
                    return Ok(());
                }
                if settled {
                    return Ok(());
                }

                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        });

        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaylistProgress, ScanStatus};
    use uuid::Uuid;

    fn report(status: ScanStatus) -> ProgressReport {
        ProgressReport {
            status,
            percent: 0,
            message_log_tail: vec![],
            error: None,
            generation: 1,
            session_id: Uuid::new_v4(),
            result_count: 0,
            playlist: None,
        }
    }

    #[test]
    fn test_settled_only_when_terminal() {
        assert!(!is_settled(&report(ScanStatus::Idle)));
        assert!(!is_settled(&report(ScanStatus::Running)));
        assert!(is_settled(&report(ScanStatus::Complete)));
        assert!(is_settled(&report(ScanStatus::Error)));
    }

    #[test]
    fn test_running_playlist_keeps_watching() {
        let mut r = report(ScanStatus::Complete);
        r.playlist = Some(PlaylistProgress::started("Mix"));
        assert!(!is_settled(&r));
    }

    #[test]
    fn test_watch_output_prints_error_once() {
        let mut output = WatchOutput::new();
        let mut failed = report(ScanStatus::Error);
        failed.error = Some("page unreachable".into());

        let first = output.render(&failed);
        assert_eq!(first.iter().filter(|l| l.starts_with("error:")).count(), 1);
        assert!(output.render(&failed).is_empty());

        // Same message from a newer scan is news
        failed.generation = 2;
        let next = output.render(&failed);
        assert!(next.contains(&"error: page unreachable".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_poller_stops() {
        // Port 9 (discard) refuses connections on test hosts
        let policy = RetryPolicy::no_retry(Duration::from_millis(200));
        let poller = ProgressPoller::new("http://127.0.0.1:9", policy, DEFAULT_POLL_INTERVAL).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_rx, handle) = poller.spawn(cancel);
        assert!(handle.await.unwrap().is_ok());
    }
}
