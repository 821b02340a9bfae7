//! Selection state and the current view spec
//!
//! Selection is reconciled against the settled result set: once the session
//! is no longer running, ids that are absent from the results are dropped,
//! and the whole selection is cleared when the current view is empty. While
//! a scan runs the selection is left alone, so re-running a scan keeps every
//! previously selected album that shows up again.

use crate::models::{AlbumRecord, FilterSortSpec, ScanSession, ScanStatus};
use crate::services::filter_view;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use spotscrape_common::events::{EventBus, ScrapeEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Snapshot of the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Selected album ids, in result order
    pub selected_ids: Vec<String>,
}

#[derive(Default)]
struct Inner {
    spec: FilterSortSpec,
    selected: HashSet<String>,
}

/// Shared selection handle
#[derive(Clone)]
pub struct SelectionManager {
    inner: Arc<RwLock<Inner>>,
    event_bus: EventBus,
}

impl SelectionManager {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            event_bus,
        }
    }

    /// Replace the view spec used for selection
    pub async fn set_view(&self, spec: FilterSortSpec) {
        self.inner.write().await.spec = spec;
    }

    pub async fn view_spec(&self) -> FilterSortSpec {
        self.inner.read().await.spec.clone()
    }

    /// Reconcile against `session`, then return the current view
    pub async fn sync(&self, session: &ScanSession) -> Vec<AlbumRecord> {
        let mut inner = self.inner.write().await;
        let view = filter_view::apply(&inner.spec, session.results.as_slice());

        if session.status != ScanStatus::Running {
            let before = inner.selected.len();
            if view.is_empty() {
                inner.selected.clear();
            } else {
                inner.selected.retain(|id| session.results.contains(id));
            }
            let dropped = before - inner.selected.len();
            if dropped > 0 {
                debug!(dropped, "Reconciled selection against settled results");
                self.notify(inner.selected.len());
            }
        }
        view
    }

    /// Select or deselect one id from `view`
    ///
    /// Ids outside the view are ignored. Returns whether the selection changed.
    pub async fn set_selected(&self, id: &str, selected: bool, view: &[AlbumRecord]) -> bool {
        if !view.iter().any(|r| r.id == id) {
            info!(album_id = id, "Selection ignored: album not in current view");
            return false;
        }
        let mut inner = self.inner.write().await;
        let changed = if selected {
            inner.selected.insert(id.to_string())
        } else {
            inner.selected.remove(id)
        };
        if changed {
            self.notify(inner.selected.len());
        }
        changed
    }

    /// Select every album in `view`
    pub async fn select_all(&self, view: &[AlbumRecord]) -> usize {
        let mut inner = self.inner.write().await;
        for record in view {
            inner.selected.insert(record.id.clone());
        }
        let count = inner.selected.len();
        self.notify(count);
        count
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.selected.clear();
        self.notify(0);
    }

    /// Selected ids ordered as in `results`; ids not in `results` go last
    pub async fn state(&self, results: &[AlbumRecord]) -> SelectionState {
        let inner = self.inner.read().await;
        let mut ordered: Vec<String> = results
            .iter()
            .filter(|r| inner.selected.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();
        let mut rest: Vec<String> = inner
            .selected
            .iter()
            .filter(|id| !ordered.contains(*id))
            .cloned()
            .collect();
        rest.sort();
        ordered.extend(rest);
        SelectionState {
            selected_ids: ordered,
        }
    }

    fn notify(&self, selected_count: usize) {
        self.event_bus.emit_lossy(ScrapeEvent::SelectionChanged {
            selected_count,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawCandidate, ScanMethod};
    use crate::services::normalizer::normalize_and_merge;

    fn settled(titles: &[&str], status: ScanStatus) -> ScanSession {
        let mut session = ScanSession::new(1, "https://example.com".into(), ScanMethod::Links, 100);
        for title in titles {
            normalize_and_merge(RawCandidate::new("Artist", *title, "u"), &mut session).unwrap();
        }
        session.status = status;
        session
    }

    fn id_of(session: &ScanSession, title: &str) -> String {
        session
            .results
            .iter()
            .find(|r| r.title == title)
            .map(|r| r.id.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_rerun_keeps_surviving_selection() {
        let selection = SelectionManager::new(EventBus::new(16));

        let first = settled(&["A", "B"], ScanStatus::Complete);
        let view = selection.sync(&first).await;
        selection.set_selected(&id_of(&first, "A"), true, &view).await;
        selection.set_selected(&id_of(&first, "B"), true, &view).await;

        // While the re-run is in flight nothing is dropped
        let running = settled(&["C"], ScanStatus::Running);
        selection.sync(&running).await;
        assert_eq!(selection.state(&[]).await.selected_ids.len(), 2);

        let second = settled(&["B", "C"], ScanStatus::Complete);
        selection.sync(&second).await;
        let state = selection.state(second.results.as_slice()).await;
        assert_eq!(state.selected_ids, vec![id_of(&second, "B")]);
    }

    #[tokio::test]
    async fn test_select_outside_view_is_noop() {
        let selection = SelectionManager::new(EventBus::new(16));
        let session = settled(&["A", "B"], ScanStatus::Complete);

        selection
            .set_view(FilterSortSpec {
                text_filter: "nothing matches".into(),
                filter_field: crate::models::FilterField::Title,
                ..Default::default()
            })
            .await;
        let view = selection.sync(&session).await;
        assert!(view.is_empty());
        assert!(!selection.set_selected(&id_of(&session, "A"), true, &view).await);
        assert!(selection.state(&[]).await.selected_ids.is_empty());
    }

    #[tokio::test]
    async fn test_empty_view_clears_selection() {
        let selection = SelectionManager::new(EventBus::new(16));
        let session = settled(&["A", "B"], ScanStatus::Complete);
        let view = selection.sync(&session).await;
        assert_eq!(selection.select_all(&view).await, 2);

        selection
            .set_view(FilterSortSpec {
                popularity_threshold: Some(90),
                ..Default::default()
            })
            .await;
        selection.sync(&session).await;
        assert!(selection.state(&[]).await.selected_ids.is_empty());
    }

    #[tokio::test]
    async fn test_deselect_and_clear() {
        let selection = SelectionManager::new(EventBus::new(16));
        let session = settled(&["A", "B", "C"], ScanStatus::Complete);
        let view = selection.sync(&session).await;
        selection.select_all(&view).await;
        assert!(selection.set_selected(&id_of(&session, "B"), false, &view).await);

        let state = selection.state(session.results.as_slice()).await;
        assert_eq!(state.selected_ids, vec![id_of(&session, "A"), id_of(&session, "C")]);

        selection.clear().await;
        assert!(selection.state(&[]).await.selected_ids.is_empty());
    }
}
