use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::models::ScanResult;

/// Session-local scan state: full history (newest first) plus the
/// current-result pointer. Nothing here outlives the process.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub history: Vec<ScanResult>,
    pub current: Option<ScanResult>,
}

/// In-memory scan result store.
///
/// Every mutation publishes a fresh snapshot on a watch channel, so the
/// presentation layer subscribes to changes instead of the store knowing
/// anything about rendering.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<Mutex<HistorySnapshot>>,
    tx: Arc<watch::Sender<HistorySnapshot>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HistorySnapshot::default());
        Self {
            inner: Arc::new(Mutex::new(HistorySnapshot::default())),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HistorySnapshot> {
        self.tx.subscribe()
    }

    /// Prepend a result and make it current. Results are never
    /// deduplicated or reordered; nothing bounds the list but memory.
    pub async fn append(&self, result: ScanResult) -> HistorySnapshot {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            inner.history.insert(0, result.clone());
            inner.current = Some(result);
            inner.clone()
        };
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Empty the history. The current result is left untouched.
    pub async fn clear(&self) -> HistorySnapshot {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            inner.history.clear();
            inner.clone()
        };
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    /// A new scan session clears the current result but never the history.
    pub async fn start_new_session(&self) -> HistorySnapshot {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            inner.current = None;
            inner.clone()
        };
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    pub async fn snapshot(&self) -> HistorySnapshot {
        self.inner.lock().await.clone()
    }

    /// Look a result up by id, checking the current pointer first.
    pub async fn find(&self, id: &str) -> Option<ScanResult> {
        let inner = self.inner.lock().await;
        if let Some(current) = &inner.current {
            if current.id == id {
                return Some(current.clone());
            }
        }
        inner.history.iter().find(|r| r.id == id).cloned()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_prepends_and_sets_current() {
        let store = HistoryStore::new();
        let a = ScanResult::from_payload("first");
        let b = ScanResult::from_payload("second");

        store.append(a.clone()).await;
        let snapshot = store.append(b.clone()).await;

        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0], b);
        assert_eq!(snapshot.history[1], a);
        assert_eq!(snapshot.current, Some(b));
    }

    #[tokio::test]
    async fn current_equals_head_after_append() {
        let store = HistoryStore::new();
        let result = ScanResult::from_payload("https://example.com");
        let snapshot = store.append(result).await;
        assert_eq!(snapshot.current.as_ref(), snapshot.history.first());
    }

    #[tokio::test]
    async fn clear_leaves_current_untouched() {
        let store = HistoryStore::new();
        let result = ScanResult::from_payload("keep me");
        store.append(result.clone()).await;

        let snapshot = store.clear().await;
        assert!(snapshot.history.is_empty());
        assert_eq!(snapshot.current, Some(result));
    }

    #[tokio::test]
    async fn clear_on_empty_history_is_a_noop() {
        let store = HistoryStore::new();
        let snapshot = store.clear().await;
        assert!(snapshot.history.is_empty());
        assert!(snapshot.current.is_none());
    }

    #[tokio::test]
    async fn new_session_clears_current_but_keeps_history() {
        let store = HistoryStore::new();
        let result = ScanResult::from_payload("old scan");
        store.append(result.clone()).await;

        let snapshot = store.start_new_session().await;
        assert!(snapshot.current.is_none());
        assert_eq!(snapshot.history, vec![result]);
    }

    #[tokio::test]
    async fn find_checks_current_and_history() {
        let store = HistoryStore::new();
        let a = ScanResult::from_payload("aaa");
        let b = ScanResult::from_payload("bbb");
        store.append(a.clone()).await;
        store.append(b.clone()).await;

        assert_eq!(store.find(&a.id).await, Some(a));
        assert_eq!(store.find(&b.id).await, Some(b));
        assert_eq!(store.find("missing").await, None);
    }

    #[tokio::test]
    async fn mutations_notify_subscribers() {
        let store = HistoryStore::new();
        let mut rx = store.subscribe();

        store.append(ScanResult::from_payload("notify")).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().history.len(), 1);

        store.clear().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().history.is_empty());
    }
}
