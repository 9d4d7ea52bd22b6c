/// Dashboard history recorder
///
/// Every successful dashboard save produces one [`DashboardHistory`]
/// snapshot. Snapshots go through a bounded queue to a single consumer task
/// that appends them to storage, so saving never waits on history writes.
///
/// ```text
/// save ──record()──▶ [ bounded queue ] ──▶ consumer ──▶ store.insert_history
///        (never blocks)                      (errors logged)
/// ```
///
/// # Overflow
///
/// When the queue is full the new snapshot is dropped and a warning is
/// logged. Producers never see consumer failures.
///
/// # Shutdown
///
/// The consumer drains whatever is queued and exits once every
/// [`HistoryRecorder`] clone has been dropped.

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::models::DashboardHistory;
use crate::store::Store;

/// Producer handle; cheap to clone
#[derive(Clone)]
pub struct HistoryRecorder {
    tx: mpsc::Sender<DashboardHistory>,
}

impl HistoryRecorder {
    /// Creates a recorder and the receiving end of its queue
    ///
    /// A capacity of zero is raised to one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DashboardHistory>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Creates a recorder with a consumer task persisting into `store`
    pub fn spawn(store: Arc<dyn Store>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (recorder, rx) = Self::channel(capacity);
        let handle = tokio::spawn(consume(store, rx));
        (recorder, handle)
    }

    /// Enqueues a snapshot without waiting
    ///
    /// Returns false if the snapshot was dropped.
    pub fn record(&self, entry: DashboardHistory) -> bool {
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    dashboard_id = %entry.dashboard_id,
                    "History queue full, dropping snapshot"
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(
                    dashboard_id = %entry.dashboard_id,
                    "History consumer stopped, dropping snapshot"
                );
                false
            }
        }
    }
}

/// Persists queued snapshots until every producer is gone
pub async fn consume(store: Arc<dyn Store>, mut rx: mpsc::Receiver<DashboardHistory>) {
    while let Some(entry) = rx.recv().await {
        match store.insert_history(&entry).await {
            Ok(()) => debug!(dashboard_id = %entry.dashboard_id, "Recorded dashboard history"),
            Err(e) => error!(
                dashboard_id = %entry.dashboard_id,
                error = %e,
                "Failed to record dashboard history"
            ),
        }
    }

    debug!("History consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dashboard, VisibleTo};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(id: &str) -> DashboardHistory {
        let now = Utc::now();
        DashboardHistory {
            dashboard_id: id.to_string(),
            changes: None,
            snapshot: Dashboard {
                id: id.to_string(),
                title: "Overview".to_string(),
                owned_by: 1,
                visible_to: VisibleTo::Team,
                tags: Default::default(),
                data: json!({}),
                weight: 0,
                created_by: 1,
                created: now,
                updated: now,
            },
            created_by: 1,
            created: now,
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (recorder, mut rx) = HistoryRecorder::channel(1);

        assert!(recorder.record(snapshot("d-first")));
        assert!(!recorder.record(snapshot("d-second")));

        assert_eq!(rx.recv().await.unwrap().dashboard_id, "d-first");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_consumer_drains_queue_on_shutdown() {
        let store = MemoryStore::new();
        let (recorder, handle) = HistoryRecorder::spawn(Arc::new(store.clone()), 8);

        recorder.record(snapshot("d-a"));
        recorder.record(snapshot("d-a"));
        drop(recorder);
        handle.await.unwrap();

        assert_eq!(store.history_for("d-a").await.len(), 2);
    }

    #[tokio::test]
    async fn test_consumer_survives_store_failures() {
        let store = MemoryStore::new();
        store.fail_history_writes().await;
        let (recorder, handle) = HistoryRecorder::spawn(Arc::new(store.clone()), 8);

        assert!(recorder.record(snapshot("d-a")));
        drop(recorder);
        handle.await.unwrap();

        assert!(store.history_for("d-a").await.is_empty());
    }

    #[tokio::test]
    async fn test_record_after_consumer_stopped_is_dropped() {
        let (recorder, rx) = HistoryRecorder::channel(4);
        drop(rx);
        assert!(!recorder.record(snapshot("d-a")));
    }
}
