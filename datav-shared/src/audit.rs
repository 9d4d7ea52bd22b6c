/// Audit sink
///
/// Destructive operations report what they removed after committing. The
/// sink is fire-and-forget: a failed audit write is logged and never undoes
/// or fails the operation that produced it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::AuditEntry;
use crate::store::Store;

/// Receives audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Audit sink writing into the `audit_log` table
pub struct StoreAuditSink {
    store: Arc<dyn Store>,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn record(&self, entry: AuditEntry) {
        match self.store.insert_audit(&entry).await {
            Ok(()) => info!(
                actor_id = entry.actor_id,
                action = %entry.action,
                target_id = %entry.target_id,
                "Audit entry recorded"
            ),
            Err(e) => error!(
                actor_id = entry.actor_id,
                action = %entry.action,
                target_id = %entry.target_id,
                error = %e,
                "Failed to record audit entry"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditAction;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_sink_persists_entry() {
        let store = MemoryStore::new();
        let sink = StoreAuditSink::new(Arc::new(store.clone()));

        sink.record(AuditEntry::new(
            3,
            AuditAction::DeleteTeam,
            "12",
            json!({"name": "ops"}),
        ))
        .await;

        let entries = store.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::DeleteTeam);
        assert_eq!(entries[0].target_id, "12");
    }
}
