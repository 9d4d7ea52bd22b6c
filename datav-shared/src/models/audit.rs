/// Audit log entries
///
/// Audit entries are written after destructive operations commit. They carry
/// the pre-delete snapshot so that a removed resource can be inspected later.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_log (
///     id BIGSERIAL PRIMARY KEY,
///     actor_id BIGINT NOT NULL,
///     action VARCHAR(50) NOT NULL,
///     target_id VARCHAR(64) NOT NULL,
///     snapshot TEXT NOT NULL,
///     created TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::UserId;

/// Kind of audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DeleteDashboard,
    DeleteTeam,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::DeleteDashboard => "delete_dashboard",
            AuditAction::DeleteTeam => "delete_team",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub actor_id: UserId,
    pub action: AuditAction,
    pub target_id: String,
    pub snapshot: JsonValue,
    pub created: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time
    pub fn new(
        actor_id: UserId,
        action: AuditAction,
        target_id: impl Into<String>,
        snapshot: JsonValue,
    ) -> Self {
        Self {
            actor_id,
            action,
            target_id: target_id.into(),
            snapshot,
            created: Utc::now(),
        }
    }
}
