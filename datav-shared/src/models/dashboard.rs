/// Dashboard, history and star-mark models
///
/// A [`Dashboard`] is the decoded domain value handed to callers. The storage
/// collaborator works with [`DashboardRow`], where the tag set and the layout
/// payload are already encoded as JSON text. Encoding and decoding happen in
/// one place so that malformed payloads are always reported the same way.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE dashboard (
///     id VARCHAR(64) PRIMARY KEY,
///     title VARCHAR(255) NOT NULL,
///     team_id BIGINT NOT NULL,
///     visible_to VARCHAR(16) NOT NULL DEFAULT 'team',
///     created_by BIGINT NOT NULL,
///     tags TEXT NOT NULL DEFAULT '[]',
///     data TEXT NOT NULL,
///     weight INTEGER NOT NULL DEFAULT 0,
///     created TIMESTAMPTZ NOT NULL,
///     updated TIMESTAMPTZ NOT NULL
/// );
///
/// CREATE TABLE star_dashboard (
///     user_id BIGINT NOT NULL,
///     dashboard_id VARCHAR(64) NOT NULL,
///     created TIMESTAMPTZ NOT NULL,
///     PRIMARY KEY (user_id, dashboard_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{TeamId, UserId};

/// Prefix of every dashboard ID
pub const DASHBOARD_ID_PREFIX: &str = "d-";

/// Mints a new dashboard ID: `"d-"` followed by 32 hex characters
pub fn new_dashboard_id() -> String {
    format!("{}{}", DASHBOARD_ID_PREFIX, Uuid::new_v4().simple())
}

/// Audience scope of a dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibleTo {
    /// Owning team members only
    Private,

    /// Owning team members only
    Team,

    /// Every member of the tenant that owns the team
    Tenant,

    /// Everyone, including anonymous users
    #[serde(alias = "all")]
    Public,
}

/// Error returned when a stored visibility value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown visibility: {0}")]
pub struct UnknownVisibility(pub String);

impl VisibleTo {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibleTo::Private => "private",
            VisibleTo::Team => "team",
            VisibleTo::Tenant => "tenant",
            VisibleTo::Public => "public",
        }
    }
}

impl Default for VisibleTo {
    fn default() -> Self {
        VisibleTo::Team
    }
}

impl fmt::Display for VisibleTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibleTo {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(VisibleTo::Private),
            "team" => Ok(VisibleTo::Team),
            "tenant" => Ok(VisibleTo::Tenant),
            "public" | "all" => Ok(VisibleTo::Public),
            other => Err(UnknownVisibility(other.to_string())),
        }
    }
}

/// A dashboard as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Immutable once assigned
    pub id: String,

    pub title: String,

    /// Owning team; the join key for every visibility and ACL decision
    pub owned_by: TeamId,

    pub visible_to: VisibleTo,

    pub tags: BTreeSet<String>,

    /// Layout payload, always a JSON object
    pub data: JsonValue,

    /// Search ranking weight, higher ranks first
    pub weight: i32,

    pub created_by: UserId,

    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

impl Dashboard {
    /// Encodes the tag set and layout payload for storage
    pub fn encode(&self) -> Result<DashboardRow, serde_json::Error> {
        Ok(DashboardRow {
            id: self.id.clone(),
            title: self.title.clone(),
            owned_by: self.owned_by,
            visible_to: self.visible_to,
            tags: serde_json::to_string(&self.tags)?,
            data: serde_json::to_string(&self.data)?,
            weight: self.weight,
            created_by: self.created_by,
            created: self.created,
            updated: self.updated,
        })
    }
}

/// Storage form of a dashboard with tags and layout encoded as JSON text
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub id: String,
    pub title: String,
    pub owned_by: TeamId,
    pub visible_to: VisibleTo,
    pub tags: String,
    pub data: String,
    pub weight: i32,
    pub created_by: UserId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl DashboardRow {
    /// Decodes stored JSON back into a dashboard
    pub fn decode(&self) -> Result<Dashboard, serde_json::Error> {
        Ok(Dashboard {
            id: self.id.clone(),
            title: self.title.clone(),
            owned_by: self.owned_by,
            visible_to: self.visible_to,
            tags: decode_tags(&self.tags)?,
            data: serde_json::from_str(&self.data)?,
            weight: self.weight,
            created_by: self.created_by,
            created: self.created,
            updated: self.updated,
        })
    }
}

/// Decodes a stored tag blob; an empty blob means no tags
pub fn decode_tags(raw: &str) -> Result<BTreeSet<String>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    serde_json::from_str(raw)
}

/// Dashboard entry in a team listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Search result row as returned by storage
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardListingRow {
    pub id: String,
    pub title: String,
    pub owned_by: TeamId,
    pub owner_name: String,
    pub visible_to: VisibleTo,
    pub tags: String,
    pub weight: i32,
    pub created: DateTime<Utc>,
}

/// Dashboard entry in tenant search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardListing {
    pub id: String,
    pub title: String,
    pub owned_by: TeamId,
    pub owner_name: String,
    pub visible_to: VisibleTo,
    pub tags: BTreeSet<String>,
    pub weight: i32,
}

impl DashboardListingRow {
    pub fn decode(self) -> Result<DashboardListing, serde_json::Error> {
        Ok(DashboardListing {
            tags: decode_tags(&self.tags)?,
            id: self.id,
            title: self.title,
            owned_by: self.owned_by,
            owner_name: self.owner_name,
            visible_to: self.visible_to,
            weight: self.weight,
        })
    }
}

/// Immutable snapshot of a dashboard taken at save time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardHistory {
    pub dashboard_id: String,

    /// Free-form description of the change, supplied by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,

    pub snapshot: Dashboard,

    pub created_by: UserId,

    pub created: DateTime<Utc>,
}

/// A user's bookmark on a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarMark {
    pub user_id: UserId,
    pub dashboard_id: String,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dashboard {
        let now = Utc::now();
        Dashboard {
            id: new_dashboard_id(),
            title: "Overview".to_string(),
            owned_by: 3,
            visible_to: VisibleTo::Tenant,
            tags: ["prod".to_string(), "api".to_string()].into_iter().collect(),
            data: json!({"panels": [{"id": 1}]}),
            weight: 2,
            created_by: 9,
            created: now,
            updated: now,
        }
    }

    #[test]
    fn test_new_dashboard_id_format() {
        let id = new_dashboard_id();
        assert!(id.starts_with(DASHBOARD_ID_PREFIX));
        assert!(id.len() - DASHBOARD_ID_PREFIX.len() >= 20);
        assert_ne!(id, new_dashboard_id());
    }

    #[test]
    fn test_encoded_row_decodes_to_same_dashboard() {
        let dash = sample();
        let row = dash.encode().unwrap();
        assert_eq!(row.tags, "[\"api\",\"prod\"]");
        assert_eq!(row.decode().unwrap(), dash);
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let mut row = sample().encode().unwrap();
        row.data = "{not json".to_string();
        assert!(row.decode().is_err());
    }

    #[test]
    fn test_empty_tag_blob_is_empty_set() {
        assert!(decode_tags("").unwrap().is_empty());
        assert!(decode_tags("[]").unwrap().is_empty());
    }

    #[test]
    fn test_visible_to_accepts_legacy_all() {
        assert_eq!("all".parse::<VisibleTo>(), Ok(VisibleTo::Public));
        let parsed: VisibleTo = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(parsed, VisibleTo::Public);
        assert!("everyone".parse::<VisibleTo>().is_err());
    }

    #[test]
    fn test_dashboard_json_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ownedBy"], 3);
        assert_eq!(json["visibleTo"], "tenant");
        assert_eq!(json["createdBy"], 9);
    }
}
