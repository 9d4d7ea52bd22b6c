/// Team, team member, side menu and datasource models
///
/// # Schema
///
/// ```sql
/// CREATE TABLE team (
///     id BIGSERIAL PRIMARY KEY,
///     tenant_id BIGINT NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     brief TEXT NOT NULL DEFAULT '',
///     is_public BOOLEAN NOT NULL DEFAULT FALSE,
///     status SMALLINT NOT NULL DEFAULT 0,
///     sync_users BOOLEAN NOT NULL DEFAULT FALSE,
///     sidemenu TEXT NOT NULL DEFAULT '[]',
///     created_by BIGINT NOT NULL,
///     created TIMESTAMPTZ NOT NULL,
///     updated TIMESTAMPTZ NOT NULL,
///     UNIQUE (tenant_id, name)
/// );
///
/// CREATE TABLE team_member (
///     tenant_id BIGINT NOT NULL,
///     team_id BIGINT NOT NULL,
///     user_id BIGINT NOT NULL,
///     role VARCHAR(20) NOT NULL,
///     created TIMESTAMPTZ NOT NULL,
///     updated TIMESTAMPTZ NOT NULL,
///     PRIMARY KEY (team_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::role::Role;
use super::{TeamId, TenantId, UserId};

/// Lifecycle status of a team
///
/// A deleted team keeps its row but is invisible to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Normal,
    Deleted,
}

impl TeamStatus {
    /// Storage code for the status column
    pub fn code(&self) -> i16 {
        match self {
            TeamStatus::Normal => 0,
            TeamStatus::Deleted => 1,
        }
    }

    /// Parses the status column; unknown codes are treated as deleted
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => TeamStatus::Normal,
            _ => TeamStatus::Deleted,
        }
    }
}

/// A group of users sharing dashboards and datasources within a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub brief: String,
    pub tenant_id: TenantId,
    pub is_public: bool,
    pub status: TeamStatus,
    pub sync_users: bool,
    pub created_by: UserId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Team {
    pub fn is_deleted(&self) -> bool {
        self.status == TeamStatus::Deleted
    }
}

/// Input for inserting a team row
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub tenant_id: TenantId,
    pub name: String,
    pub brief: String,
    pub created_by: UserId,
    pub created: DateTime<Utc>,
}

/// A user's membership in a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub role: Role,
}

/// One entry of a team's side menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub url: String,
    pub title: String,
    pub dashboard_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: JsonValue,
}

/// A team's side menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideMenu {
    pub team_id: TeamId,
    pub team_name: String,
    pub data: Vec<MenuItem>,
}

/// Datasource type created for every new team
pub const DATASOURCE_TESTDATA: &str = "testdata";

/// A team-owned datasource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub team_id: TeamId,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Input for inserting a datasource row
#[derive(Debug, Clone)]
pub struct NewDatasource {
    pub name: String,
    pub kind: String,
    pub url: String,
    pub team_id: TeamId,
    pub created: DateTime<Utc>,
}
