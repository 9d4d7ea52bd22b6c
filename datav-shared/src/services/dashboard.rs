/// Dashboard lifecycle
///
/// # State Machine
///
/// ```text
/// nonexistent ──save (no id) / import──▶ active ──delete──▶ gone
///                                         │  ▲
///                                         └──┘ save (id), guarded by affected rows
/// ```
///
/// # Authority
///
/// The owning team sent by a client on update is ignored; it is re-read from
/// storage before the edit check. Only the creator and creation time are
/// stamped on create; on update they are kept as stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use super::team::HOME_DASHBOARD_PREFIX;
use super::{delete_dashboard_cascade, team_member_of, tenant_role_of};
use crate::audit::AuditSink;
use crate::auth::acl::{self, AclError};
use crate::auth::resolve_row_visibility;
use crate::config::DashboardConfig;
use crate::error::{CoreError, CoreResult};
use crate::history::HistoryRecorder;
use crate::models::dashboard::new_dashboard_id;
use crate::models::{
    AuditAction, AuditEntry, Dashboard, DashboardHistory, DashboardListing, DashboardRow,
    DashboardSummary, TeamId, TenantId, User, UserId, VisibleTo,
};
use crate::store::{Store, StoreError};

/// Save request
///
/// Without an `id` a new dashboard is created; with one, that dashboard is
/// updated.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveDashboard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,

    /// Owning team; only honoured on create
    pub owned_by: TeamId,

    #[serde(default)]
    pub visible_to: VisibleTo,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Layout payload; must be a JSON object
    pub data: JsonValue,

    /// Change description stored with the history snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
}

/// Dashboard operations
pub struct DashboardService {
    store: Arc<dyn Store>,
    history: HistoryRecorder,
    audit: Arc<dyn AuditSink>,
    config: DashboardConfig,
}

impl DashboardService {
    pub fn new(
        store: Arc<dyn Store>,
        history: HistoryRecorder,
        audit: Arc<dyn AuditSink>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            store,
            history,
            audit,
            config,
        }
    }

    /// Creates or updates a dashboard and returns its ID
    pub async fn save(&self, req: SaveDashboard, user: &User) -> CoreResult<String> {
        match req.id.clone().filter(|id| !id.is_empty()) {
            None => self.create(new_dashboard_id(), req, user).await,
            Some(id) => self.update(id, req, user).await,
        }
    }

    /// Creates a dashboard under a caller-chosen ID
    ///
    /// An ID already in use is a conflict, never an overwrite. Home
    /// dashboard IDs are reserved.
    pub async fn import(&self, req: SaveDashboard, user: &User) -> CoreResult<String> {
        let id = req
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| CoreError::Validation("import requires a dashboard id".to_string()))?;
        if id.starts_with(HOME_DASHBOARD_PREFIX) {
            return Err(CoreError::Validation(format!(
                "dashboard ids starting with {} are reserved for team home dashboards",
                HOME_DASHBOARD_PREFIX
            )));
        }
        self.create(id, req, user).await
    }

    async fn create(&self, id: String, req: SaveDashboard, user: &User) -> CoreResult<String> {
        let now = Utc::now();

        let member = team_member_of(self.store.as_ref(), req.owned_by, Some(user)).await?;
        acl::can_edit_dashboard(req.owned_by, member.as_ref())?;

        let (dashboard, row) = build(id, &req, user.id, now, now)?;

        self.store
            .insert_dashboard(&row)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;

        info!(
            dashboard_id = %dashboard.id,
            team_id = dashboard.owned_by,
            user_id = user.id,
            "Dashboard created"
        );

        self.record_history(dashboard, req.changes, user);
        Ok(row.id)
    }

    async fn update(&self, id: String, req: SaveDashboard, user: &User) -> CoreResult<String> {
        let current = self
            .store
            .find_dashboard(&id)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;

        let member = team_member_of(self.store.as_ref(), current.owned_by, Some(user)).await?;
        acl::can_edit_dashboard(current.owned_by, member.as_ref())?;

        let req = SaveDashboard {
            owned_by: current.owned_by,
            ..req
        };
        let (mut dashboard, row) = build(id, &req, current.created_by, current.created, Utc::now())?;
        dashboard.weight = current.weight;

        let affected = self.store.update_dashboard(&row).await?;
        if affected == 0 {
            return Err(CoreError::not_found("dashboard"));
        }

        info!(
            dashboard_id = %dashboard.id,
            team_id = dashboard.owned_by,
            user_id = user.id,
            "Dashboard updated"
        );

        self.record_history(dashboard, req.changes, user);
        Ok(row.id)
    }

    fn record_history(&self, dashboard: Dashboard, changes: Option<String>, user: &User) {
        let entry = DashboardHistory {
            dashboard_id: dashboard.id.clone(),
            changes,
            created_by: user.id,
            created: dashboard.updated,
            snapshot: dashboard,
        };
        self.history.record(entry);
    }

    /// Fetches a dashboard the user is allowed to see
    pub async fn fetch(&self, id: &str, user: Option<&User>) -> CoreResult<Dashboard> {
        let row = self
            .store
            .find_dashboard(id)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;

        // dashboards of an archived team go with it
        match self.store.find_team(row.owned_by).await {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(CoreError::not_found("dashboard")),
            Err(e) => return Err(e.into()),
        }

        resolve_row_visibility(self.store.as_ref(), &row, user)
            .await?
            .into_result()?;

        Ok(row.decode()?)
    }

    /// Lists the dashboards of a team
    pub async fn team_dashboards(
        &self,
        team_id: TeamId,
        user: Option<&User>,
    ) -> CoreResult<Vec<DashboardSummary>> {
        let team = self
            .store
            .find_team(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let member = team_member_of(self.store.as_ref(), team_id, user).await?;
        acl::can_view_team(&team, member.as_ref())?;

        Ok(self.store.team_dashboards(team_id).await?)
    }

    /// Searches dashboards across the teams of a tenant the user can see
    ///
    /// Visible teams are the user's own teams in the tenant plus the
    /// tenant's public teams. Results are ordered by weight, then newest
    /// first.
    pub async fn search(
        &self,
        tenant_id: TenantId,
        user: Option<&User>,
    ) -> CoreResult<Vec<DashboardListing>> {
        let role = tenant_role_of(self.store.as_ref(), tenant_id, user).await?;
        acl::can_view_tenant(role)?;

        let mut team_ids: BTreeSet<TeamId> = BTreeSet::new();
        if let Some(user) = user {
            team_ids.extend(self.store.member_team_ids(tenant_id, user.id).await?);
        }
        team_ids.extend(self.store.public_team_ids(tenant_id).await?);

        if team_ids.is_empty() {
            return Ok(Vec::new());
        }

        let team_ids: Vec<TeamId> = team_ids.into_iter().collect();
        let rows = self.store.search_dashboards(&team_ids).await?;

        debug!(tenant_id, teams = team_ids.len(), results = rows.len(), "Dashboard search");

        rows.into_iter()
            .map(|row| row.decode().map_err(CoreError::from))
            .collect()
    }

    /// Stars a dashboard; starring twice is harmless
    pub async fn star(&self, id: &str, user: Option<&User>) -> CoreResult<()> {
        let user = user.ok_or(AclError::LoginRequired)?;

        let owner = self
            .store
            .dashboard_owner(id)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;
        let team = self
            .store
            .find_team(owner)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let member = team_member_of(self.store.as_ref(), owner, Some(user)).await?;
        acl::can_view_team(&team, member.as_ref())?;

        self.store.insert_star(user.id, id, Utc::now()).await?;
        Ok(())
    }

    /// Removes a star; removing a missing star is harmless
    pub async fn unstar(&self, id: &str, user: Option<&User>) -> CoreResult<()> {
        let user = user.ok_or(AclError::LoginRequired)?;
        self.store.delete_star(user.id, id).await?;
        Ok(())
    }

    pub async fn is_starred(&self, id: &str, user: Option<&User>) -> CoreResult<bool> {
        match user {
            Some(user) => Ok(self.store.is_starred(user.id, id).await?),
            None => Ok(false),
        }
    }

    /// IDs of the dashboards the user starred
    pub async fn starred(&self, user: Option<&User>) -> CoreResult<Vec<String>> {
        match user {
            Some(user) => Ok(self.store.starred_dashboards(user.id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Deletes a dashboard and its star marks
    ///
    /// Refused up front, before any lookup, when deletion is disabled.
    pub async fn delete(&self, id: &str, user: &User) -> CoreResult<()> {
        if !self.config.enable_delete {
            return Err(AclError::DeleteDisabled.into());
        }

        let row = self
            .store
            .find_dashboard(id)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;

        let member = team_member_of(self.store.as_ref(), row.owned_by, Some(user)).await?;
        acl::can_edit_dashboard(row.owned_by, member.as_ref())?;

        let mut tx = self.store.begin().await?;
        let removed = delete_dashboard_cascade(tx.as_mut(), id).await?;
        if removed == 0 {
            return Err(CoreError::not_found("dashboard"));
        }
        tx.commit().await?;

        info!(dashboard_id = %id, user_id = user.id, "Dashboard deleted");

        self.audit
            .record(AuditEntry::new(
                user.id,
                AuditAction::DeleteDashboard,
                id,
                snapshot_of(&row),
            ))
            .await;

        Ok(())
    }

    /// Changes a dashboard's search weight; tenant admins only
    pub async fn update_weight(&self, id: &str, weight: i32, user: &User) -> CoreResult<()> {
        let owner = self
            .store
            .dashboard_owner(id)
            .await
            .map_err(|e| CoreError::from_store(e, "dashboard"))?;
        let tenant_id = self
            .store
            .tenant_of_team(owner)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let role = tenant_role_of(self.store.as_ref(), tenant_id, Some(user)).await?;
        acl::can_edit_tenant(role)?;

        let affected = self.store.update_dashboard_weight(id, weight).await?;
        if affected == 0 {
            return Err(CoreError::not_found("dashboard"));
        }

        info!(dashboard_id = %id, weight, user_id = user.id, "Dashboard weight updated");
        Ok(())
    }
}

/// Validates a save request and produces both forms of the dashboard
fn build(
    id: String,
    req: &SaveDashboard,
    created_by: UserId,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
) -> CoreResult<(Dashboard, DashboardRow)> {
    req.validate()?;

    if !req.data.is_object() {
        return Err(CoreError::Validation(
            "dashboard data must be a JSON object".to_string(),
        ));
    }

    let dashboard = Dashboard {
        id,
        title: req.title.clone(),
        owned_by: req.owned_by,
        visible_to: req.visible_to,
        tags: req.tags.clone(),
        data: req.data.clone(),
        weight: 0,
        created_by,
        created,
        updated,
    };
    let row = dashboard.encode()?;
    Ok((dashboard, row))
}

/// Pre-delete snapshot for the audit log, tolerating undecodable payloads
fn snapshot_of(row: &DashboardRow) -> JsonValue {
    match row.decode() {
        Ok(dashboard) => serde_json::to_value(&dashboard).unwrap_or_default(),
        Err(e) => {
            warn!(dashboard_id = %row.id, error = %e, "Stored dashboard is not decodable");
            json!({
                "id": row.id,
                "title": row.title,
                "ownedBy": row.owned_by,
                "data": row.data,
            })
        }
    }
}
