/// Team lifecycle
///
/// # Creation
///
/// One transaction seeds everything a new team needs:
///
/// ```text
/// team row
///   -> creator as SuperAdmin member
///   -> "TestData" datasource
///   -> home dashboard d-home-<team id>, team visible
///   -> side menu [Home -> home dashboard]
/// ```
///
/// # Deletion
///
/// One transaction removes dependents before the team row, in this order:
/// variables, every dashboard with its star marks, any remaining dashboard
/// rows, datasources, members, the team. A failure at any step leaves the
/// team untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

use super::{delete_dashboard_cascade, team_member_of, tenant_role_of};
use crate::audit::AuditSink;
use crate::auth::acl;
use crate::error::{CoreError, CoreResult};
use crate::models::team::DATASOURCE_TESTDATA;
use crate::models::{
    AuditAction, AuditEntry, Dashboard, Datasource, MenuItem, NewDatasource, NewTeam, Role,
    SideMenu, Team, TeamId, TeamMember, TenantId, User, UserId, VisibleTo,
};
use crate::store::{Store, StoreError, StoreTx};

/// Name of the datasource created with every team
pub const DEFAULT_DATASOURCE_NAME: &str = "TestData";

/// Team creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTeam {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,

    #[serde(default)]
    pub brief: String,
}

/// Prefix of every home dashboard ID
pub const HOME_DASHBOARD_PREFIX: &str = "d-home-";

/// ID of a team's home dashboard
pub fn home_dashboard_id(team_id: TeamId) -> String {
    format!("{}{}", HOME_DASHBOARD_PREFIX, team_id)
}

/// Built-in home dashboard bound to a team
fn home_dashboard(team_id: TeamId, created_by: UserId, now: DateTime<Utc>) -> Dashboard {
    Dashboard {
        id: home_dashboard_id(team_id),
        title: "Home".to_string(),
        owned_by: team_id,
        visible_to: VisibleTo::Team,
        tags: Default::default(),
        data: json!({
            "title": "Home",
            "editable": true,
            "panels": [],
            "variables": [],
            "styles": {"bg": {"url": ""}},
        }),
        weight: 0,
        created_by,
        created: now,
        updated: now,
    }
}

fn default_side_menu(dashboard_id: &str) -> Vec<MenuItem> {
    vec![MenuItem {
        url: "/home".to_string(),
        title: "Home".to_string(),
        dashboard_id: dashboard_id.to_string(),
        icon: Some("FaHome".to_string()),
        children: JsonValue::Null,
    }]
}

/// Team operations
pub struct TeamService {
    store: Arc<dyn Store>,
    audit: Arc<dyn AuditSink>,
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Creates a team in a tenant the user belongs to
    pub async fn create(
        &self,
        tenant_id: TenantId,
        req: CreateTeam,
        user: &User,
    ) -> CoreResult<Team> {
        let role = tenant_role_of(self.store.as_ref(), tenant_id, Some(user)).await?;
        acl::can_view_tenant(role)?;
        req.validate()?;

        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let team_id = seed_team(tx.as_mut(), tenant_id, &req, user.id, now).await?;
        tx.commit().await?;

        info!(team_id, tenant_id, user_id = user.id, name = %req.name, "Team created");

        self.store
            .find_team(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))
    }

    /// Fetches a team the user can see
    pub async fn get(&self, team_id: TeamId, user: Option<&User>) -> CoreResult<Team> {
        let team = self
            .store
            .find_team(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let member = team_member_of(self.store.as_ref(), team_id, user).await?;
        acl::can_view_team(&team, member.as_ref())?;
        Ok(team)
    }

    pub async fn side_menu(&self, team_id: TeamId, user: Option<&User>) -> CoreResult<SideMenu> {
        let team = self.get(team_id, user).await?;
        let data = self
            .store
            .side_menu(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        Ok(SideMenu {
            team_id,
            team_name: team.name,
            data,
        })
    }

    pub async fn datasources(
        &self,
        team_id: TeamId,
        user: Option<&User>,
    ) -> CoreResult<Vec<Datasource>> {
        self.get(team_id, user).await?;
        Ok(self.store.team_datasources(team_id).await?)
    }

    /// Deletes a team and every row that depends on it
    pub async fn delete(&self, team_id: TeamId, user: &User) -> CoreResult<()> {
        let team = self
            .store
            .find_team(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let member = team_member_of(self.store.as_ref(), team_id, Some(user)).await?;
        acl::can_manage_team(team_id, member.as_ref())?;

        let mut tx = self.store.begin().await?;
        cascade_team(tx.as_mut(), team_id).await?;
        tx.commit().await?;

        info!(team_id, user_id = user.id, "Team deleted");

        self.audit
            .record(AuditEntry::new(
                user.id,
                AuditAction::DeleteTeam,
                team_id.to_string(),
                serde_json::to_value(&team).unwrap_or_default(),
            ))
            .await;

        Ok(())
    }

    /// Marks a team deleted without removing any rows
    pub async fn archive(&self, team_id: TeamId, user: &User) -> CoreResult<()> {
        self.store
            .find_team(team_id)
            .await
            .map_err(|e| CoreError::from_store(e, "team"))?;

        let member = team_member_of(self.store.as_ref(), team_id, Some(user)).await?;
        acl::can_manage_team(team_id, member.as_ref())?;

        if self.store.mark_team_deleted(team_id, Utc::now()).await? == 0 {
            return Err(CoreError::not_found("team"));
        }

        info!(team_id, user_id = user.id, "Team archived");
        Ok(())
    }
}

async fn seed_team(
    tx: &mut dyn StoreTx,
    tenant_id: TenantId,
    req: &CreateTeam,
    created_by: UserId,
    now: DateTime<Utc>,
) -> CoreResult<TeamId> {
    let team_id = tx
        .insert_team(&NewTeam {
            tenant_id,
            name: req.name.clone(),
            brief: req.brief.clone(),
            created_by,
            created: now,
        })
        .await
        .map_err(|e| CoreError::from_store(e, "team"))?;

    tx.insert_team_member(
        tenant_id,
        &TeamMember {
            team_id,
            user_id: created_by,
            role: Role::SuperAdmin,
        },
        now,
    )
    .await?;

    tx.insert_datasource(&NewDatasource {
        name: DEFAULT_DATASOURCE_NAME.to_string(),
        kind: DATASOURCE_TESTDATA.to_string(),
        url: String::new(),
        team_id,
        created: now,
    })
    .await?;

    let home = home_dashboard(team_id, created_by, now);
    let row = home
        .encode()
        .map_err(|e| CoreError::Infrastructure(format!("encode home dashboard: {}", e)))?;
    if !tx.insert_dashboard_if_absent(&row).await? {
        debug!(dashboard_id = %row.id, "Home dashboard already exists, reusing it");
    }

    let menu = serde_json::to_string(&default_side_menu(&home.id))
        .map_err(|e| CoreError::Infrastructure(format!("encode side menu: {}", e)))?;
    tx.set_side_menu(team_id, &menu).await?;

    Ok(team_id)
}

async fn cascade_team(tx: &mut dyn StoreTx, team_id: TeamId) -> Result<(), StoreError> {
    let variables = tx.delete_team_variables(team_id).await?;

    let dashboard_ids = tx.team_dashboard_ids(team_id).await?;
    for id in &dashboard_ids {
        delete_dashboard_cascade(tx, id).await?;
    }
    tx.delete_team_dashboards(team_id).await?;

    let datasources = tx.delete_team_datasources(team_id).await?;
    let members = tx.delete_team_members(team_id).await?;

    if tx.delete_team_row(team_id).await? == 0 {
        return Err(StoreError::NotFound);
    }

    debug!(
        team_id,
        variables,
        dashboards = dashboard_ids.len(),
        datasources,
        members,
        "Team cascade complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_dashboard_shape() {
        let home = home_dashboard(12, 3, Utc::now());
        assert_eq!(home.id, "d-home-12");
        assert_eq!(home.owned_by, 12);
        assert_eq!(home.visible_to, VisibleTo::Team);
        assert!(home.data.is_object());
    }

    #[test]
    fn test_default_side_menu_points_at_home() {
        let menu = default_side_menu("d-home-12");
        assert_eq!(menu.len(), 1);
        assert_eq!(menu[0].title, "Home");
        assert_eq!(menu[0].url, "/home");
        assert_eq!(menu[0].icon.as_deref(), Some("FaHome"));
        assert_eq!(menu[0].dashboard_id, "d-home-12");
    }

    #[test]
    fn test_create_team_validation() {
        let ok = CreateTeam {
            name: "ops".to_string(),
            brief: String::new(),
        };
        assert!(ok.validate().is_ok());

        let empty = CreateTeam {
            name: String::new(),
            brief: String::new(),
        };
        assert!(empty.validate().is_err());
    }
}
