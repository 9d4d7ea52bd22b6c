//! Shared fixtures for the lifecycle integration tests
//!
//! Every test gets its own [`MemoryStore`] with services wired the way the
//! API wires them: a spawned history consumer and a store-backed audit sink.

#![allow(dead_code)]

use datav_shared::audit::StoreAuditSink;
use datav_shared::config::CoreConfig;
use datav_shared::history::HistoryRecorder;
use datav_shared::models::{Role, Team, TeamId, TenantId, User, VisibleTo};
use datav_shared::services::{CreateTeam, DashboardService, SaveDashboard, TeamService};
use datav_shared::store::{MemoryStore, Store};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const TENANT: TenantId = 1;
pub const OTHER_TENANT: TenantId = 2;

pub fn user(id: i64, name: &str) -> User {
    User::new(id, name)
}

/// Test context holding the store and both services
pub struct TestContext {
    pub store: MemoryStore,
    pub dashboards: DashboardService,
    pub teams: TeamService,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(CoreConfig::default()).await
    }

    pub async fn with_config(config: CoreConfig) -> Self {
        let store = MemoryStore::new();
        let (history, _consumer) =
            HistoryRecorder::spawn(Arc::new(store.clone()), config.history.queue_capacity);
        Self::assemble(store, history, config)
    }

    /// Context whose history queue is supplied by the caller
    pub fn with_history(history: HistoryRecorder) -> Self {
        Self::assemble(MemoryStore::new(), history, CoreConfig::default())
    }

    fn assemble(store: MemoryStore, history: HistoryRecorder, config: CoreConfig) -> Self {
        let shared = Arc::new(store.clone());
        let audit = Arc::new(StoreAuditSink::new(shared.clone()));

        Self {
            dashboards: DashboardService::new(
                shared.clone(),
                history,
                audit.clone(),
                config.dashboard,
            ),
            teams: TeamService::new(shared, audit),
            store,
        }
    }

    /// Adds `owner` to the tenant and creates a team owned by them
    pub async fn create_team(&self, tenant_id: TenantId, name: &str, owner: &User) -> Team {
        if self
            .store
            .tenant_role(tenant_id, owner.id)
            .await
            .expect("memory store lookups do not fail")
            .is_none()
        {
            self.store.add_tenant_member(tenant_id, owner.id, Role::Admin).await;
        }

        self.teams
            .create(
                tenant_id,
                CreateTeam {
                    name: name.to_string(),
                    brief: String::new(),
                },
                owner,
            )
            .await
            .expect("team creation should succeed")
    }

    /// Adds a user to a team and to the team's tenant
    pub async fn join(&self, team: &Team, user: &User, role: Role) {
        if self
            .store
            .tenant_role(team.tenant_id, user.id)
            .await
            .expect("memory store lookups do not fail")
            .is_none()
        {
            self.store.add_tenant_member(team.tenant_id, user.id, Role::Viewer).await;
        }
        self.store
            .add_team_member(team.id, user.id, role)
            .await
            .expect("team should exist");
    }

    /// Creates a dashboard and returns its ID
    pub async fn save(
        &self,
        team_id: TeamId,
        title: &str,
        visible_to: VisibleTo,
        user: &User,
    ) -> String {
        self.dashboards
            .save(save_request(None, team_id, title, visible_to), user)
            .await
            .expect("dashboard save should succeed")
    }
}

pub fn save_request(
    id: Option<&str>,
    team_id: TeamId,
    title: &str,
    visible_to: VisibleTo,
) -> SaveDashboard {
    SaveDashboard {
        id: id.map(str::to_string),
        title: title.to_string(),
        owned_by: team_id,
        visible_to,
        tags: ["prod".to_string()].into_iter().collect(),
        data: json!({"panels": [{"id": 1, "type": "graph"}]}),
        changes: None,
    }
}

/// Polls `check` until it returns true or two seconds pass
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
