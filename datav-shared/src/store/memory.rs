/// In-memory storage adapter
///
/// Keeps every table in a single [`MemoryState`] behind an async mutex. It is
/// used by the test suites and for running the API without a database.
///
/// # Transactions
///
/// A transaction holds the state lock for its whole lifetime and works on a
/// private copy. Commit swaps the copy in; dropping the transaction discards
/// it. Transactions are therefore fully serialized, which is stricter than
/// PostgreSQL's default isolation but observably equivalent for this core.
///
/// # Fault injection
///
/// [`MemoryStore::fail_dashboard_delete`] and
/// [`MemoryStore::fail_history_writes`] make specific writes fail, so that
/// rollback and best-effort paths can be exercised.
/// [`MemoryStore::vanish_on_next_update`] replays a delete racing an update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreError, StoreTx};
use crate::models::{
    AuditEntry, DashboardHistory, DashboardListingRow, DashboardRow, DashboardSummary,
    Datasource, MenuItem, NewDatasource, NewTeam, Role, Team, TeamId, TeamMember, TeamStatus,
    TenantId, UserId,
};

/// Failures to inject into otherwise healthy writes
#[derive(Debug, Clone, Default)]
struct Faults {
    dashboard_delete: HashSet<String>,
    dashboard_vanish: HashSet<String>,
    history_insert: bool,
}

/// All tables of the in-memory store
#[derive(Debug, Clone)]
struct MemoryState {
    teams: BTreeMap<TeamId, Team>,
    side_menus: HashMap<TeamId, String>,
    team_members: BTreeMap<(TeamId, UserId), (TenantId, Role)>,
    tenant_members: HashMap<(TenantId, UserId), Role>,
    datasources: BTreeMap<i64, Datasource>,
    variables: Vec<(TeamId, String)>,
    dashboards: BTreeMap<String, DashboardRow>,
    stars: BTreeMap<(UserId, String), DateTime<Utc>>,
    history: Vec<DashboardHistory>,
    audit: Vec<AuditEntry>,
    next_team_id: TeamId,
    next_datasource_id: i64,
    faults: Faults,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            teams: BTreeMap::new(),
            side_menus: HashMap::new(),
            team_members: BTreeMap::new(),
            tenant_members: HashMap::new(),
            datasources: BTreeMap::new(),
            variables: Vec::new(),
            dashboards: BTreeMap::new(),
            stars: BTreeMap::new(),
            history: Vec::new(),
            audit: Vec::new(),
            next_team_id: 1,
            next_datasource_id: 1,
            faults: Faults::default(),
        }
    }
}

impl MemoryState {
    fn live_team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.get(&team_id).filter(|t| !t.is_deleted())
    }

    fn insert_team(&mut self, team: &NewTeam) -> Result<TeamId, StoreError> {
        let duplicate = self
            .teams
            .values()
            .any(|t| t.tenant_id == team.tenant_id && t.name == team.name);
        if duplicate {
            return Err(StoreError::UniqueViolation("team_tenant_id_name_key".to_string()));
        }

        let id = self.next_team_id;
        self.next_team_id += 1;
        self.teams.insert(
            id,
            Team {
                id,
                name: team.name.clone(),
                brief: team.brief.clone(),
                tenant_id: team.tenant_id,
                is_public: false,
                status: TeamStatus::Normal,
                sync_users: false,
                created_by: team.created_by,
                created: team.created,
                updated: team.created,
            },
        );
        self.side_menus.insert(id, "[]".to_string());
        Ok(id)
    }

    fn insert_dashboard(&mut self, row: &DashboardRow) -> Result<(), StoreError> {
        if self.dashboards.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation("dashboard_pkey".to_string()));
        }
        self.dashboards.insert(row.id.clone(), row.clone());
        Ok(())
    }
}

/// In-memory [`Store`] implementation
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants a user a role in a tenant
    pub async fn add_tenant_member(&self, tenant_id: TenantId, user_id: UserId, role: Role) {
        self.state
            .lock()
            .await
            .tenant_members
            .insert((tenant_id, user_id), role);
    }

    /// Adds a user to an existing team
    pub async fn add_team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let tenant_id = state.live_team(team_id).ok_or(StoreError::NotFound)?.tenant_id;
        state.team_members.insert((team_id, user_id), (tenant_id, role));
        Ok(())
    }

    /// Inserts a bare team row without any defaults
    pub async fn seed_team(
        &self,
        tenant_id: TenantId,
        name: &str,
        created_by: UserId,
    ) -> Result<TeamId, StoreError> {
        self.state.lock().await.insert_team(&NewTeam {
            tenant_id,
            name: name.to_string(),
            brief: String::new(),
            created_by,
            created: Utc::now(),
        })
    }

    pub async fn set_team_public(&self, team_id: TeamId, is_public: bool) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let team = state.teams.get_mut(&team_id).ok_or(StoreError::NotFound)?;
        team.is_public = is_public;
        Ok(())
    }

    pub async fn add_variable(&self, team_id: TeamId, name: &str) {
        self.state
            .lock()
            .await
            .variables
            .push((team_id, name.to_string()));
    }

    /// Makes deleting the given dashboard row fail inside transactions
    pub async fn fail_dashboard_delete(&self, dashboard_id: &str) {
        self.state
            .lock()
            .await
            .faults
            .dashboard_delete
            .insert(dashboard_id.to_string());
    }

    /// Deletes the dashboard at the moment of its next update, as if a
    /// concurrent delete won the race; that update then affects no rows
    pub async fn vanish_on_next_update(&self, dashboard_id: &str) {
        self.state
            .lock()
            .await
            .faults
            .dashboard_vanish
            .insert(dashboard_id.to_string());
    }

    /// Makes every history insert fail
    pub async fn fail_history_writes(&self) {
        self.state.lock().await.faults.history_insert = true;
    }

    pub async fn history_for(&self, dashboard_id: &str) -> Vec<DashboardHistory> {
        self.state
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.dashboard_id == dashboard_id)
            .cloned()
            .collect()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    /// True if a team row exists, whatever its status
    pub async fn team_row_exists(&self, team_id: TeamId) -> bool {
        self.state.lock().await.teams.contains_key(&team_id)
    }

    pub async fn team_member_count(&self, team_id: TeamId) -> usize {
        self.state
            .lock()
            .await
            .team_members
            .keys()
            .filter(|(t, _)| *t == team_id)
            .count()
    }

    pub async fn variable_count(&self, team_id: TeamId) -> usize {
        self.state
            .lock()
            .await
            .variables
            .iter()
            .filter(|(t, _)| *t == team_id)
            .count()
    }

    pub async fn dashboard_exists(&self, dashboard_id: &str) -> bool {
        self.state.lock().await.dashboards.contains_key(dashboard_id)
    }

    pub async fn star_count(&self, dashboard_id: &str) -> usize {
        self.state
            .lock()
            .await
            .stars
            .keys()
            .filter(|(_, d)| d == dashboard_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn find_team(&self, team_id: TeamId) -> Result<Team, StoreError> {
        let state = self.state.lock().await;
        state.live_team(team_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<Option<TeamMember>, StoreError> {
        let state = self.state.lock().await;
        if state.live_team(team_id).is_none() {
            return Ok(None);
        }
        Ok(state
            .team_members
            .get(&(team_id, user_id))
            .map(|(_, role)| TeamMember {
                team_id,
                user_id,
                role: *role,
            }))
    }

    async fn tenant_of_team(&self, team_id: TeamId) -> Result<TenantId, StoreError> {
        let state = self.state.lock().await;
        state
            .live_team(team_id)
            .map(|t| t.tenant_id)
            .ok_or(StoreError::NotFound)
    }

    async fn tenant_role(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Role>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tenant_members.get(&(tenant_id, user_id)).copied())
    }

    async fn member_team_ids(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<TeamId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .team_members
            .iter()
            .filter(|((team_id, uid), (tid, _))| {
                *uid == user_id && *tid == tenant_id && state.live_team(*team_id).is_some()
            })
            .map(|((team_id, _), _)| *team_id)
            .collect())
    }

    async fn public_team_ids(&self, tenant_id: TenantId) -> Result<Vec<TeamId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .teams
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.is_public && !t.is_deleted())
            .map(|t| t.id)
            .collect())
    }

    async fn side_menu(&self, team_id: TeamId) -> Result<Vec<MenuItem>, StoreError> {
        let state = self.state.lock().await;
        state.live_team(team_id).ok_or(StoreError::NotFound)?;
        let raw = state.side_menus.get(&team_id).map(String::as_str).unwrap_or("[]");
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(format!("side menu: {}", e)))
    }

    async fn team_datasources(&self, team_id: TeamId) -> Result<Vec<Datasource>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .datasources
            .values()
            .filter(|d| d.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn mark_team_deleted(
        &self,
        team_id: TeamId,
        updated: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        match state.teams.get_mut(&team_id) {
            Some(team) if !team.is_deleted() => {
                team.status = TeamStatus::Deleted;
                team.updated = updated;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn find_dashboard(&self, id: &str) -> Result<DashboardRow, StoreError> {
        let state = self.state.lock().await;
        state.dashboards.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn dashboard_owner(&self, id: &str) -> Result<TeamId, StoreError> {
        let state = self.state.lock().await;
        state
            .dashboards
            .get(id)
            .map(|d| d.owned_by)
            .ok_or(StoreError::NotFound)
    }

    async fn insert_dashboard(&self, row: &DashboardRow) -> Result<(), StoreError> {
        self.state.lock().await.insert_dashboard(row)
    }

    async fn update_dashboard(&self, row: &DashboardRow) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        if state.faults.dashboard_vanish.remove(&row.id) {
            state.dashboards.remove(&row.id);
            return Ok(0);
        }
        match state.dashboards.get_mut(&row.id) {
            Some(existing) => {
                existing.title = row.title.clone();
                existing.tags = row.tags.clone();
                existing.data = row.data.clone();
                existing.owned_by = row.owned_by;
                existing.visible_to = row.visible_to;
                existing.updated = row.updated;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_dashboard_weight(&self, id: &str, weight: i32) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        match state.dashboards.get_mut(id) {
            Some(existing) => {
                existing.weight = weight;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn team_dashboards(&self, team_id: TeamId) -> Result<Vec<DashboardSummary>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .dashboards
            .values()
            .filter(|d| d.owned_by == team_id)
            .map(|d| DashboardSummary {
                id: d.id.clone(),
                title: d.title.clone(),
                created: d.created,
                updated: d.updated,
            })
            .collect())
    }

    async fn search_dashboards(
        &self,
        team_ids: &[TeamId],
    ) -> Result<Vec<DashboardListingRow>, StoreError> {
        let state = self.state.lock().await;
        let wanted: BTreeSet<TeamId> = team_ids.iter().copied().collect();

        let mut rows: Vec<DashboardListingRow> = state
            .dashboards
            .values()
            .filter(|d| wanted.contains(&d.owned_by))
            .filter_map(|d| {
                let team = state.teams.get(&d.owned_by)?;
                Some(DashboardListingRow {
                    id: d.id.clone(),
                    title: d.title.clone(),
                    owned_by: d.owned_by,
                    owner_name: team.name.clone(),
                    visible_to: d.visible_to,
                    tags: d.tags.clone(),
                    weight: d.weight,
                    created: d.created,
                })
            })
            .collect();

        rows.sort_by(|a, b| b.weight.cmp(&a.weight).then(b.created.cmp(&a.created)));
        Ok(rows)
    }

    async fn insert_star(
        &self,
        user_id: UserId,
        dashboard_id: &str,
        created: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .stars
            .entry((user_id, dashboard_id.to_string()))
            .or_insert(created);
        Ok(())
    }

    async fn delete_star(&self, user_id: UserId, dashboard_id: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .stars
            .remove(&(user_id, dashboard_id.to_string()));
        Ok(())
    }

    async fn is_starred(&self, user_id: UserId, dashboard_id: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.stars.contains_key(&(user_id, dashboard_id.to_string())))
    }

    async fn starred_dashboards(&self, user_id: UserId) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .stars
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn insert_history(&self, entry: &DashboardHistory) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.faults.history_insert {
            return Err(StoreError::Backend("history table unavailable".to_string()));
        }
        state.history.push(entry.clone());
        Ok(())
    }

    async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.state.lock().await.audit.push(entry.clone());
        Ok(())
    }
}

/// Transaction over a private copy of the state
struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_team(&mut self, team: &NewTeam) -> Result<TeamId, StoreError> {
        self.work.insert_team(team)
    }

    async fn insert_team_member(
        &mut self,
        tenant_id: TenantId,
        member: &TeamMember,
        _created: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = (member.team_id, member.user_id);
        if self.work.team_members.contains_key(&key) {
            return Err(StoreError::UniqueViolation("team_member_pkey".to_string()));
        }
        self.work.team_members.insert(key, (tenant_id, member.role));
        Ok(())
    }

    async fn insert_datasource(&mut self, datasource: &NewDatasource) -> Result<i64, StoreError> {
        let id = self.work.next_datasource_id;
        self.work.next_datasource_id += 1;
        self.work.datasources.insert(
            id,
            Datasource {
                id,
                name: datasource.name.clone(),
                kind: datasource.kind.clone(),
                url: datasource.url.clone(),
                team_id: datasource.team_id,
                created: datasource.created,
                updated: datasource.created,
            },
        );
        Ok(id)
    }

    async fn insert_dashboard(&mut self, row: &DashboardRow) -> Result<(), StoreError> {
        self.work.insert_dashboard(row)
    }

    async fn insert_dashboard_if_absent(
        &mut self,
        row: &DashboardRow,
    ) -> Result<bool, StoreError> {
        if self.work.dashboards.contains_key(&row.id) {
            return Ok(false);
        }
        self.work.dashboards.insert(row.id.clone(), row.clone());
        Ok(true)
    }

    async fn set_side_menu(&mut self, team_id: TeamId, menu: &str) -> Result<(), StoreError> {
        if !self.work.teams.contains_key(&team_id) {
            return Err(StoreError::NotFound);
        }
        self.work.side_menus.insert(team_id, menu.to_string());
        Ok(())
    }

    async fn delete_team_variables(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let before = self.work.variables.len();
        self.work.variables.retain(|(t, _)| *t != team_id);
        Ok((before - self.work.variables.len()) as u64)
    }

    async fn team_dashboard_ids(&mut self, team_id: TeamId) -> Result<Vec<String>, StoreError> {
        Ok(self
            .work
            .dashboards
            .values()
            .filter(|d| d.owned_by == team_id)
            .map(|d| d.id.clone())
            .collect())
    }

    async fn delete_dashboard_stars(&mut self, dashboard_id: &str) -> Result<u64, StoreError> {
        let before = self.work.stars.len();
        self.work.stars.retain(|(_, d), _| d != dashboard_id);
        Ok((before - self.work.stars.len()) as u64)
    }

    async fn delete_dashboard_row(&mut self, dashboard_id: &str) -> Result<u64, StoreError> {
        if self.work.faults.dashboard_delete.contains(dashboard_id) {
            return Err(StoreError::Backend(format!(
                "delete of dashboard {} failed",
                dashboard_id
            )));
        }
        Ok(self.work.dashboards.remove(dashboard_id).map_or(0, |_| 1))
    }

    async fn delete_team_dashboards(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let before = self.work.dashboards.len();
        self.work.dashboards.retain(|_, d| d.owned_by != team_id);
        Ok((before - self.work.dashboards.len()) as u64)
    }

    async fn delete_team_datasources(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let before = self.work.datasources.len();
        self.work.datasources.retain(|_, d| d.team_id != team_id);
        Ok((before - self.work.datasources.len()) as u64)
    }

    async fn delete_team_members(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        let before = self.work.team_members.len();
        self.work.team_members.retain(|(t, _), _| *t != team_id);
        Ok((before - self.work.team_members.len()) as u64)
    }

    async fn delete_team_row(&mut self, team_id: TeamId) -> Result<u64, StoreError> {
        self.work.side_menus.remove(&team_id);
        Ok(self.work.teams.remove(&team_id).map_or(0, |_| 1))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();
        let team_id = store.seed_team(1, "ops", 7).await.unwrap();
        store.add_variable(team_id, "env").await;

        {
            let mut tx = store.begin().await.unwrap();
            assert_eq!(tx.delete_team_variables(team_id).await.unwrap(), 1);
            assert_eq!(tx.delete_team_row(team_id).await.unwrap(), 1);
        }

        assert!(store.team_row_exists(team_id).await);
        assert_eq!(store.variable_count(team_id).await, 1);
    }

    #[tokio::test]
    async fn test_committed_transaction_is_visible() {
        let store = MemoryStore::new();
        let team_id = store.seed_team(1, "ops", 7).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.delete_team_row(team_id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!store.team_row_exists(team_id).await);
        assert!(matches!(store.find_team(team_id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_team_name_in_tenant_is_unique_violation() {
        let store = MemoryStore::new();
        store.seed_team(1, "ops", 7).await.unwrap();
        assert!(matches!(
            store.seed_team(1, "ops", 8).await,
            Err(StoreError::UniqueViolation(_))
        ));
        assert!(store.seed_team(2, "ops", 8).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleted_team_is_invisible() {
        let store = MemoryStore::new();
        let team_id = store.seed_team(1, "ops", 7).await.unwrap();
        store.add_team_member(team_id, 7, Role::Admin).await.unwrap();
        store.set_team_public(team_id, true).await.unwrap();

        assert_eq!(store.mark_team_deleted(team_id, Utc::now()).await.unwrap(), 1);
        assert_eq!(store.mark_team_deleted(team_id, Utc::now()).await.unwrap(), 0);

        assert!(matches!(store.find_team(team_id).await, Err(StoreError::NotFound)));
        assert!(store.team_member(team_id, 7).await.unwrap().is_none());
        assert!(store.member_team_ids(1, 7).await.unwrap().is_empty());
        assert!(store.public_team_ids(1).await.unwrap().is_empty());
        assert!(store.team_row_exists(team_id).await);
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing_row() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let row = DashboardRow {
            id: "d-home-1".to_string(),
            title: "Kept".to_string(),
            owned_by: 1,
            visible_to: crate::models::VisibleTo::Team,
            tags: "[]".to_string(),
            data: "{}".to_string(),
            weight: 0,
            created_by: 7,
            created: now,
            updated: now,
        };
        store.insert_dashboard(&row).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let replacement = DashboardRow {
            title: "Replacement".to_string(),
            ..row.clone()
        };
        assert!(!tx.insert_dashboard_if_absent(&replacement).await.unwrap());
        let other = DashboardRow {
            id: "d-home-2".to_string(),
            ..row
        };
        assert!(tx.insert_dashboard_if_absent(&other).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.find_dashboard("d-home-1").await.unwrap().title, "Kept");
        assert!(store.dashboard_exists("d-home-2").await);
    }
}
