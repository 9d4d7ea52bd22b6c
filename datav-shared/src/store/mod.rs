/// Storage collaborator
///
/// The lifecycle services never issue SQL themselves. They talk to a [`Store`]
/// for single-statement work and to a [`StoreTx`] for multi-statement
/// sequences that must be atomic.
///
/// # Implementations
///
/// - [`postgres::PgStore`]: sqlx-backed PostgreSQL adapter
/// - [`memory::MemoryStore`]: in-process adapter for tests and local runs
///
/// # Transactions
///
/// [`Store::begin`] returns a boxed [`StoreTx`]. Work done through it becomes
/// visible only after [`StoreTx::commit`]; dropping the handle without
/// committing rolls everything back.
///
/// ```text
/// let mut tx = store.begin().await?;
/// tx.delete_team_variables(team_id).await?;   // early return drops tx -> rollback
/// tx.delete_team_row(team_id).await?;
/// tx.commit().await?;
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AuditEntry, DashboardHistory, DashboardListingRow, DashboardRow, DashboardSummary,
    Datasource, MenuItem, NewDatasource, NewTeam, Role, Team, TeamId, TeamMember, TenantId,
    UserId,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failure
///
/// "No rows" and "unique constraint violated" are kept apart from every
/// other failure so callers can classify them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed row does not exist
    #[error("row not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored value could not be decoded
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// Driver or connection failure
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Backend failure not originating from the SQL driver
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                )
            }
            other => StoreError::Database(other),
        }
    }
}

/// Single-statement storage operations
///
/// Methods returning `Option` report an absent row as `None`; methods
/// returning a bare value report it as [`StoreError::NotFound`]. Teams with
/// `status = deleted` are absent for every method.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    // Teams and memberships

    async fn find_team(&self, team_id: TeamId) -> Result<Team, StoreError>;

    async fn team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<Option<TeamMember>, StoreError>;

    async fn tenant_of_team(&self, team_id: TeamId) -> Result<TenantId, StoreError>;

    async fn tenant_role(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<Role>, StoreError>;

    /// Teams of `tenant_id` the user is a member of
    async fn member_team_ids(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Vec<TeamId>, StoreError>;

    /// Public teams of `tenant_id`
    async fn public_team_ids(&self, tenant_id: TenantId) -> Result<Vec<TeamId>, StoreError>;

    async fn side_menu(&self, team_id: TeamId) -> Result<Vec<MenuItem>, StoreError>;

    async fn team_datasources(&self, team_id: TeamId) -> Result<Vec<Datasource>, StoreError>;

    /// Marks a team deleted; returns affected rows
    async fn mark_team_deleted(
        &self,
        team_id: TeamId,
        updated: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    // Dashboards

    async fn find_dashboard(&self, id: &str) -> Result<DashboardRow, StoreError>;

    /// Owning team of a dashboard
    async fn dashboard_owner(&self, id: &str) -> Result<TeamId, StoreError>;

    async fn insert_dashboard(&self, row: &DashboardRow) -> Result<(), StoreError>;

    /// Updates title, tags, data, team, visibility and updated time; returns affected rows
    async fn update_dashboard(&self, row: &DashboardRow) -> Result<u64, StoreError>;

    async fn update_dashboard_weight(&self, id: &str, weight: i32) -> Result<u64, StoreError>;

    async fn team_dashboards(&self, team_id: TeamId) -> Result<Vec<DashboardSummary>, StoreError>;

    /// Dashboards of the given teams, weight DESC then created DESC
    async fn search_dashboards(
        &self,
        team_ids: &[TeamId],
    ) -> Result<Vec<DashboardListingRow>, StoreError>;

    // Stars

    /// Inserts a star mark; an existing mark is left untouched
    async fn insert_star(
        &self,
        user_id: UserId,
        dashboard_id: &str,
        created: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Deletes a star mark; a missing mark is not an error
    async fn delete_star(&self, user_id: UserId, dashboard_id: &str) -> Result<(), StoreError>;

    async fn is_starred(&self, user_id: UserId, dashboard_id: &str) -> Result<bool, StoreError>;

    async fn starred_dashboards(&self, user_id: UserId) -> Result<Vec<String>, StoreError>;

    // Append-only records

    async fn insert_history(&self, entry: &DashboardHistory) -> Result<(), StoreError>;

    async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;
}

/// Operations available inside a transaction
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_team(&mut self, team: &NewTeam) -> Result<TeamId, StoreError>;

    async fn insert_team_member(
        &mut self,
        tenant_id: TenantId,
        member: &TeamMember,
        created: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_datasource(&mut self, datasource: &NewDatasource) -> Result<i64, StoreError>;

    async fn insert_dashboard(&mut self, row: &DashboardRow) -> Result<(), StoreError>;

    /// Inserts unless the id is taken; false when an existing row was kept.
    /// Never fails on a duplicate id, so the transaction stays usable.
    async fn insert_dashboard_if_absent(&mut self, row: &DashboardRow)
        -> Result<bool, StoreError>;

    async fn set_side_menu(&mut self, team_id: TeamId, menu: &str) -> Result<(), StoreError>;

    async fn delete_team_variables(&mut self, team_id: TeamId) -> Result<u64, StoreError>;

    async fn team_dashboard_ids(&mut self, team_id: TeamId) -> Result<Vec<String>, StoreError>;

    async fn delete_dashboard_stars(&mut self, dashboard_id: &str) -> Result<u64, StoreError>;

    async fn delete_dashboard_row(&mut self, dashboard_id: &str) -> Result<u64, StoreError>;

    async fn delete_team_dashboards(&mut self, team_id: TeamId) -> Result<u64, StoreError>;

    async fn delete_team_datasources(&mut self, team_id: TeamId) -> Result<u64, StoreError>;

    async fn delete_team_members(&mut self, team_id: TeamId) -> Result<u64, StoreError>;

    async fn delete_team_row(&mut self, team_id: TeamId) -> Result<u64, StoreError>;

    /// Makes every change visible atomically
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
