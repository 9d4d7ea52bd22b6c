/// Lifecycle services
///
/// - [`dashboard::DashboardService`]: save, fetch, list, search, star,
///   delete and re-weight dashboards
/// - [`team::TeamService`]: create teams with their defaults, delete them
///   with every dependent row, archive them
///
/// Services load membership facts from the [`Store`], hand them to the pure
/// checks in [`crate::auth::acl`], and only then touch storage.
///
/// Multi-statement work runs inside one [`StoreTx`]. Any `?` between
/// `begin` and `commit` drops the transaction and rolls everything back.

use crate::models::{Role, TeamId, TeamMember, TenantId, User};
use crate::store::{Store, StoreError, StoreTx};

pub mod dashboard;
pub mod team;

pub use dashboard::{DashboardService, SaveDashboard};
pub use team::{CreateTeam, TeamService};

/// Membership of the acting user in a team; anonymous users have none
async fn team_member_of(
    store: &dyn Store,
    team_id: TeamId,
    user: Option<&User>,
) -> Result<Option<TeamMember>, StoreError> {
    match user {
        Some(user) => store.team_member(team_id, user.id).await,
        None => Ok(None),
    }
}

/// Tenant role of the acting user; anonymous users have none
async fn tenant_role_of(
    store: &dyn Store,
    tenant_id: TenantId,
    user: Option<&User>,
) -> Result<Option<Role>, StoreError> {
    match user {
        Some(user) => store.tenant_role(tenant_id, user.id).await,
        None => Ok(None),
    }
}

/// Removes a dashboard and everything hanging off it
///
/// Star marks go first, then the row. Returns the number of dashboard rows
/// removed.
async fn delete_dashboard_cascade(
    tx: &mut dyn StoreTx,
    dashboard_id: &str,
) -> Result<u64, StoreError> {
    tx.delete_dashboard_stars(dashboard_id).await?;
    tx.delete_dashboard_row(dashboard_id).await
}
