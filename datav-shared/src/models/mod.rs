/// Domain models for datav
///
/// Plain data types shared by the ACL, the lifecycle services and the storage
/// adapters. Models never talk to storage themselves; persistence goes through
/// [`crate::store::Store`].
///
/// # Models
///
/// - `role`: membership roles and their two orderings (authorization, display)
/// - `user`: the acting principal
/// - `team`: teams, members, side menus, datasources
/// - `dashboard`: dashboards, search listings, history snapshots, star marks
/// - `audit`: audit log entries

pub mod audit;
pub mod dashboard;
pub mod role;
pub mod team;
pub mod user;

/// User identifier, issued by the identity collaborator
pub type UserId = i64;

/// Team identifier
pub type TeamId = i64;

/// Tenant identifier
pub type TenantId = i64;

pub use audit::{AuditAction, AuditEntry};
pub use dashboard::{
    Dashboard, DashboardHistory, DashboardListing, DashboardListingRow, DashboardRow,
    DashboardSummary, StarMark, VisibleTo,
};
pub use role::Role;
pub use team::{Datasource, MenuItem, NewDatasource, NewTeam, SideMenu, Team, TeamMember, TeamStatus};
pub use user::User;
