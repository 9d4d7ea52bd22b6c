/// Dashboard visibility resolution
///
/// Decides whether an optional acting user may view a dashboard:
///
/// ```text
/// Private | Team  -> member of the owning team
/// Tenant          -> owning team -> tenant -> any tenant role
/// Public          -> always
/// ```
///
/// Tenant membership never grants access to a team-scoped dashboard, and the
/// tenant lookup only happens for tenant-scoped ones. Storage failures are
/// returned as errors, never folded into a denial.

use tracing::debug;

use super::acl::{self, AclError};
use crate::models::{Dashboard, DashboardRow, TeamId, User, VisibleTo};
use crate::store::{Store, StoreError};

/// Outcome of a visibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Denied(AclError),
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible)
    }

    /// Converts a denial into an error
    pub fn into_result(self) -> Result<(), AclError> {
        match self {
            Visibility::Visible => Ok(()),
            Visibility::Denied(reason) => Err(reason),
        }
    }
}

impl From<Result<(), AclError>> for Visibility {
    fn from(decision: Result<(), AclError>) -> Self {
        match decision {
            Ok(()) => Visibility::Visible,
            Err(reason) => Visibility::Denied(reason),
        }
    }
}

/// Resolves whether `user` may view `dashboard`
pub async fn resolve_visibility(
    store: &dyn Store,
    dashboard: &Dashboard,
    user: Option<&User>,
) -> Result<Visibility, StoreError> {
    resolve(
        store,
        &dashboard.id,
        dashboard.owned_by,
        dashboard.visible_to,
        user,
    )
    .await
}

/// Same decision taken on a stored row, before its payload is decoded
pub async fn resolve_row_visibility(
    store: &dyn Store,
    row: &DashboardRow,
    user: Option<&User>,
) -> Result<Visibility, StoreError> {
    resolve(store, &row.id, row.owned_by, row.visible_to, user).await
}

async fn resolve(
    store: &dyn Store,
    dashboard_id: &str,
    owned_by: TeamId,
    visible_to: VisibleTo,
    user: Option<&User>,
) -> Result<Visibility, StoreError> {
    let visibility = match visible_to {
        VisibleTo::Public => Visibility::Visible,

        VisibleTo::Private | VisibleTo::Team => {
            let Some(user) = user else {
                return Ok(Visibility::Denied(AclError::NotTeamMember));
            };
            let member = store.team_member(owned_by, user.id).await?;
            match member {
                Some(_) => Visibility::Visible,
                None => Visibility::Denied(AclError::NotTeamMember),
            }
        }

        VisibleTo::Tenant => {
            let Some(user) = user else {
                return Ok(Visibility::Denied(AclError::NotTenantMember));
            };
            let tenant_id = match store.tenant_of_team(owned_by).await {
                Ok(tenant_id) => tenant_id,
                Err(StoreError::NotFound) => {
                    return Ok(Visibility::Denied(AclError::NotTenantMember))
                }
                Err(e) => return Err(e),
            };
            let role = store.tenant_role(tenant_id, user.id).await?;
            acl::can_view_tenant(role).into()
        }
    };

    debug!(
        dashboard_id = %dashboard_id,
        visible_to = %visible_to,
        user_id = ?user.map(|u| u.id),
        visible = visibility.is_visible(),
        "Resolved dashboard visibility"
    );

    Ok(visibility)
}
