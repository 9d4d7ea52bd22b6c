/// Authorization decisions
///
/// Every check here is a pure function over membership facts that the caller
/// has already loaded from storage. Nothing in this module performs I/O, so
/// each rule can be tested in isolation.
///
/// # Rules
///
/// | Check                 | Allowed when                                        |
/// |-----------------------|-----------------------------------------------------|
/// | `can_view_team`       | team is public, or the user is a member             |
/// | `can_view_tenant`     | user holds any role in the tenant                   |
/// | `can_edit_dashboard`  | user is Admin or above in the dashboard's team      |
/// | `can_manage_team`     | user is Admin or above in the team                  |
/// | `can_edit_tenant`     | user is Admin or above in the tenant                |
///
/// Authorship grants nothing: a dashboard's creator who was demoted to Viewer
/// can no longer edit it.

use crate::models::{Role, Team, TeamId, TeamMember};

/// Reason an action was refused
///
/// Messages are safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AclError {
    /// No acting user
    #[error("login required")]
    LoginRequired,

    #[error("not a team member")]
    NotTeamMember,

    #[error("not a tenant member")]
    NotTenantMember,

    /// Member of the team, but below Admin
    #[error("team admin role required")]
    NotTeamAdmin,

    #[error("tenant admin role required")]
    NotTenantAdmin,

    /// Dashboard deletion is switched off
    #[error("dashboard deletion is disabled")]
    DeleteDisabled,
}

/// Checks read access to a team and its dashboards listing
pub fn can_view_team(team: &Team, member: Option<&TeamMember>) -> Result<(), AclError> {
    if team.is_public {
        return Ok(());
    }

    match member {
        Some(m) if m.team_id == team.id => Ok(()),
        _ => Err(AclError::NotTeamMember),
    }
}

/// Checks that the user belongs to a tenant, whatever the role
pub fn can_view_tenant(tenant_role: Option<Role>) -> Result<(), AclError> {
    tenant_role.map(|_| ()).ok_or(AclError::NotTenantMember)
}

/// Checks write access to a dashboard owned by `owned_by`
pub fn can_edit_dashboard(owned_by: TeamId, member: Option<&TeamMember>) -> Result<(), AclError> {
    require_team_admin(owned_by, member)
}

/// Checks the right to delete or archive a team
pub fn can_manage_team(team_id: TeamId, member: Option<&TeamMember>) -> Result<(), AclError> {
    require_team_admin(team_id, member)
}

/// Checks tenant-level administration rights
pub fn can_edit_tenant(tenant_role: Option<Role>) -> Result<(), AclError> {
    match tenant_role {
        Some(role) if role.is_admin() => Ok(()),
        Some(_) => Err(AclError::NotTenantAdmin),
        None => Err(AclError::NotTenantMember),
    }
}

fn require_team_admin(team_id: TeamId, member: Option<&TeamMember>) -> Result<(), AclError> {
    match member {
        Some(m) if m.team_id == team_id && m.role.is_admin() => Ok(()),
        Some(m) if m.team_id == team_id => Err(AclError::NotTeamAdmin),
        _ => Err(AclError::NotTeamMember),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamStatus;
    use chrono::Utc;

    fn team(id: TeamId, is_public: bool) -> Team {
        let now = Utc::now();
        Team {
            id,
            name: format!("team-{}", id),
            brief: String::new(),
            tenant_id: 1,
            is_public,
            status: TeamStatus::Normal,
            sync_users: false,
            created_by: 1,
            created: now,
            updated: now,
        }
    }

    fn member(team_id: TeamId, role: Role) -> TeamMember {
        TeamMember {
            team_id,
            user_id: 42,
            role,
        }
    }

    #[test]
    fn test_public_team_is_viewable_by_anyone() {
        assert_eq!(can_view_team(&team(1, true), None), Ok(()));
    }

    #[test]
    fn test_private_team_requires_membership() {
        let t = team(1, false);
        assert_eq!(can_view_team(&t, None), Err(AclError::NotTeamMember));
        assert_eq!(can_view_team(&t, Some(&member(1, Role::Viewer))), Ok(()));
        assert_eq!(
            can_view_team(&t, Some(&member(2, Role::Admin))),
            Err(AclError::NotTeamMember)
        );
    }

    #[test]
    fn test_any_tenant_role_can_view_tenant() {
        assert!(can_view_tenant(Some(Role::Viewer)).is_ok());
        assert!(can_view_tenant(Some(Role::SuperAdmin)).is_ok());
        assert_eq!(can_view_tenant(None), Err(AclError::NotTenantMember));
    }

    #[test]
    fn test_viewer_cannot_edit_dashboard() {
        assert_eq!(
            can_edit_dashboard(1, Some(&member(1, Role::Viewer))),
            Err(AclError::NotTeamAdmin)
        );
    }

    #[test]
    fn test_admin_tiers_can_edit_dashboard() {
        assert!(can_edit_dashboard(1, Some(&member(1, Role::Admin))).is_ok());
        assert!(can_edit_dashboard(1, Some(&member(1, Role::SuperAdmin))).is_ok());
    }

    #[test]
    fn test_admin_of_another_team_cannot_edit_dashboard() {
        assert_eq!(
            can_edit_dashboard(1, Some(&member(2, Role::SuperAdmin))),
            Err(AclError::NotTeamMember)
        );
        assert_eq!(can_edit_dashboard(1, None), Err(AclError::NotTeamMember));
    }

    #[test]
    fn test_can_manage_team_requires_admin() {
        assert!(can_manage_team(3, Some(&member(3, Role::Admin))).is_ok());
        assert_eq!(
            can_manage_team(3, Some(&member(3, Role::Viewer))),
            Err(AclError::NotTeamAdmin)
        );
    }

    #[test]
    fn test_can_edit_tenant() {
        assert!(can_edit_tenant(Some(Role::Admin)).is_ok());
        assert_eq!(can_edit_tenant(Some(Role::Viewer)), Err(AclError::NotTenantAdmin));
        assert_eq!(can_edit_tenant(None), Err(AclError::NotTenantMember));
    }

    #[test]
    fn test_denial_messages_are_readable() {
        assert_eq!(AclError::NotTeamMember.to_string(), "not a team member");
        assert_eq!(AclError::NotTenantMember.to_string(), "not a tenant member");
    }
}
