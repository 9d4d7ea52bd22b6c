/// Role model shared by team and tenant memberships
///
/// Roles answer two unrelated questions, and each has its own method:
///
/// - [`Role::is_admin`]: the authorization capability check. Every ACL decision
///   that needs elevated rights goes through this and nothing else.
/// - [`Role::sort_weight`]: display ordering for member lists. Never consulted
///   by authorization.
///
/// # Storage
///
/// Roles are persisted as text using their canonical names:
///
/// ```sql
/// role VARCHAR(20) NOT NULL DEFAULT 'Viewer'
///     CHECK (role IN ('Viewer', 'Admin', 'SuperAdmin'))
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Membership role within a team or tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Read-only access
    Viewer,

    /// Can edit dashboards and manage the team
    Admin,

    /// Highest tier, given to a team's creator
    SuperAdmin,
}

/// Error returned when a stored role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    /// Converts role to its storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Admin => "Admin",
            Role::SuperAdmin => "SuperAdmin",
        }
    }

    /// True for the Admin and SuperAdmin tiers
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }

    /// Display ordering weight, higher sorts first in member lists
    pub fn sort_weight(&self) -> u8 {
        match self {
            Role::SuperAdmin => 3,
            Role::Admin => 2,
            Role::Viewer => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Viewer" => Ok(Role::Viewer),
            "Admin" => Ok(Role::Admin),
            "SuperAdmin" => Ok(Role::SuperAdmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
