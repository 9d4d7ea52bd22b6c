/// Acting user model
///
/// Users are owned by the identity collaborator. This core only needs to know
/// who is acting; an anonymous request is represented as `Option<&User>::None`
/// at every entry point.

use serde::{Deserialize, Serialize};

use super::UserId;

/// The principal performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: UserId,

    /// Login name, used for display and logging only
    pub username: String,
}

impl User {
    /// Creates a user handle
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}
