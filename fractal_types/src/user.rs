use serde::{Deserialize, Serialize};

use crate::{ids::UserId, Timestamp};

/// A capability a [`User`] may hold. `Admin` implies all of the
/// others when checked by `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Compute,
    Queue,
    Admin,
}

/// Natural key: `username`, unique. The password digest is the only form a
/// password ever takes once persisted — this struct never
/// carries a plaintext password field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Salted bcrypt digest of the password. See `fractal_store::auth`.
    pub password_digest: String,
    pub permissions: Vec<Permission>,
    pub created_on: Timestamp,
    pub modified_on: Timestamp,
}

impl User {
    /// `Admin` subsumes every other permission.
    pub fn has_permission(&self, required: Permission) -> bool {
        self.permissions.contains(&Permission::Admin) || self.permissions.contains(&required)
    }
}
