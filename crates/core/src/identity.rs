//! Approver roles.

use async_trait::async_trait;
use fundctl_shared::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::store::StoreError;

/// A role name such as `budget_officer` or `comptroller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Role that may bypass the approval engine for rollbacks.
    pub const ADMIN: &'static str = "admin";

    /// Creates a role from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The elevated administrator role.
    #[must_use]
    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Resolves the roles a user holds.
#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Returns the roles held by `user`. Unknown users hold none.
    async fn roles(&self, user: UserId) -> Result<Vec<Role>, StoreError>;
}

/// Fixed user-to-role table.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleProvider {
    roles: HashMap<UserId, Vec<Role>>,
}

impl StaticRoleProvider {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` to `user`.
    #[must_use]
    pub fn with_role(mut self, user: UserId, role: impl Into<Role>) -> Self {
        self.roles.entry(user).or_default().push(role.into());
        self
    }
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
    async fn roles(&self, user: UserId) -> Result<Vec<Role>, StoreError> {
        Ok(self.roles.get(&user).cloned().unwrap_or_default())
    }
}
