//! Server-wide security configuration: named roles and system
//! administrators.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A named role grouping a set of users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: CaseInsensitiveName,
    pub users: Vec<CaseInsensitiveName>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Role {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            users: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn with_users<I, N>(name: impl Into<CaseInsensitiveName>, users: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<CaseInsensitiveName>,
    {
        Self {
            name: name.into(),
            users: users.into_iter().map(Into::into).collect(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn has_user(&self, user: &CaseInsensitiveName) -> bool {
        self.users.contains(user)
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for Role {
    fn kind(&self) -> NodeKind {
        NodeKind::Role
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("role", self.name.as_str()));
        }

        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if !seen.insert(user.clone()) {
                errors.add(
                    "users",
                    format!("User '{}' already exists in '{}'.", user, self.name),
                );
            }
        }

        errors
    }
}

/// Users and roles granted some permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedEntries {
    pub users: Vec<CaseInsensitiveName>,
    pub roles: Vec<CaseInsensitiveName>,
}

impl AuthorizedEntries {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty()
    }
}

/// Top-level security settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub roles: Vec<Role>,
    pub admins: AuthorizedEntries,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl SecurityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_role(&mut self, role: Role) {
        self.roles.push(role);
    }

    pub fn has_role(&self, name: &CaseInsensitiveName) -> bool {
        self.roles.iter().any(|role| &role.name == name)
    }

    pub fn role_named(&self, name: &CaseInsensitiveName) -> Option<&Role> {
        self.roles.iter().find(|role| &role.name == name)
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Security);
        for role in &mut self.roles {
            let errors = crate::walker::take_record(records, NodeKind::Role);
            role.set_errors(errors);
        }
    }
}

impl ConfigNode for SecurityConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Security
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.roles.iter().map(NodeRef::Role).collect()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        let mut seen = std::collections::HashSet::new();
        for role in &self.roles {
            if !seen.insert(role.name.clone()) {
                errors.add("role", "Role names should be unique. Duplicate names found.");
            }
        }

        for role in &self.admins.roles {
            if !self.has_role(role) {
                errors.add("roles", format!("Role \"{role}\" does not exist."));
            }
        }

        errors
    }
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
