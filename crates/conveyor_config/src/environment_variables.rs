//! Environment variables attached to pipelines, stages, jobs and
//! environments.
//!
//! Variable names are compared case-insensitively when checking for
//! duplicates, and the error messages name the entity that owns the
//! variable so a duplicate inside a job reads differently from one on a
//! pipeline.

use std::ptr;

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A single name/value pair made available to tasks at run time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariableConfig {
    pub name: String,
    pub value: String,
    pub secure: bool,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl EnvironmentVariableConfig {
    /// Creates a plain-text variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secure: false,
            errors: ConfigErrors::new(),
        }
    }

    /// Creates a variable whose value is stored encrypted at rest.
    pub fn secure(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            secure: true,
            ..Self::new(name, value)
        }
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for EnvironmentVariableConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Variable
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        let (owner_kind, owner_name) = ctx.owner_display();

        if self.name.trim().is_empty() {
            errors.add(
                "name",
                format!("Environment Variable cannot have an empty name for {owner_kind} '{owner_name}'."),
            );
            return errors;
        }

        if let Some(NodeRef::Variables(siblings)) = ctx.first_of_kind(NodeKind::Variables) {
            let duplicated = siblings.variables.iter().any(|other| {
                !ptr::eq(other, self) && other.name.to_lowercase() == self.name.to_lowercase()
            });
            if duplicated {
                errors.add(
                    "name",
                    format!(
                        "Environment Variable name '{}' is not unique for {owner_kind} '{owner_name}'.",
                        self.name
                    ),
                );
            }
        }

        errors
    }
}

/// The ordered set of variables declared on one configuration element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariablesConfig {
    pub variables: Vec<EnvironmentVariableConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl EnvironmentVariablesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, variable: EnvironmentVariableConfig) {
        self.variables.push(variable);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentVariableConfig> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    /// Replaces this element's own errors and then its children's, consuming
    /// records in the same order the validation walk produced them.
    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Variables);
        for variable in &mut self.variables {
            let errors = crate::walker::take_record(records, NodeKind::Variable);
            variable.set_errors(errors);
        }
    }
}

impl<'a> IntoIterator for &'a EnvironmentVariablesConfig {
    type Item = &'a EnvironmentVariableConfig;
    type IntoIter = std::slice::Iter<'a, EnvironmentVariableConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.iter()
    }
}

impl ConfigNode for EnvironmentVariablesConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Variables
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.variables.iter().map(NodeRef::Variable).collect()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        ConfigErrors::new()
    }
}

#[cfg(test)]
#[path = "environment_variables_tests.rs"]
mod tests;
