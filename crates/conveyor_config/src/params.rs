//! Parameters declared on a pipeline and referenced as `#{name}` in other
//! configuration fields.

use std::ptr;

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name};
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A single named parameter with its substitution value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamConfig {
    pub name: String,
    pub value: String,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl ParamConfig {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for ParamConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Param
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
                format!("Parameter cannot have an empty name for {owner_kind} '{owner_name}'."),
            );
            return errors;
        }

        if !is_valid_name(&self.name) {
            errors.add("name", invalid_name_message("parameter", &self.name));
            return errors;
        }

        if let Some(NodeRef::Params(siblings)) = ctx.first_of_kind(NodeKind::Params) {
            let duplicated = siblings.params.iter().any(|other| {
                !ptr::eq(other, self) && other.name.to_lowercase() == self.name.to_lowercase()
            });
            if duplicated {
                errors.add(
                    "name",
                    format!(
                        "Param name '{}' is not unique for {owner_kind} '{owner_name}'.",
                        self.name
                    ),
                );
            }
        }

        errors
    }
}

/// The ordered set of parameters declared on one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsConfig {
    pub params: Vec<ParamConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl ParamsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, param: ParamConfig) {
        self.params.push(param);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamConfig> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Params);
        for param in &mut self.params {
            let errors = crate::walker::take_record(records, NodeKind::Param);
            param.set_errors(errors);
        }
    }
}

impl<'a> IntoIterator for &'a ParamsConfig {
    type Item = &'a ParamConfig;
    type IntoIter = std::slice::Iter<'a, ParamConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

impl ConfigNode for ParamsConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Params
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.params.iter().map(NodeRef::Param).collect()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        ConfigErrors::new()
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
