//! Pipeline templates: reusable stage sequences.
//!
//! A pipeline that references a template runs the template's stages instead
//! of defining its own. Templates carry their own admin list so that editing
//! rights can be granted without handing out group-level permissions.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::security::AuthorizedEntries;
use crate::stages::StageConfig;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTemplateConfig {
    pub name: CaseInsensitiveName,
    /// Users and roles allowed to edit this template.
    pub admins: AuthorizedEntries,
    pub stages: Vec<StageConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl PipelineTemplateConfig {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_stages(name: impl Into<CaseInsensitiveName>, stages: Vec<StageConfig>) -> Self {
        Self {
            name: name.into(),
            stages,
            ..Self::default()
        }
    }

    pub fn stage_named(&self, name: &CaseInsensitiveName) -> Option<&StageConfig> {
        self.stages.iter().find(|stage| &stage.name == name)
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate_name_uniqueness(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        let Some(NodeRef::Config(config)) = ctx.first_of_kind(NodeKind::Config) else {
            return;
        };
        let duplicated = config
            .templates()
            .iter()
            .any(|other| !std::ptr::eq(other, self) && other.name == self.name);
        if duplicated {
            errors.add(
                "name",
                format!(
                    "You have defined multiple templates called '{}'. Template names are \
                     case-insensitive and must be unique.",
                    self.name
                ),
            );
        }
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Template);
        for stage in &mut self.stages {
            stage.apply_errors(records);
        }
    }
}

impl ConfigNode for PipelineTemplateConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Template
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.stages.iter().map(NodeRef::Stage).collect()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("template", self.name.as_str()));
        }
        self.validate_name_uniqueness(ctx, &mut errors);

        for role in &self.admins.roles {
            if !ctx.lookup().role_exists(role) {
                errors.add("roles", format!("Role \"{role}\" does not exist."));
            }
        }

        errors
    }
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
