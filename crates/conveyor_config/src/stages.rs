//! Stage configuration: an ordered step of a pipeline holding one or more
//! jobs that run in parallel.

use std::ptr;

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::environment_variables::EnvironmentVariablesConfig;
use crate::errors::ConfigErrors;
use crate::jobs::JobConfig;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::security::AuthorizedEntries;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// Whether a stage triggers on its own or waits for a person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalType {
    /// Runs as soon as the previous stage passes.
    #[default]
    Success,
    /// Waits for an authorized user to trigger it.
    Manual,
}

/// Trigger control for a stage, with the users and roles allowed to
/// operate it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approval_type: ApprovalType,
    pub authorization: AuthorizedEntries,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Approval {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn manual() -> Self {
        Self {
            approval_type: ApprovalType::Manual,
            ..Self::default()
        }
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for Approval {
    fn kind(&self) -> NodeKind {
        NodeKind::Approval
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        for role in &self.authorization.roles {
            if !ctx.lookup().role_exists(role) {
                errors.add("roles", format!("Role \"{role}\" does not exist."));
            }
        }
        errors
    }
}

/// A stage within a pipeline or template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub name: CaseInsensitiveName,
    pub approval: Approval,
    pub variables: EnvironmentVariablesConfig,
    /// Agents update the stage's materials before the first job runs,
    /// unless this is turned off.
    pub fetch_materials: bool,
    pub clean_working_directory: bool,
    pub jobs: Vec<JobConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: CaseInsensitiveName::default(),
            approval: Approval::default(),
            variables: EnvironmentVariablesConfig::default(),
            fetch_materials: true,
            clean_working_directory: false,
            jobs: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }
}

impl StageConfig {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_jobs(name: impl Into<CaseInsensitiveName>, jobs: Vec<JobConfig>) -> Self {
        Self {
            jobs,
            ..Self::new(name)
        }
    }

    pub fn job_named(&self, name: &CaseInsensitiveName) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| &job.name == name)
    }

    /// Whether the stage only runs when a person triggers it.
    pub fn requires_approval(&self) -> bool {
        self.approval.approval_type == ApprovalType::Manual
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Stage);
        let approval_errors = crate::walker::take_record(records, NodeKind::Approval);
        self.approval.set_errors(approval_errors);
        self.variables.apply_errors(records);
        for job in &mut self.jobs {
            job.apply_errors(records);
        }
    }

    /// Looks up the sibling stages this stage must have a unique name
    /// among: those of the enclosing pipeline or template.
    fn siblings<'a>(&self, ctx: &ValidationContext<'a>) -> Option<&'a [StageConfig]> {
        match ctx.first_of_kind(NodeKind::Pipeline) {
            Some(NodeRef::Pipeline(pipeline)) => Some(&pipeline.stages),
            _ => match ctx.first_of_kind(NodeKind::Template) {
                Some(NodeRef::Template(template)) => Some(&template.stages),
                _ => None,
            },
        }
    }
}

impl ConfigNode for StageConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Stage
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut children: Vec<NodeRef<'_>> = vec![
            NodeRef::Approval(&self.approval),
            NodeRef::Variables(&self.variables),
        ];
        children.extend(self.jobs.iter().map(NodeRef::Job));
        children
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("stage", self.name.as_str()));
        }

        if let Some(siblings) = self.siblings(ctx) {
            let duplicated = siblings
                .iter()
                .any(|other| !ptr::eq(other, self) && other.name == self.name);
            if duplicated {
                errors.add(
                    "name",
                    format!(
                        "You have defined multiple stages called '{}'. Stage names are case-insensitive and must be unique.",
                        self.name
                    ),
                );
            }
        }

        if self.jobs.is_empty() {
            errors.add(
                "stage",
                format!(
                    "Stage '{}' does not have any jobs configured. A stage must have at least one job.",
                    self.name
                ),
            );
        }

        errors
    }
}

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
