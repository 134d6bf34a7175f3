//! Job configuration: the unit of work scheduled onto one agent.

use std::ptr;

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::environment_variables::EnvironmentVariablesConfig;
use crate::errors::ConfigErrors;
use crate::name::{is_valid_name, CaseInsensitiveName, MAX_NAME_LENGTH};
use crate::tasks::Task;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// Names a job cannot contain, reserved for expanded instances of jobs
/// that run on all agents or as multiple instances.
const RESERVED_MARKERS: [&str; 2] = ["runOnAll", "runInstance"];

/// How many instances of a job get scheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunType {
    /// One instance on one matching agent.
    #[default]
    Single,
    /// One instance on every matching agent.
    OnAllAgents,
    /// A fixed number of instances spread over matching agents.
    MultipleInstance(u32),
}

/// What an artifact holds, which controls how the server treats the
/// uploaded files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A plain file or directory published from the working directory.
    #[default]
    Build,
    /// Test reports, additionally parsed into the job's test summary.
    Test,
}

/// A file or directory the job publishes when it completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub kind: ArtifactKind,
    pub source: String,
    pub destination: String,
}

impl ArtifactConfig {
    pub fn build(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Build,
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn test(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Test,
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// A single job within a stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: CaseInsensitiveName,
    pub variables: EnvironmentVariablesConfig,
    pub tasks: Vec<Task>,
    pub resources: Vec<String>,
    pub artifacts: Vec<ArtifactConfig>,
    pub run_type: JobRunType,
    /// Minutes of output silence after which the job is cancelled. `Some(0)`
    /// disables the timeout, `None` inherits the server default.
    pub timeout: Option<i64>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl JobConfig {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tasks(name: impl Into<CaseInsensitiveName>, tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::new(name)
        }
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Job);
        self.variables.apply_errors(records);
        for task in &mut self.tasks {
            let errors = crate::walker::take_record(records, NodeKind::Task);
            task.set_errors(errors);
        }
    }

    fn validate_name(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if self.name.is_blank() {
            errors.add("name", "Name is a required field");
            return;
        }

        if !is_valid_name(self.name.as_str()) {
            errors.add(
                "name",
                format!(
                    "Invalid job name '{}'. This must be alphanumeric and may contain underscores \
                     and periods. The maximum allowed length is {MAX_NAME_LENGTH} characters.",
                    self.name
                ),
            );
        }
        for marker in RESERVED_MARKERS {
            let wrapped = format!("-{}-", marker.to_lowercase());
            if self.name.lower().contains(&wrapped) {
                errors.add(
                    "name",
                    format!(
                        "A job cannot have '{marker}' in it's name: {} because it is a reserved keyword",
                        self.name
                    ),
                );
            }
        }

        if let Some(NodeRef::Stage(stage)) = ctx.first_of_kind(NodeKind::Stage) {
            let duplicated = stage
                .jobs
                .iter()
                .any(|other| !ptr::eq(other, self) && other.name == self.name);
            if duplicated {
                errors.add(
                    "name",
                    format!(
                        "You have defined multiple jobs called '{}'. Job names are case-insensitive and must be unique.",
                        self.name
                    ),
                );
            }
        }
    }

    fn validate_resources(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if self.resources.iter().all(|resource| !resource.is_empty()) {
            return;
        }
        let (Some(pipeline), Some(stage)) = (ctx.pipeline(), ctx.stage()) else {
            return;
        };
        errors.add(
            "resources",
            format!(
                "Empty resource name in job \"{}\" of stage \"{}\" of pipeline \"{}\". If a template is used, please ensure that the resource parameters are defined for this pipeline.",
                self.name, stage.name, pipeline.name
            ),
        );
    }

    fn validate_artifacts(&self, errors: &mut ConfigErrors) {
        for artifact in &self.artifacts {
            if artifact.source.trim().is_empty() {
                errors.add(
                    "source",
                    format!("Job '{}' has an artifact with an empty source", self.name),
                );
            }
        }
    }
}

impl ConfigNode for JobConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Job
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut children: Vec<NodeRef<'_>> = vec![NodeRef::Variables(&self.variables)];
        children.extend(self.tasks.iter().map(NodeRef::Task));
        children
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        self.validate_name(ctx, &mut errors);

        if let Some(timeout) = self.timeout {
            if timeout < 0 {
                errors.add(
                    "timeout",
                    "Timeout cannot be a negative number as it represents number of minutes",
                );
            }
        }

        self.validate_resources(ctx, &mut errors);
        self.validate_artifacts(&mut errors);
        errors
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
