//! Tasks executed by a job: commands and artifact fetches.
//!
//! Fetch tasks carry the heaviest validation in the tree. A fetch may pull
//! from an earlier stage of its own pipeline or from a stage of a direct
//! upstream dependency, and the referenced stage must have completed by the
//! time this pipeline triggers.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::CaseInsensitiveName;
use crate::origin::ConfigOrigin;
use crate::pipeline::PipelineConfig;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A shell command run on the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecTask {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
}

impl ExecTask {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::new(command)
        }
    }
}

/// Pulls an artifact published by another job.
///
/// An empty `pipeline` means the job's own pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTask {
    pub pipeline: CaseInsensitiveName,
    pub stage: CaseInsensitiveName,
    pub job: CaseInsensitiveName,
    pub source: String,
    pub destination: String,
}

impl FetchTask {
    pub fn new(
        pipeline: impl Into<CaseInsensitiveName>,
        stage: impl Into<CaseInsensitiveName>,
        job: impl Into<CaseInsensitiveName>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            job: job.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Exec(ExecTask),
    Fetch(FetchTask),
}

/// One task in a job's ordered task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub kind: TaskKind,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Task {
    pub fn exec(task: ExecTask) -> Self {
        Self::from(TaskKind::Exec(task))
    }

    pub fn fetch(task: FetchTask) -> Self {
        Self::from(TaskKind::Fetch(task))
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl From<TaskKind> for Task {
    fn from(kind: TaskKind) -> Self {
        Self {
            kind,
            errors: ConfigErrors::new(),
        }
    }
}

impl ConfigNode for Task {
    fn kind(&self) -> NodeKind {
        NodeKind::Task
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        match &self.kind {
            TaskKind::Exec(exec) => {
                if exec.command.trim().is_empty() {
                    errors.add("command", "Command cannot be empty");
                }
            }
            TaskKind::Fetch(fetch) => validate_fetch(fetch, ctx, &mut errors),
        }
        errors
    }
}

fn validate_fetch(fetch: &FetchTask, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
    if fetch.stage.is_blank() {
        errors.add("stage", "Stage is a required field.");
    }
    if fetch.job.is_blank() {
        errors.add("job", "Job is a required field.");
    }
    if !errors.is_empty() || ctx.is_within_template() {
        return;
    }

    let (Some(pipeline), Some(stage), Some(job)) = (ctx.pipeline(), ctx.stage(), ctx.job()) else {
        return;
    };
    let descriptor = format!("\"{} :: {} :: {}\"", pipeline.name, stage.name, job.name);

    if fetch.pipeline.is_blank() || fetch.pipeline == pipeline.name {
        validate_fetch_from_self(fetch, &descriptor, pipeline, &stage.name, errors);
    } else {
        validate_fetch_from_upstream(fetch, &descriptor, ctx, errors);
    }
}

/// A fetch without a pipeline (or naming its own pipeline) pulls from an
/// earlier stage of the same pipeline.
fn validate_fetch_from_self(
    fetch: &FetchTask,
    descriptor: &str,
    pipeline: &PipelineConfig,
    current_stage: &CaseInsensitiveName,
    errors: &mut ConfigErrors,
) {
    let Some(fetched_index) = pipeline.stage_index_of(&fetch.stage) else {
        errors.add(
            "stage",
            format!(
                "{descriptor} tries to fetch artifact from stage \"{} :: {}\" which does not exist.",
                pipeline.name, fetch.stage
            ),
        );
        return;
    };

    let own_index = pipeline.stage_index_of(current_stage).unwrap_or(0);
    if fetched_index >= own_index {
        errors.add(
            "stage",
            format!(
                "{descriptor} tries to fetch artifact from stage \"{} :: {}\" which does not complete before \"{}\" pipeline's dependencies.",
                pipeline.name, fetch.stage, pipeline.name
            ),
        );
        return;
    }

    let has_job = pipeline
        .stage_named(&fetch.stage)
        .is_some_and(|stage| stage.job_named(&fetch.job).is_some());
    if !has_job {
        errors.add(
            "job",
            format!(
                "{descriptor} tries to fetch artifact from job \"{} :: {} :: {}\" which does not exist.",
                pipeline.name, fetch.stage, fetch.job
            ),
        );
    }
}

fn validate_fetch_from_upstream(
    fetch: &FetchTask,
    descriptor: &str,
    ctx: &ValidationContext<'_>,
    errors: &mut ConfigErrors,
) {
    let pipeline = match ctx.pipeline() {
        Some(pipeline) => pipeline,
        None => return,
    };

    let dependency = pipeline
        .materials
        .dependencies()
        .find(|dep| dep.pipeline == fetch.pipeline);
    let Some(dependency) = dependency else {
        errors.add(
            "pipelineName",
            format!(
                "Pipeline \"{}\" tries to fetch artifact from pipeline \"{}\" which is not an upstream pipeline",
                pipeline.name, fetch.pipeline
            ),
        );
        return;
    };

    let lookup = ctx.lookup();
    let Some(fetched_index) = lookup.stage_index(&fetch.pipeline, &fetch.stage) else {
        errors.add(
            "stage",
            format!(
                "{descriptor} tries to fetch artifact from stage \"{} :: {}\" which does not exist.",
                fetch.pipeline, fetch.stage
            ),
        );
        return;
    };

    let depended_index = lookup
        .stage_index(&dependency.pipeline, &dependency.stage)
        .unwrap_or(0);
    if fetched_index > depended_index {
        errors.add(
            "stage",
            format!(
                "{descriptor} tries to fetch artifact from stage \"{} :: {}\" which does not complete before \"{}\" pipeline's dependencies.",
                fetch.pipeline, fetch.stage, pipeline.name
            ),
        );
        return;
    }

    if !lookup.job_exists(&fetch.pipeline, &fetch.stage, &fetch.job) {
        errors.add(
            "job",
            format!(
                "{descriptor} tries to fetch artifact from job \"{} :: {} :: {}\" which does not exist.",
                fetch.pipeline, fetch.stage, fetch.job
            ),
        );
        return;
    }

    if pipeline.origin.is_local() {
        if let Some(upstream_origin @ ConfigOrigin::Repo { .. }) =
            lookup.pipeline_origin(&fetch.pipeline)
        {
            errors.add(
                "artifactOrigin",
                format!(
                    "{descriptor} tries to fetch artifact from job \"{} :: {} :: {}\" which is defined in {} - it cannot be referenced from {}.",
                    fetch.pipeline, fetch.stage, fetch.job, upstream_origin, pipeline.origin
                ),
            );
        }
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
