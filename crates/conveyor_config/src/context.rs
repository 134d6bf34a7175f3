//! Ancestor chain and cross-tree lookup available during validation.
//!
//! A `ValidationContext` travels with the walk. It carries the chain of
//! ancestors above the node being validated, nearest last, and a
//! [`CrossPipelineLookup`] for the questions a node cannot answer from its
//! own subtree, such as whether a referenced pipeline exists or where a
//! stage sits in an upstream pipeline.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::ConveyorConfig;
use crate::jobs::JobConfig;
use crate::name::CaseInsensitiveName;
use crate::origin::ConfigOrigin;
use crate::pipeline::PipelineConfig;
use crate::pipeline_group::PipelineGroup;
use crate::stages::StageConfig;
use crate::templates::PipelineTemplateConfig;
use crate::walker::{NodeKind, NodeRef};

/// Questions validation asks about the configuration outside the node's own
/// subtree. Implemented by the whole configuration and by the pipeline
/// lookup cache, so a pipeline can be validated in isolation against a
/// consistent snapshot.
pub trait CrossPipelineLookup {
    fn pipeline_exists(&self, pipeline: &CaseInsensitiveName) -> bool;

    /// How many pipelines carry this name. The tree under validation holds
    /// the pipeline itself, so in-place validation treats a count above one
    /// as a duplicate, while edit-mode validation treats any hit as one.
    fn pipeline_count(&self, pipeline: &CaseInsensitiveName) -> usize;

    fn pipeline_origin(&self, pipeline: &CaseInsensitiveName) -> Option<ConfigOrigin>;

    /// Position of `stage` within `pipeline`, when both exist.
    fn stage_index(&self, pipeline: &CaseInsensitiveName, stage: &CaseInsensitiveName)
        -> Option<usize>;

    fn job_exists(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> bool;

    fn template_exists(&self, template: &CaseInsensitiveName) -> bool;

    fn role_exists(&self, role: &CaseInsensitiveName) -> bool;

    fn has_agent(&self, uuid: &str) -> bool;
}

/// The state a node sees while being validated.
pub struct ValidationContext<'a> {
    path: Vec<NodeRef<'a>>,
    lookup: &'a dyn CrossPipelineLookup,
    edit_mode: bool,
    nearest: RefCell<HashMap<NodeKind, Option<NodeRef<'a>>>>,
}

impl<'a> ValidationContext<'a> {
    /// Root context with an empty ancestor chain.
    pub fn new(lookup: &'a dyn CrossPipelineLookup) -> Self {
        Self::for_chain(lookup, Vec::new())
    }

    /// Context over a prepared ancestor chain, nearest ancestor last.
    pub fn for_chain(lookup: &'a dyn CrossPipelineLookup, path: Vec<NodeRef<'a>>) -> Self {
        ValidationContext {
            path,
            lookup,
            edit_mode: false,
            nearest: RefCell::new(HashMap::new()),
        }
    }

    /// Marks the context as validating a pipeline being edited, one not
    /// part of the lookup snapshot.
    pub fn in_edit_mode(mut self) -> Self {
        self.edit_mode = true;
        self
    }

    /// The chain extended by `node`, for descending into its children.
    pub fn with_parent(&self, node: NodeRef<'a>) -> Self {
        let mut path = self.path.clone();
        path.push(node);
        ValidationContext {
            path,
            lookup: self.lookup,
            edit_mode: self.edit_mode,
            nearest: RefCell::new(HashMap::new()),
        }
    }

    pub fn lookup(&self) -> &'a dyn CrossPipelineLookup {
        self.lookup
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// The ancestors of the node under validation, nearest last. The node
    /// itself is never on the chain.
    pub fn ancestors(&self) -> &[NodeRef<'a>] {
        &self.path
    }

    /// Nearest ancestor of the given kind. Memoized per context instance;
    /// the chain never changes once built.
    pub fn first_of_kind(&self, kind: NodeKind) -> Option<NodeRef<'a>> {
        if let Some(found) = self.nearest.borrow().get(&kind) {
            return *found;
        }
        let found = self.path.iter().rev().copied().find(|node| node.kind() == kind);
        self.nearest.borrow_mut().insert(kind, found);
        found
    }

    pub fn pipeline(&self) -> Option<&'a PipelineConfig> {
        match self.first_of_kind(NodeKind::Pipeline) {
            Some(NodeRef::Pipeline(pipeline)) => Some(pipeline),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<&'a StageConfig> {
        match self.first_of_kind(NodeKind::Stage) {
            Some(NodeRef::Stage(stage)) => Some(stage),
            _ => None,
        }
    }

    pub fn job(&self) -> Option<&'a JobConfig> {
        match self.first_of_kind(NodeKind::Job) {
            Some(NodeRef::Job(job)) => Some(job),
            _ => None,
        }
    }

    pub fn template(&self) -> Option<&'a PipelineTemplateConfig> {
        match self.first_of_kind(NodeKind::Template) {
            Some(NodeRef::Template(template)) => Some(template),
            _ => None,
        }
    }

    pub fn group(&self) -> Option<&'a PipelineGroup> {
        match self.first_of_kind(NodeKind::Group) {
            Some(NodeRef::Group(group)) => Some(group),
            _ => None,
        }
    }

    pub fn config(&self) -> Option<&'a ConveyorConfig> {
        match self.first_of_kind(NodeKind::Config) {
            Some(NodeRef::Config(config)) => Some(config),
            _ => None,
        }
    }

    /// The enclosing pipeline, which the tree shape guarantees.
    ///
    /// # Panics
    ///
    /// Panics when no pipeline is on the ancestor chain.
    pub fn load_pipeline(&self) -> &'a PipelineConfig {
        match self.pipeline() {
            Some(pipeline) => pipeline,
            None => panic!("no pipeline on the validation path"),
        }
    }

    /// The enclosing stage, which the tree shape guarantees.
    ///
    /// # Panics
    ///
    /// Panics when no stage is on the ancestor chain.
    pub fn load_stage(&self) -> &'a StageConfig {
        match self.stage() {
            Some(stage) => stage,
            None => panic!("no stage on the validation path"),
        }
    }

    /// The enclosing job, which the tree shape guarantees.
    ///
    /// # Panics
    ///
    /// Panics when no job is on the ancestor chain.
    pub fn load_job(&self) -> &'a JobConfig {
        match self.job() {
            Some(job) => job,
            None => panic!("no job on the validation path"),
        }
    }

    /// Name of the enclosing pipeline, or of the enclosing template when
    /// validating template content.
    pub fn pipeline_or_template_name(&self) -> Option<&'a CaseInsensitiveName> {
        if let Some(pipeline) = self.pipeline() {
            return Some(&pipeline.name);
        }
        self.template().map(|template| &template.name)
    }

    pub fn is_within_template(&self) -> bool {
        self.template().is_some()
    }

    /// The nearest named owner for error messages, as a kind word and the
    /// owner's name. Falls back to the configuration root.
    pub fn owner_display(&self) -> (&'static str, String) {
        for node in self.path.iter().rev() {
            match *node {
                NodeRef::Job(job) => return ("job", job.name.to_string()),
                NodeRef::Stage(stage) => return ("stage", stage.name.to_string()),
                NodeRef::Environment(environment) => {
                    return ("environment", environment.name().to_string());
                }
                NodeRef::Pipeline(pipeline) => return ("pipeline", pipeline.name.to_string()),
                NodeRef::Template(template) => return ("template", template.name.to_string()),
                _ => {}
            }
        }
        ("config", String::new())
    }
}

/// A lookup over nothing, for validating nodes with no cross-tree
/// references in play.
#[cfg(test)]
pub(crate) struct EmptyLookup;

#[cfg(test)]
impl CrossPipelineLookup for EmptyLookup {
    fn pipeline_exists(&self, _pipeline: &CaseInsensitiveName) -> bool {
        false
    }

    fn pipeline_count(&self, _pipeline: &CaseInsensitiveName) -> usize {
        0
    }

    fn pipeline_origin(&self, _pipeline: &CaseInsensitiveName) -> Option<ConfigOrigin> {
        None
    }

    fn stage_index(
        &self,
        _pipeline: &CaseInsensitiveName,
        _stage: &CaseInsensitiveName,
    ) -> Option<usize> {
        None
    }

    fn job_exists(
        &self,
        _pipeline: &CaseInsensitiveName,
        _stage: &CaseInsensitiveName,
        _job: &CaseInsensitiveName,
    ) -> bool {
        false
    }

    fn template_exists(&self, _template: &CaseInsensitiveName) -> bool {
        false
    }

    fn role_exists(&self, _role: &CaseInsensitiveName) -> bool {
        false
    }

    fn has_agent(&self, _uuid: &str) -> bool {
        false
    }
}

/// A pipeline skeleton the stub lookup answers from.
#[cfg(test)]
pub(crate) struct StubPipeline {
    pub name: CaseInsensitiveName,
    pub stages: Vec<(CaseInsensitiveName, Vec<CaseInsensitiveName>)>,
    pub origin: ConfigOrigin,
}

#[cfg(test)]
impl StubPipeline {
    pub fn new(name: &str, stages: &[(&str, &[&str])]) -> Self {
        StubPipeline {
            name: name.into(),
            stages: stages
                .iter()
                .map(|(stage, jobs)| {
                    (
                        CaseInsensitiveName::from(*stage),
                        jobs.iter().map(|job| CaseInsensitiveName::from(*job)).collect(),
                    )
                })
                .collect(),
            origin: ConfigOrigin::File,
        }
    }
}

/// An in-memory lookup over hand-built pipelines, roles, templates and
/// agents.
#[cfg(test)]
pub(crate) struct StubLookup {
    pipelines: Vec<StubPipeline>,
    roles: Vec<CaseInsensitiveName>,
    templates: Vec<CaseInsensitiveName>,
    agents: Vec<String>,
}

#[cfg(test)]
impl StubLookup {
    pub fn of(pipelines: Vec<StubPipeline>) -> Self {
        StubLookup {
            pipelines,
            roles: Vec::new(),
            templates: Vec::new(),
            agents: Vec::new(),
        }
    }

    pub fn add_role(&mut self, name: &str) {
        self.roles.push(name.into());
    }

    pub fn add_template(&mut self, name: &str) {
        self.templates.push(name.into());
    }

    pub fn add_agent(&mut self, uuid: &str) {
        self.agents.push(uuid.to_string());
    }

    fn find(&self, pipeline: &CaseInsensitiveName) -> Option<&StubPipeline> {
        self.pipelines.iter().find(|stub| &stub.name == pipeline)
    }
}

#[cfg(test)]
impl CrossPipelineLookup for StubLookup {
    fn pipeline_exists(&self, pipeline: &CaseInsensitiveName) -> bool {
        self.find(pipeline).is_some()
    }

    fn pipeline_count(&self, pipeline: &CaseInsensitiveName) -> usize {
        self.pipelines.iter().filter(|stub| &stub.name == pipeline).count()
    }

    fn pipeline_origin(&self, pipeline: &CaseInsensitiveName) -> Option<ConfigOrigin> {
        self.find(pipeline).map(|stub| stub.origin.clone())
    }

    fn stage_index(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> Option<usize> {
        self.find(pipeline)?
            .stages
            .iter()
            .position(|(name, _)| name == stage)
    }

    fn job_exists(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> bool {
        self.find(pipeline)
            .and_then(|stub| stub.stages.iter().find(|(name, _)| name == stage))
            .is_some_and(|(_, jobs)| jobs.contains(job))
    }

    fn template_exists(&self, template: &CaseInsensitiveName) -> bool {
        self.templates.contains(template)
    }

    fn role_exists(&self, role: &CaseInsensitiveName) -> bool {
        self.roles.contains(role)
    }

    fn has_agent(&self, uuid: &str) -> bool {
        self.agents.iter().any(|agent| agent == uuid)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
