//! Tree traversal over the configuration graph.
//!
//! The node universe is the closed [`NodeRef`] enum; recursion terminates by
//! construction because only structural children are walked, never named
//! references. Validation is two passes over the same shape: an immutable
//! walk that records a fresh `ConfigErrors` per node, and a mutable mirror
//! (the `apply_errors` methods) that writes the records back in exactly the
//! same order. [`take_record`] asserts that the two passes stay aligned.

use crate::agents::AgentConfig;
use crate::config::ConveyorConfig;
use crate::context::{CrossPipelineLookup, ValidationContext};
use crate::environment_variables::{EnvironmentVariableConfig, EnvironmentVariablesConfig};
use crate::environments::EnvironmentConfig;
use crate::errors::ConfigErrors;
use crate::jobs::JobConfig;
use crate::materials::{MaterialConfig, MaterialConfigs};
use crate::params::{ParamConfig, ParamsConfig};
use crate::pipeline::PipelineConfig;
use crate::pipeline_group::{Authorization, PipelineGroup};
use crate::security::{Role, SecurityConfig};
use crate::stages::{Approval, StageConfig};
use crate::tasks::Task;
use crate::templates::PipelineTemplateConfig;

/// A node in the configuration tree.
pub trait ConfigNode {
    fn kind(&self) -> NodeKind;

    /// Structural children in declaration order. The order is a contract:
    /// error application replays it.
    fn children(&self) -> Vec<NodeRef<'_>>;

    fn errors(&self) -> &ConfigErrors;

    /// Checks this node against `ctx` and returns the findings. Never
    /// mutates the node; the caller decides where the errors land.
    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors;
}

/// A borrowed reference to any node in the tree.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Config(&'a ConveyorConfig),
    Group(&'a PipelineGroup),
    Authorization(&'a Authorization),
    Pipeline(&'a PipelineConfig),
    Materials(&'a MaterialConfigs),
    Material(&'a MaterialConfig),
    Params(&'a ParamsConfig),
    Param(&'a ParamConfig),
    Variables(&'a EnvironmentVariablesConfig),
    Variable(&'a EnvironmentVariableConfig),
    Stage(&'a StageConfig),
    Approval(&'a Approval),
    Job(&'a JobConfig),
    Task(&'a Task),
    Template(&'a PipelineTemplateConfig),
    Environment(&'a EnvironmentConfig),
    Security(&'a SecurityConfig),
    Role(&'a Role),
    Agent(&'a AgentConfig),
}

impl<'a> NodeRef<'a> {
    pub fn as_node(&self) -> &'a dyn ConfigNode {
        match *self {
            NodeRef::Config(node) => node,
            NodeRef::Group(node) => node,
            NodeRef::Authorization(node) => node,
            NodeRef::Pipeline(node) => node,
            NodeRef::Materials(node) => node,
            NodeRef::Material(node) => node,
            NodeRef::Params(node) => node,
            NodeRef::Param(node) => node,
            NodeRef::Variables(node) => node,
            NodeRef::Variable(node) => node,
            NodeRef::Stage(node) => node,
            NodeRef::Approval(node) => node,
            NodeRef::Job(node) => node,
            NodeRef::Task(node) => node,
            NodeRef::Template(node) => node,
            NodeRef::Environment(node) => node,
            NodeRef::Security(node) => node,
            NodeRef::Role(node) => node,
            NodeRef::Agent(node) => node,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.as_node().kind()
    }
}

/// The kind of a node, without the borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Config,
    Group,
    Authorization,
    Pipeline,
    Materials,
    Material,
    Params,
    Param,
    Variables,
    Variable,
    Stage,
    Approval,
    Job,
    Task,
    Template,
    Environment,
    Security,
    Role,
    Agent,
}

/// Visits nodes during a walk.
pub trait NodeHandler<'a> {
    /// Called once per node. `ctx` carries the node's ancestors, nearest
    /// last; the node itself is not on the path.
    fn handle(&mut self, node: NodeRef<'a>, ctx: &ValidationContext<'a>);
}

/// Walks the tree rooted at `root` depth-first, children in declaration
/// order.
pub fn walk<'a>(
    root: NodeRef<'a>,
    lookup: &'a dyn CrossPipelineLookup,
    handler: &mut dyn NodeHandler<'a>,
) {
    let ctx = ValidationContext::new(lookup);
    walk_with_context(root, &ctx, handler);
}

/// Walks from `node` under an existing context, for validating a subtree
/// such as a pipeline edited in isolation.
pub fn walk_with_context<'a>(
    node: NodeRef<'a>,
    ctx: &ValidationContext<'a>,
    handler: &mut dyn NodeHandler<'a>,
) {
    handler.handle(node, ctx);
    let child_ctx = ctx.with_parent(node);
    for child in node.as_node().children() {
        walk_with_context(child, &child_ctx, handler);
    }
}

/// Runs every node's `validate` and records the results in visit order.
#[derive(Debug, Default)]
pub struct ValidatingHandler {
    records: Vec<(NodeKind, ConfigErrors)>,
}

impl ValidatingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> Vec<(NodeKind, ConfigErrors)> {
        self.records
    }
}

impl<'a> NodeHandler<'a> for ValidatingHandler {
    fn handle(&mut self, node: NodeRef<'a>, ctx: &ValidationContext<'a>) {
        self.records.push((node.kind(), node.as_node().validate(ctx)));
    }
}

/// Harvests the errors already sitting on the nodes, skipping validation.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    errors: Vec<ConfigErrors>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_errors(self) -> Vec<ConfigErrors> {
        self.errors
    }
}

impl<'a> NodeHandler<'a> for CollectingHandler {
    fn handle(&mut self, node: NodeRef<'a>, _ctx: &ValidationContext<'a>) {
        let errors = node.as_node().errors();
        if !errors.is_empty() {
            self.errors.push(errors.clone());
        }
    }
}

/// Takes the next validation record, which must be for a node of kind
/// `expected`.
///
/// # Panics
///
/// Panics when the record stream is exhausted or the next record belongs to
/// a different node kind. Either means the mutable mirror diverged from the
/// walk that produced the records, which is a bug in a `children` /
/// `apply_errors` pair.
pub(crate) fn take_record(
    records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    expected: NodeKind,
) -> ConfigErrors {
    match records.next() {
        Some((kind, errors)) if kind == expected => errors,
        Some((kind, _)) => panic!(
            "validation walk out of sync: expected a {expected:?} record but found {kind:?}"
        ),
        None => panic!("validation walk out of sync: no record left for {expected:?}"),
    }
}

#[cfg(test)]
#[path = "walker_tests.rs"]
mod tests;
