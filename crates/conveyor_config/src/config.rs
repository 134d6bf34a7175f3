//! The whole-configuration aggregate.
//!
//! A `ConveyorConfig` is either self-contained (`Strategy::Basic`) or the
//! merged view of a main configuration plus partial configurations sourced
//! from config repositories (`Strategy::Merged`). In merged mode the
//! `groups` and `environments` fields hold the effective views, rebuilt by
//! `re_merge` after every permitted mutation; mutations always write to the
//! main contribution and never to a partial.
//!
//! Validation is orchestrated here: one immutable walk records per-node
//! results, one mutable replay writes them back, and the cycle detector
//! then contributes its findings into material errors. Lookups that can
//! miss return [`ConfigResult`]; contract misuse (duplicate additions,
//! structural mutation of a merged view) panics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::agents::AgentConfig;
use crate::context::{CrossPipelineLookup, ValidationContext};
use crate::dependencies::{DependencyTable, DfsCycleDetector};
use crate::environments::{BasicEnvironmentConfig, EnvironmentConfig, MergedEnvironmentConfig};
use crate::errors::{ConfigError, ConfigErrors, ConfigResult};
use crate::jobs::JobConfig;
use crate::materials::MaterialConfig;
use crate::name::CaseInsensitiveName;
use crate::origin::ConfigOrigin;
use crate::partials::PartialConfig;
use crate::pipeline::PipelineConfig;
use crate::pipeline_group::{BasicPipelineGroup, MergedPipelineGroup, PipelineGroup};
use crate::security::SecurityConfig;
use crate::stages::StageConfig;
use crate::templates::PipelineTemplateConfig;
use crate::walker::{
    walk, walk_with_context, CollectingHandler, ConfigNode, NodeKind, NodeRef, ValidatingHandler,
};

/// How the configuration sources its pipeline groups and environments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Self-contained; mutations apply directly to the effective
    /// collections.
    #[default]
    Basic,
    /// A main contribution plus ordered partials; the effective collections
    /// are derived views and every mutation writes to the main side.
    Merged {
        main_groups: Vec<BasicPipelineGroup>,
        main_environments: Vec<BasicEnvironmentConfig>,
        partials: Vec<PartialConfig>,
    },
}

/// The root of the configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConveyorConfig {
    pub security: SecurityConfig,
    templates: Vec<PipelineTemplateConfig>,
    groups: Vec<PipelineGroup>,
    environments: Vec<EnvironmentConfig>,
    agents: Vec<AgentConfig>,
    content_hash: String,
    strategy: Strategy,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl ConveyorConfig {
    /// An empty self-contained configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the merged view of `main` plus `partials`, in order.
    ///
    /// # Panics
    ///
    /// Panics when `main` is itself already merged, or holds merged group
    /// or environment views.
    pub fn merged(main: ConveyorConfig, partials: Vec<PartialConfig>) -> Self {
        let mut config = main;
        if config.is_merged() {
            panic!("cannot merge an already merged configuration");
        }
        let main_groups = config
            .groups
            .drain(..)
            .map(|group| match group {
                PipelineGroup::Basic(basic) => basic,
                PipelineGroup::Merged(_) => {
                    panic!("a basic configuration cannot hold merged pipeline group views")
                }
            })
            .collect();
        let main_environments = config
            .environments
            .drain(..)
            .map(|environment| match environment {
                EnvironmentConfig::Basic(basic) => basic,
                EnvironmentConfig::Merged(_) => {
                    panic!("a basic configuration cannot hold merged environment views")
                }
            })
            .collect();
        config.strategy = Strategy::Merged {
            main_groups,
            main_environments,
            partials,
        };
        config.re_merge();
        config
    }

    pub fn is_merged(&self) -> bool {
        matches!(self.strategy, Strategy::Merged { .. })
    }

    pub fn partials(&self) -> &[PartialConfig] {
        match &self.strategy {
            Strategy::Basic => &[],
            Strategy::Merged { partials, .. } => partials,
        }
    }

    /// The content hash the loader derived from the persisted form. Never
    /// recomputed here.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn set_content_hash(&mut self, hash: impl Into<String>) {
        self.content_hash = hash.into();
    }

    pub fn groups(&self) -> &[PipelineGroup] {
        &self.groups
    }

    pub fn environments(&self) -> &[EnvironmentConfig] {
        &self.environments
    }

    pub fn agents(&self) -> &[AgentConfig] {
        &self.agents
    }

    pub fn templates(&self) -> &[PipelineTemplateConfig] {
        &self.templates
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub fn all_pipelines(&self) -> impl Iterator<Item = &PipelineConfig> {
        self.groups.iter().flat_map(PipelineGroup::pipelines)
    }

    // ==================== mutation ====================

    /// Adds `pipeline` to the named group, creating the group when absent.
    /// Writes to the main contribution and re-merges.
    ///
    /// # Panics
    ///
    /// Panics when a pipeline with that name already exists anywhere in the
    /// effective configuration.
    pub fn add_pipeline(
        &mut self,
        group: impl Into<CaseInsensitiveName>,
        pipeline: PipelineConfig,
    ) {
        if let Some(existing) = self.find_pipeline(&pipeline.name) {
            if existing.origin.is_local() {
                panic!(
                    "You have defined multiple pipelines called '{}'. Pipeline names must be unique.",
                    pipeline.name
                );
            }
            panic!(
                "Pipeline called {} is already defined in configuration repository {}",
                pipeline.name, existing.origin
            );
        }

        let group = group.into();
        debug!("adding pipeline '{}' to group '{}'", pipeline.name, group);
        match &mut self.strategy {
            Strategy::Basic => match self.groups.iter().position(|g| g.name() == &group) {
                Some(index) => match &mut self.groups[index] {
                    PipelineGroup::Basic(basic) => basic.add(pipeline),
                    PipelineGroup::Merged(_) => {
                        panic!("cannot add a pipeline to a merged pipeline group view")
                    }
                },
                None => self.groups.push(PipelineGroup::Basic(
                    BasicPipelineGroup::with_pipelines(group, vec![pipeline]),
                )),
            },
            Strategy::Merged { main_groups, .. } => {
                match main_groups.iter_mut().find(|g| g.name == group) {
                    Some(main_group) => main_group.add(pipeline),
                    None => {
                        main_groups.push(BasicPipelineGroup::with_pipelines(group, vec![pipeline]));
                    }
                }
            }
        }
        self.re_merge();
    }

    /// Adds a new pipeline group.
    ///
    /// # Panics
    ///
    /// Panics when the same source already contributes a group with that
    /// name. A main group whose name a partial also contributes is not a
    /// duplicate; the two merge.
    pub fn add_group(&mut self, group: BasicPipelineGroup) {
        let clash = match &self.strategy {
            Strategy::Basic => self.groups.iter().any(|g| g.name() == &group.name),
            Strategy::Merged { main_groups, .. } => {
                main_groups.iter().any(|g| g.name == group.name)
            }
        };
        if clash {
            panic!("Group with name '{}' already exists!", group.name);
        }
        match &mut self.strategy {
            Strategy::Basic => self.groups.push(PipelineGroup::Basic(group)),
            Strategy::Merged { main_groups, .. } => main_groups.push(group),
        }
        self.re_merge();
    }

    /// Adds an environment to the main contribution and re-merges.
    ///
    /// # Panics
    ///
    /// Panics when any contribution, main or partial, already has an
    /// environment with that name, or when any other environment already
    /// references one of the new environment's pipelines. Both checks run
    /// against the merged view before any state changes.
    pub fn add_environment(&mut self, environment: BasicEnvironmentConfig) {
        let name_clash = self
            .environments
            .iter()
            .any(|e| e.name() == &environment.name);
        if name_clash {
            panic!("Environment with name '{}' already exists.", environment.name);
        }
        for pipeline in &environment.pipelines {
            if let Some(existing) = self
                .environments
                .iter()
                .find(|e| e.name() != &environment.name && e.contains_pipeline(pipeline))
            {
                panic!(
                    "Associating pipeline(s) which is already part of {} environment",
                    existing.name()
                );
            }
        }

        debug!("adding environment '{}'", environment.name);
        match &mut self.strategy {
            Strategy::Basic => self.environments.push(EnvironmentConfig::Basic(environment)),
            Strategy::Merged { main_environments, .. } => main_environments.push(environment),
        }
        self.re_merge();
    }

    /// Removes the main contribution of the named environment. Environments
    /// contributed only by partials cannot be removed here.
    pub fn remove_environment(&mut self, name: &CaseInsensitiveName) -> ConfigResult<()> {
        let not_found = || ConfigError::EnvironmentNotFound {
            name: name.to_string(),
        };
        match &mut self.strategy {
            Strategy::Basic => {
                let index = self
                    .environments
                    .iter()
                    .position(|e| e.name() == name)
                    .ok_or_else(not_found)?;
                self.environments.remove(index);
            }
            Strategy::Merged { main_environments, .. } => {
                let index = main_environments
                    .iter()
                    .position(|e| &e.name == name)
                    .ok_or_else(not_found)?;
                main_environments.remove(index);
            }
        }
        self.re_merge();
        Ok(())
    }

    pub fn add_template(&mut self, template: PipelineTemplateConfig) {
        self.templates.push(template);
    }

    pub fn add_agent(&mut self, agent: AgentConfig) {
        self.agents.push(agent);
    }

    /// Replaces every pipeline group.
    ///
    /// # Panics
    ///
    /// Panics on a merged configuration; replacement has no merge
    /// semantics.
    pub fn set_group(&mut self, groups: Vec<PipelineGroup>) {
        if self.is_merged() {
            panic!("cannot replace pipeline groups on a merged configuration");
        }
        self.groups = groups;
    }

    /// Replaces every environment.
    ///
    /// # Panics
    ///
    /// Panics on a merged configuration; replacement has no merge
    /// semantics.
    pub fn set_environments(&mut self, environments: Vec<EnvironmentConfig>) {
        if self.is_merged() {
            panic!("cannot replace environments on a merged configuration");
        }
        self.environments = environments;
    }

    /// Replaces the group with the same name.
    ///
    /// # Panics
    ///
    /// Panics on a merged configuration, and when no group carries the
    /// name.
    pub fn update_group(&mut self, group: BasicPipelineGroup) {
        if self.is_merged() {
            panic!("cannot update a pipeline group on a merged configuration");
        }
        match self.groups.iter().position(|g| g.name() == &group.name) {
            Some(index) => self.groups[index] = PipelineGroup::Basic(group),
            None => panic!("no pipeline group called '{}' to update", group.name),
        }
    }

    /// Rebuilds the effective group and environment views from the main
    /// contribution plus the partials, in order. A name contributed by one
    /// source passes through unchanged; several contributors become a
    /// merged view.
    #[instrument(skip(self))]
    fn re_merge(&mut self) {
        let (main_groups, main_environments, partials) = match &self.strategy {
            Strategy::Basic => return,
            Strategy::Merged {
                main_groups,
                main_environments,
                partials,
            } => (main_groups.clone(), main_environments.clone(), partials.clone()),
        };

        let mut group_buckets: Vec<(CaseInsensitiveName, Vec<BasicPipelineGroup>)> = Vec::new();
        for group in main_groups {
            let name = group.name.clone();
            push_bucket(&mut group_buckets, &name, group);
        }
        for partial in &partials {
            for group in &partial.groups {
                push_bucket(&mut group_buckets, &group.name, group.clone());
            }
        }

        let mut environment_buckets: Vec<(CaseInsensitiveName, Vec<BasicEnvironmentConfig>)> =
            Vec::new();
        for environment in main_environments {
            let name = environment.name.clone();
            push_bucket(&mut environment_buckets, &name, environment);
        }
        for partial in &partials {
            for environment in &partial.environments {
                push_bucket(&mut environment_buckets, &environment.name, environment.clone());
            }
        }

        self.groups = group_buckets
            .into_iter()
            .map(|(_, mut parts)| {
                if parts.len() == 1 {
                    PipelineGroup::Basic(parts.remove(0))
                } else {
                    PipelineGroup::Merged(MergedPipelineGroup::new(parts))
                }
            })
            .collect();
        self.environments = environment_buckets
            .into_iter()
            .map(|(_, mut parts)| {
                if parts.len() == 1 {
                    EnvironmentConfig::Basic(parts.remove(0))
                } else {
                    EnvironmentConfig::Merged(MergedEnvironmentConfig::new(parts))
                }
            })
            .collect();
        debug!(
            "rebuilt merged view: {} pipeline groups, {} environments",
            self.groups.len(),
            self.environments.len()
        );
    }

    // ==================== validation ====================

    /// Validates the whole effective tree and writes every finding onto its
    /// node, then runs cycle detection over the dependency graph. In merged
    /// mode this validates the merged scope only; the main configuration
    /// and each partial are validated in their own scope by whoever
    /// orchestrates the reload.
    #[instrument(skip(self))]
    pub fn validate_after_preprocess(&mut self) {
        let mut handler = ValidatingHandler::new();
        walk(NodeRef::Config(self), self, &mut handler);
        let mut records = handler.into_records().into_iter();
        self.apply_errors(&mut records);
        if records.len() > 0 {
            panic!("validation walk out of sync: {} unconsumed records", records.len());
        }
        self.validate_pipeline_dependencies();
        debug!(
            "validation pass complete: {} nodes carry errors",
            self.get_all_errors().len()
        );
    }

    /// Runs the cycle detector from every pipeline, in declaration order,
    /// so error placement is reproducible. Each cycle is reported once, on
    /// the materials of the first pipeline to discover it; the rotated
    /// paths later members would produce are recognised by membership and
    /// dropped.
    fn validate_pipeline_dependencies(&mut self) {
        let table = self.dependency_table();
        let names: Vec<CaseInsensitiveName> =
            self.all_pipelines().map(|pipeline| pipeline.name.clone()).collect();
        let mut reported: Vec<Vec<String>> = Vec::new();
        for name in names {
            if let Err(error) = DfsCycleDetector::topo_sort(&name, &table) {
                let ConfigError::CircularDependency { path } = &error else {
                    continue;
                };
                let mut members: Vec<String> =
                    path.split(" <- ").map(str::to_lowercase).collect();
                members.sort();
                members.dedup();
                if reported.contains(&members) {
                    continue;
                }
                reported.push(members);
                self.attach_cycle_error(&name, error.to_string());
            }
        }
    }

    fn attach_cycle_error(&mut self, pipeline: &CaseInsensitiveName, message: String) {
        if let Some(target) = self
            .groups
            .iter_mut()
            .flat_map(|group| group.pipelines_mut())
            .find(|candidate| &candidate.name == pipeline)
        {
            target.materials.errors_mut().add("base", message);
        }
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Config);
        self.security.apply_errors(records);
        for template in &mut self.templates {
            template.apply_errors(records);
        }
        for group in &mut self.groups {
            group.apply_errors(records);
        }
        for environment in &mut self.environments {
            environment.apply_errors(records);
        }
        for agent in &mut self.agents {
            agent.set_errors(crate::walker::take_record(records, NodeKind::Agent));
        }
    }

    /// Every non-empty per-node error collection in the tree, in walk
    /// order.
    pub fn get_all_errors(&self) -> Vec<ConfigErrors> {
        let mut collector = CollectingHandler::new();
        walk(NodeRef::Config(self), self, &mut collector);
        collector.into_errors()
    }

    /// Like [`get_all_errors`](Self::get_all_errors), with every error
    /// collection found under `excluded` removed from the result.
    pub fn get_all_errors_except_for(&self, excluded: NodeRef<'_>) -> Vec<ConfigErrors> {
        let mut collector = CollectingHandler::new();
        walk(excluded, self, &mut collector);
        let excluded_errors = collector.into_errors();

        let mut all = self.get_all_errors();
        all.retain(|errors| !excluded_errors.contains(errors));
        all
    }

    // ==================== queries ====================

    pub fn find_pipeline(&self, name: &CaseInsensitiveName) -> Option<&PipelineConfig> {
        self.all_pipelines().find(|pipeline| &pipeline.name == name)
    }

    pub fn pipeline_config_by_name(
        &self,
        name: &CaseInsensitiveName,
    ) -> ConfigResult<&PipelineConfig> {
        self.find_pipeline(name).ok_or_else(|| ConfigError::PipelineNotFound {
            name: name.to_string(),
        })
    }

    pub fn has_pipeline_named(&self, name: &CaseInsensitiveName) -> bool {
        self.find_pipeline(name).is_some()
    }

    pub fn stage_config_by_name(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> ConfigResult<&StageConfig> {
        self.pipeline_config_by_name(pipeline)?
            .stage_named(stage)
            .ok_or_else(|| ConfigError::StageNotFound {
                pipeline: pipeline.to_string(),
                stage: stage.to_string(),
            })
    }

    pub fn has_stage_config_named(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> bool {
        self.find_pipeline(pipeline)
            .is_some_and(|found| found.stage_named(stage).is_some())
    }

    pub fn find_job(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> Option<&JobConfig> {
        self.find_pipeline(pipeline)?.stage_named(stage)?.job_named(job)
    }

    pub fn job_config_by_name(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> ConfigResult<&JobConfig> {
        self.stage_config_by_name(pipeline, stage)?
            .job_named(job)
            .ok_or_else(|| ConfigError::JobNotFound {
                pipeline: pipeline.to_string(),
                stage: stage.to_string(),
                job: job.to_string(),
            })
    }

    pub fn next_stage(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> Option<&StageConfig> {
        self.find_pipeline(pipeline)?.next_stage(stage)
    }

    pub fn previous_stage(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> Option<&StageConfig> {
        self.find_pipeline(pipeline)?.previous_stage(stage)
    }

    pub fn template_by_name(&self, name: &CaseInsensitiveName) -> Option<&PipelineTemplateConfig> {
        self.templates.iter().find(|template| &template.name == name)
    }

    pub fn environment_by_name(
        &self,
        name: &CaseInsensitiveName,
    ) -> ConfigResult<&EnvironmentConfig> {
        self.environments
            .iter()
            .find(|environment| environment.name() == name)
            .ok_or_else(|| ConfigError::EnvironmentNotFound {
                name: name.to_string(),
            })
    }

    /// All materials across all pipelines whose fingerprint matches.
    pub fn matching_materials(&self, fingerprint: &str) -> Vec<&MaterialConfig> {
        self.all_pipelines()
            .flat_map(|pipeline| pipeline.materials.materials.iter())
            .filter(|material| material.fingerprint() == fingerprint)
            .collect()
    }

    /// The dependency graph of every pipeline, keyed by pipeline name.
    pub fn dependency_table(&self) -> DependencyTable {
        let mut table = DependencyTable::new();
        for pipeline in self.all_pipelines() {
            let targets = pipeline
                .materials
                .dependencies()
                .map(|dependency| (dependency.pipeline.clone(), dependency.stage.clone()))
                .collect();
            table.insert(pipeline.name.clone(), targets);
        }
        table
    }

    /// Pipelines that declare a dependency material on `pipeline`, in
    /// declaration order.
    pub fn downstream_pipelines_of(&self, pipeline: &CaseInsensitiveName) -> Vec<&PipelineConfig> {
        self.all_pipelines()
            .filter(|candidate| candidate.depends_on(pipeline))
            .collect()
    }

    /// Every pipeline name mapped to its direct downstream pipelines.
    /// Pipelines nothing depends on map to an empty list.
    pub fn pipeline_vs_downstream_map(&self) -> HashMap<CaseInsensitiveName, Vec<&PipelineConfig>> {
        let mut map: HashMap<CaseInsensitiveName, Vec<&PipelineConfig>> = HashMap::new();
        for pipeline in self.all_pipelines() {
            map.entry(pipeline.name.clone()).or_default();
            for dependency in pipeline.materials.dependencies() {
                map.entry(dependency.pipeline.clone()).or_default().push(pipeline);
            }
        }
        map
    }

    /// Whether `upstream` is anywhere in `pipeline`'s transitive dependency
    /// closure.
    pub fn dependency_closure_contains(
        &self,
        pipeline: &CaseInsensitiveName,
        upstream: &CaseInsensitiveName,
    ) -> bool {
        self.dependency_table().closure_contains(pipeline, upstream)
    }

    /// The stages of `pipeline` that other pipelines consume as dependency
    /// materials, in stage declaration order.
    pub fn stages_used_as_materials<'p>(
        &self,
        pipeline: &'p PipelineConfig,
    ) -> Vec<&'p StageConfig> {
        let mut used: Vec<&CaseInsensitiveName> = Vec::new();
        for candidate in self.all_pipelines() {
            for dependency in candidate.materials.dependencies() {
                if dependency.pipeline == pipeline.name {
                    used.push(&dependency.stage);
                }
            }
        }
        pipeline
            .stages
            .iter()
            .filter(|stage| used.contains(&&stage.name))
            .collect()
    }

    /// Every template name in declaration order, each with the pipelines
    /// referencing it. Templates nothing references map to an empty list.
    pub fn templates_with_associated_pipelines(
        &self,
    ) -> Vec<(CaseInsensitiveName, Vec<CaseInsensitiveName>)> {
        self.templates
            .iter()
            .map(|template| {
                let pipelines = self
                    .all_pipelines()
                    .filter(|pipeline| pipeline.template_name.as_ref() == Some(&template.name))
                    .map(|pipeline| pipeline.name.clone())
                    .collect();
                (template.name.clone(), pipelines)
            })
            .collect()
    }

    pub fn group_of_pipeline(&self, pipeline: &CaseInsensitiveName) -> Option<&PipelineGroup> {
        self.groups.iter().find(|group| group.has_pipeline(pipeline))
    }
}

impl ConfigNode for ConveyorConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Config
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut children = vec![NodeRef::Security(&self.security)];
        children.extend(self.templates.iter().map(NodeRef::Template));
        children.extend(self.groups.iter().map(NodeRef::Group));
        children.extend(self.environments.iter().map(NodeRef::Environment));
        children.extend(self.agents.iter().map(NodeRef::Agent));
        children
    }

    fn errors(&self) -> &ConfigErrors {
        ConveyorConfig::errors(self)
    }

    // Structural rules all live on the children; the root's own invariants
    // (unique group names, environment disjointness) are enforced at
    // mutation time.
    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        ConfigErrors::new()
    }
}

impl CrossPipelineLookup for ConveyorConfig {
    fn pipeline_exists(&self, pipeline: &CaseInsensitiveName) -> bool {
        self.has_pipeline_named(pipeline)
    }

    fn pipeline_count(&self, pipeline: &CaseInsensitiveName) -> usize {
        self.all_pipelines()
            .filter(|candidate| &candidate.name == pipeline)
            .count()
    }

    fn pipeline_origin(&self, pipeline: &CaseInsensitiveName) -> Option<ConfigOrigin> {
        self.find_pipeline(pipeline).map(|found| found.origin.clone())
    }

    fn stage_index(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
    ) -> Option<usize> {
        self.find_pipeline(pipeline)?.stage_index_of(stage)
    }

    fn job_exists(
        &self,
        pipeline: &CaseInsensitiveName,
        stage: &CaseInsensitiveName,
        job: &CaseInsensitiveName,
    ) -> bool {
        self.find_job(pipeline, stage, job).is_some()
    }

    fn template_exists(&self, template: &CaseInsensitiveName) -> bool {
        self.template_by_name(template).is_some()
    }

    fn role_exists(&self, role: &CaseInsensitiveName) -> bool {
        self.security.has_role(role)
    }

    fn has_agent(&self, uuid: &str) -> bool {
        self.agents.iter().any(|agent| agent.uuid == uuid)
    }
}

/// Validates a pipeline being edited in isolation. The pipeline is not part
/// of `lookup`'s snapshot, so name-clash checks treat any existing pipeline
/// with the same name as a duplicate.
pub fn validate_pipeline_for_edit(pipeline: &mut PipelineConfig, lookup: &dyn CrossPipelineLookup) {
    let mut handler = ValidatingHandler::new();
    let ctx = ValidationContext::new(lookup).in_edit_mode();
    walk_with_context(NodeRef::Pipeline(pipeline), &ctx, &mut handler);
    let mut records = handler.into_records().into_iter();
    pipeline.apply_errors(&mut records);
}

fn push_bucket<T>(
    buckets: &mut Vec<(CaseInsensitiveName, Vec<T>)>,
    name: &CaseInsensitiveName,
    item: T,
) {
    match buckets.iter_mut().find(|(existing, _)| existing == name) {
        Some((_, items)) => items.push(item),
        None => buckets.push((name.clone(), vec![item])),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
