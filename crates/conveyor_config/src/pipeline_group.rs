//! Pipeline groups: named collections of pipelines with shared permissions.
//!
//! A group is either a single contributor (`Basic`) or a merged view over
//! several contributors with the same name (`Merged`), one per configuration
//! source. Merged views union membership in source order and answer
//! structural queries across all parts, but authorization comes from the
//! local part alone.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::origin::ConfigOrigin;
use crate::pipeline::PipelineConfig;
use crate::security::AuthorizedEntries;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// Who may administer, operate and view the pipelines of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub view: AuthorizedEntries,
    pub operate: AuthorizedEntries,
    pub admins: AuthorizedEntries,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Authorization {
    pub fn is_defined(&self) -> bool {
        !self.view.is_empty() || !self.operate.is_empty() || !self.admins.is_empty()
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for Authorization {
    fn kind(&self) -> NodeKind {
        NodeKind::Authorization
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        let entries = [&self.view, &self.operate, &self.admins];
        for role in entries.iter().flat_map(|entry| entry.roles.iter()) {
            if !ctx.lookup().role_exists(role) {
                errors.add("roles", format!("Role \"{role}\" does not exist."));
            }
        }
        errors
    }
}

/// One contributor's pipelines for a group name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicPipelineGroup {
    pub name: CaseInsensitiveName,
    pub origin: ConfigOrigin,
    pub authorization: Authorization,
    pub pipelines: Vec<PipelineConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl BasicPipelineGroup {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            origin: ConfigOrigin::default(),
            authorization: Authorization::default(),
            pipelines: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn with_pipelines(
        name: impl Into<CaseInsensitiveName>,
        pipelines: Vec<PipelineConfig>,
    ) -> Self {
        Self {
            pipelines,
            ..Self::new(name)
        }
    }

    pub fn add(&mut self, pipeline: PipelineConfig) {
        self.pipelines.push(pipeline);
    }
}

/// Several same-named contributors presented as one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPipelineGroup {
    pub parts: Vec<BasicPipelineGroup>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl MergedPipelineGroup {
    /// # Panics
    ///
    /// Panics when `parts` is empty or the parts carry different group
    /// names; the merge engine only ever merges same-named contributors.
    pub fn new(parts: Vec<BasicPipelineGroup>) -> Self {
        let Some(first) = parts.first() else {
            panic!("a merged pipeline group needs at least one part");
        };
        for part in &parts[1..] {
            if part.name != first.name {
                panic!(
                    "cannot merge pipeline groups with different names: '{}' and '{}'",
                    first.name, part.name
                );
            }
        }
        Self {
            parts,
            errors: ConfigErrors::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineGroup {
    Basic(BasicPipelineGroup),
    Merged(MergedPipelineGroup),
}

impl PipelineGroup {
    fn parts(&self) -> &[BasicPipelineGroup] {
        match self {
            PipelineGroup::Basic(basic) => std::slice::from_ref(basic),
            PipelineGroup::Merged(merged) => &merged.parts,
        }
    }

    pub fn name(&self) -> &CaseInsensitiveName {
        &self.parts()[0].name
    }

    /// The `File` or `Repo` origin of a single contributor, or the
    /// composite origin of a merged view.
    pub fn origin(&self) -> ConfigOrigin {
        match self {
            PipelineGroup::Basic(basic) => basic.origin.clone(),
            PipelineGroup::Merged(merged) => {
                ConfigOrigin::merged(merged.parts.iter().map(|part| part.origin.clone()))
            }
        }
    }

    /// Authorization is always drawn from the local contributor; a remote
    /// part cannot grant permissions.
    pub fn authorization(&self) -> Option<&Authorization> {
        self.parts()
            .iter()
            .find(|part| part.origin.is_local())
            .map(|part| &part.authorization)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineConfig> {
        self.parts().iter().flat_map(|part| part.pipelines.iter())
    }

    pub(crate) fn pipelines_mut(&mut self) -> impl Iterator<Item = &mut PipelineConfig> {
        let parts: &mut [BasicPipelineGroup] = match self {
            PipelineGroup::Basic(basic) => std::slice::from_mut(basic),
            PipelineGroup::Merged(merged) => &mut merged.parts,
        };
        parts.iter_mut().flat_map(|part| part.pipelines.iter_mut())
    }

    pub fn pipeline_named(&self, name: &CaseInsensitiveName) -> Option<&PipelineConfig> {
        self.pipelines().find(|pipeline| &pipeline.name == name)
    }

    pub fn has_pipeline(&self, name: &CaseInsensitiveName) -> bool {
        self.pipeline_named(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.parts().iter().map(|part| part.pipelines.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn errors(&self) -> &ConfigErrors {
        match self {
            PipelineGroup::Basic(basic) => &basic.errors,
            PipelineGroup::Merged(merged) => &merged.errors,
        }
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        let errors = crate::walker::take_record(records, NodeKind::Group);
        match self {
            PipelineGroup::Basic(basic) => {
                basic.errors = errors;
                apply_part_errors(basic, records);
            }
            PipelineGroup::Merged(merged) => {
                merged.errors = errors;
                for part in &mut merged.parts {
                    apply_part_errors(part, records);
                }
            }
        }
    }
}

fn apply_part_errors(
    part: &mut BasicPipelineGroup,
    records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
) {
    let errors = crate::walker::take_record(records, NodeKind::Authorization);
    part.authorization.set_errors(errors);
    for pipeline in &mut part.pipelines {
        pipeline.apply_errors(records);
    }
}

impl ConfigNode for PipelineGroup {
    fn kind(&self) -> NodeKind {
        NodeKind::Group
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut children = Vec::new();
        for part in self.parts() {
            children.push(NodeRef::Authorization(&part.authorization));
            children.extend(part.pipelines.iter().map(NodeRef::Pipeline));
        }
        children
    }

    fn errors(&self) -> &ConfigErrors {
        PipelineGroup::errors(self)
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        if !is_valid_name(self.name().as_str()) {
            errors.add("group", invalid_name_message("group", self.name().as_str()));
        }

        for part in self.parts() {
            if !part.origin.is_local() && part.authorization.is_defined() {
                errors.add(
                    "authorization",
                    format!(
                        "Pipeline group '{}' is defined in {} and cannot have authorization. \
                         Authorization can only be defined in {}.",
                        part.name, part.origin, ConfigOrigin::File
                    ),
                );
            }
        }

        errors
    }
}

#[cfg(test)]
#[path = "pipeline_group_tests.rs"]
mod tests;
