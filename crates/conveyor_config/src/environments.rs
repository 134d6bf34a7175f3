//! Environments: named sets of agents and pipelines with shared variables.
//!
//! Environments reference pipelines and agents by name and uuid rather than
//! owning them. Like pipeline groups they come in two shapes: a single
//! contributor (`Basic`) or a merged view over same-named contributors from
//! several configuration sources.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::environment_variables::{EnvironmentVariableConfig, EnvironmentVariablesConfig};
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::origin::ConfigOrigin;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// One contributor's definition of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicEnvironmentConfig {
    pub name: CaseInsensitiveName,
    pub origin: ConfigOrigin,
    /// Uuids of the agents assigned to this environment.
    pub agents: Vec<String>,
    /// Names of the pipelines that run in this environment.
    pub pipelines: Vec<CaseInsensitiveName>,
    pub variables: EnvironmentVariablesConfig,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl BasicEnvironmentConfig {
    pub fn new(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            origin: ConfigOrigin::default(),
            agents: Vec::new(),
            pipelines: Vec::new(),
            variables: EnvironmentVariablesConfig::default(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn add_pipeline(&mut self, pipeline: impl Into<CaseInsensitiveName>) {
        self.pipelines.push(pipeline.into());
    }

    pub fn add_agent(&mut self, uuid: impl Into<String>) {
        self.agents.push(uuid.into());
    }
}

/// Several same-named contributors presented as one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEnvironmentConfig {
    pub parts: Vec<BasicEnvironmentConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl MergedEnvironmentConfig {
    /// # Panics
    ///
    /// Panics when `parts` is empty or the parts carry different
    /// environment names.
    pub fn new(parts: Vec<BasicEnvironmentConfig>) -> Self {
        let Some(first) = parts.first() else {
            panic!("a merged environment needs at least one part");
        };
        for part in &parts[1..] {
            if part.name != first.name {
                panic!(
                    "cannot merge environments with different names: '{}' and '{}'",
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
pub enum EnvironmentConfig {
    Basic(BasicEnvironmentConfig),
    Merged(MergedEnvironmentConfig),
}

impl EnvironmentConfig {
    fn parts(&self) -> &[BasicEnvironmentConfig] {
        match self {
            EnvironmentConfig::Basic(basic) => std::slice::from_ref(basic),
            EnvironmentConfig::Merged(merged) => &merged.parts,
        }
    }

    pub fn name(&self) -> &CaseInsensitiveName {
        &self.parts()[0].name
    }

    pub fn origin(&self) -> ConfigOrigin {
        match self {
            EnvironmentConfig::Basic(basic) => basic.origin.clone(),
            EnvironmentConfig::Merged(merged) => {
                ConfigOrigin::merged(merged.parts.iter().map(|part| part.origin.clone()))
            }
        }
    }

    pub fn is_local(&self) -> bool {
        self.parts().iter().all(|part| part.origin.is_local())
    }

    /// The part owned by the main configuration file, if any.
    pub fn local_part(&self) -> Option<&BasicEnvironmentConfig> {
        self.parts().iter().find(|part| part.origin.is_local())
    }

    /// Pipeline references in declaration order, without duplicates.
    pub fn pipeline_names(&self) -> Vec<CaseInsensitiveName> {
        let mut names: Vec<CaseInsensitiveName> = Vec::new();
        for name in self.parts().iter().flat_map(|part| part.pipelines.iter()) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Pipeline references contributed by configuration repositories.
    pub fn remote_pipelines(&self) -> Vec<CaseInsensitiveName> {
        self.parts()
            .iter()
            .filter(|part| !part.origin.is_local())
            .flat_map(|part| part.pipelines.iter().cloned())
            .collect()
    }

    pub fn contains_pipeline(&self, name: &CaseInsensitiveName) -> bool {
        self.parts()
            .iter()
            .any(|part| part.pipelines.contains(name))
    }

    /// Agent uuids in declaration order, without duplicates.
    pub fn agent_uuids(&self) -> Vec<String> {
        let mut uuids: Vec<String> = Vec::new();
        for uuid in self.parts().iter().flat_map(|part| part.agents.iter()) {
            if !uuids.contains(uuid) {
                uuids.push(uuid.clone());
            }
        }
        uuids
    }

    pub fn has_agent(&self, uuid: &str) -> bool {
        self.parts()
            .iter()
            .any(|part| part.agents.iter().any(|known| known == uuid))
    }

    /// Variables across all parts, keeping the first occurrence of each
    /// name-value pair.
    pub fn variables(&self) -> Vec<&EnvironmentVariableConfig> {
        let mut variables: Vec<&EnvironmentVariableConfig> = Vec::new();
        for variable in self
            .parts()
            .iter()
            .flat_map(|part| part.variables.variables.iter())
        {
            let duplicate = variables
                .iter()
                .any(|known| known.name == variable.name && known.value == variable.value);
            if !duplicate {
                variables.push(variable);
            }
        }
        variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.parts()
            .iter()
            .any(|part| part.variables.variables.iter().any(|v| v.name == name))
    }

    pub fn errors(&self) -> &ConfigErrors {
        match self {
            EnvironmentConfig::Basic(basic) => &basic.errors,
            EnvironmentConfig::Merged(merged) => &merged.errors,
        }
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        let errors = crate::walker::take_record(records, NodeKind::Environment);
        match self {
            EnvironmentConfig::Basic(basic) => {
                basic.errors = errors;
                basic.variables.apply_errors(records);
            }
            EnvironmentConfig::Merged(merged) => {
                merged.errors = errors;
                for part in &mut merged.parts {
                    part.variables.apply_errors(records);
                }
            }
        }
    }

    fn validate_references(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        for name in self.pipeline_names() {
            if !ctx.lookup().pipeline_exists(&name) {
                errors.add(
                    "pipeline",
                    format!("Environment '{}' refers to an unknown pipeline '{}'.", self.name(), name),
                );
            }
        }
        for uuid in self.agent_uuids() {
            if !ctx.lookup().has_agent(&uuid) {
                errors.add(
                    "uuid",
                    format!("Environment '{}' has an invalid agent uuid '{}'", self.name(), uuid),
                );
            }
        }
    }

    fn validate_pipeline_origins(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        for part in self.parts() {
            if !part.origin.is_local() {
                continue;
            }
            for name in &part.pipelines {
                let Some(upstream) = ctx.lookup().pipeline_origin(name) else {
                    continue;
                };
                if !upstream.is_local() {
                    errors.add(
                        "origin",
                        format!(
                            "Environment '{}' defined in the main configuration cannot reference pipeline '{}' defined in configuration repository ({})",
                            self.name(),
                            name,
                            upstream
                        ),
                    );
                }
            }
        }
    }

    /// The same variable name must not resolve to different values across
    /// the contributing parts.
    fn validate_variable_consistency(&self, errors: &mut ConfigErrors) {
        let mut seen: Vec<&EnvironmentVariableConfig> = Vec::new();
        for variable in self
            .parts()
            .iter()
            .flat_map(|part| part.variables.variables.iter())
        {
            match seen.iter().find(|known| known.name == variable.name) {
                Some(known) if known.value != variable.value => {
                    errors.add(
                        "variables",
                        format!(
                            "Environment variable '{}' is defined more than once with different values",
                            variable.name
                        ),
                    );
                }
                Some(_) => {}
                None => seen.push(variable),
            }
        }
    }
}

impl ConfigNode for EnvironmentConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Environment
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.parts()
            .iter()
            .map(|part| NodeRef::Variables(&part.variables))
            .collect()
    }

    fn errors(&self) -> &ConfigErrors {
        EnvironmentConfig::errors(self)
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        if !is_valid_name(self.name().as_str()) {
            errors.add(
                "name",
                invalid_name_message("environment", self.name().as_str()),
            );
        }
        self.validate_references(ctx, &mut errors);
        self.validate_pipeline_origins(ctx, &mut errors);
        if matches!(self, EnvironmentConfig::Merged(_)) {
            self.validate_variable_consistency(&mut errors);
        }

        errors
    }
}

#[cfg(test)]
#[path = "environments_tests.rs"]
mod tests;
