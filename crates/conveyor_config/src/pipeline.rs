//! Pipeline configuration: the unit of work the server schedules.
//!
//! A pipeline builds from its materials and runs its stages in order. It can
//! own the stages directly or reference a template that provides them; the
//! two are mutually exclusive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::environment_variables::EnvironmentVariablesConfig;
use crate::errors::ConfigErrors;
use crate::materials::MaterialConfigs;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::origin::ConfigOrigin;
use crate::params::ParamsConfig;
use crate::stages::StageConfig;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// The default label template, producing the bare build counter.
pub const COUNT_TEMPLATE: &str = "${COUNT}";

const ENV_VAR_PREFIX: &str = "env:";

const LABEL_FORMAT_MESSAGE: &str =
    "Label should be composed of alphanumeric text, it can contain the build number as \
     ${COUNT}, can contain a material revision as ${<material-name>} of \
     ${<material-name>[:<number>]}, or use params as #{<param-name>}.";

static LABEL_TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<groupName>[^\[]*)(\[:(?P<truncationLength>\d+)\])?$")
        .expect("label token pattern is valid")
});

/// What happens to a pipeline's lock while it runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LockBehavior {
    /// Keep the lock when a run fails, so nothing else schedules until a
    /// human intervenes.
    LockOnFailure,
    /// Release the lock as soon as the run finishes, pass or fail.
    UnlockWhenFinished,
    #[default]
    None,
}

impl LockBehavior {
    pub fn is_lockable(&self) -> bool {
        !matches!(self, LockBehavior::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: CaseInsensitiveName,
    pub origin: ConfigOrigin,
    pub label_template: String,
    pub lock_behavior: LockBehavior,
    /// Template providing this pipeline's stages, when it does not own them.
    pub template_name: Option<CaseInsensitiveName>,
    pub materials: MaterialConfigs,
    pub params: ParamsConfig,
    pub variables: EnvironmentVariablesConfig,
    pub stages: Vec<StageConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: CaseInsensitiveName::default(),
            origin: ConfigOrigin::default(),
            label_template: COUNT_TEMPLATE.to_string(),
            lock_behavior: LockBehavior::default(),
            template_name: None,
            materials: MaterialConfigs::new(),
            params: ParamsConfig::default(),
            variables: EnvironmentVariablesConfig::default(),
            stages: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }
}

impl PipelineConfig {
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

    pub fn has_template(&self) -> bool {
        self.template_name.is_some()
    }

    pub fn stage_named(&self, name: &CaseInsensitiveName) -> Option<&StageConfig> {
        self.stages.iter().find(|stage| &stage.name == name)
    }

    pub fn stage_index_of(&self, name: &CaseInsensitiveName) -> Option<usize> {
        self.stages.iter().position(|stage| &stage.name == name)
    }

    /// The stage scheduled after `name`, if any.
    pub fn next_stage(&self, name: &CaseInsensitiveName) -> Option<&StageConfig> {
        self.stage_index_of(name).and_then(|i| self.stages.get(i + 1))
    }

    /// The stage scheduled before `name`, if any.
    pub fn previous_stage(&self, name: &CaseInsensitiveName) -> Option<&StageConfig> {
        self.stage_index_of(name)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.stages.get(i))
    }

    /// Whether this pipeline has a dependency material on `pipeline`.
    pub fn depends_on(&self, pipeline: &CaseInsensitiveName) -> bool {
        self.materials.dependencies().any(|dep| &dep.pipeline == pipeline)
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Pipeline);
        self.materials.apply_errors(records);
        self.params.apply_errors(records);
        self.variables.apply_errors(records);
        for stage in &mut self.stages {
            stage.apply_errors(records);
        }
    }

    fn validate_name(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        if !is_valid_name(self.name.as_str()) {
            errors.add("name", invalid_name_message("pipeline", self.name.as_str()));
        }

        // When a pipeline is validated in place the tree holds it once, so a
        // count above one means a true duplicate. An edited pipeline is not
        // part of the lookup snapshot, so any hit at all is a clash.
        let count = ctx.lookup().pipeline_count(&self.name);
        let duplicated = if ctx.edit_mode() { count >= 1 } else { count > 1 };
        if duplicated {
            errors.add(
                "name",
                format!(
                    "You have defined multiple pipelines called '{}'. Pipeline names are \
                     case-insensitive and must be unique.",
                    self.name
                ),
            );
        }
    }

    fn validate_template(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        let Some(template_name) = &self.template_name else {
            return;
        };

        if !is_valid_name(template_name.as_str()) {
            errors.add(
                "templateName",
                invalid_name_message("template", template_name.as_str()),
            );
        }
        if !self.stages.is_empty() {
            errors.add(
                "stages",
                format!(
                    "Cannot add stages to pipeline '{}' which already references template '{}'",
                    self.name, template_name
                ),
            );
            errors.add(
                "template",
                format!(
                    "Cannot set template '{}' on pipeline '{}' because it already has stages defined",
                    template_name, self.name
                ),
            );
        }
        if !ctx.lookup().template_exists(template_name) {
            errors.add(
                "pipeline",
                format!(
                    "Pipeline '{}' refers to non-existent template '{}'.",
                    self.name, template_name
                ),
            );
        }
    }

    fn validate_label_template(&self, errors: &mut ConfigErrors) {
        if self.label_template.trim().is_empty() {
            errors.add(
                "labelTemplate",
                format!("Label cannot be blank. {LABEL_FORMAT_MESSAGE}"),
            );
            return;
        }

        let tokens = label_tokens(&self.label_template);
        if tokens.is_empty() {
            errors.add(
                "labelTemplate",
                format!("Invalid label '{}'. {LABEL_FORMAT_MESSAGE}", self.label_template),
            );
            return;
        }

        for token in tokens {
            if !self.validate_label_token(token, errors) {
                break;
            }
        }
    }

    fn validate_label_token(&self, token: &str, errors: &mut ConfigErrors) -> bool {
        if token.trim().is_empty() {
            errors.add("labelTemplate", "Label template variable cannot be blank.");
            return false;
        }

        if token.eq_ignore_ascii_case("COUNT") {
            return true;
        }

        let lowered = token.to_lowercase();
        if lowered == ENV_VAR_PREFIX {
            errors.add("labelTemplate", "Missing environment variable name.");
            return false;
        }
        if lowered.starts_with(ENV_VAR_PREFIX) {
            return true;
        }

        if let Some(captures) = LABEL_TOKEN_PATTERN.captures(token) {
            let material = captures.name("groupName").map_or("", |m| m.as_str());
            let truncation = captures.name("truncationLength").map_or("", |m| m.as_str());

            if truncation.starts_with('0') {
                errors.add(
                    "labelTemplate",
                    format!(
                        "Length of zero not allowed on label {} defined on pipeline {}.",
                        self.label_template, self.name
                    ),
                );
                return false;
            }

            let known = self
                .materials
                .material_names()
                .contains(&CaseInsensitiveName::from(material));
            if !known {
                errors.add(
                    "labelTemplate",
                    format!(
                        "You have defined a label template in pipeline '{}' that refers to a \
                         material called '{}', but no material with this name is defined.",
                        self.name, material
                    ),
                );
                return false;
            }

            return true;
        }

        errors.add(
            "labelTemplate",
            format!("Invalid label '{}'. {LABEL_FORMAT_MESSAGE}", self.label_template),
        );
        false
    }
}

/// The `${...}` tokens of a label template, in order. Unterminated tokens
/// are dropped, matching how the label is later expanded.
fn label_tokens(label: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = label;
    while let Some(open) = rest.find("${") {
        let after = &rest[open + 2..];
        match after.find('}') {
            Some(close) => {
                tokens.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    tokens
}

impl ConfigNode for PipelineConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Pipeline
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        let mut children = vec![
            NodeRef::Materials(&self.materials),
            NodeRef::Params(&self.params),
            NodeRef::Variables(&self.variables),
        ];
        children.extend(self.stages.iter().map(NodeRef::Stage));
        children
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        self.validate_label_template(&mut errors);
        self.validate_name(ctx, &mut errors);
        self.validate_template(ctx, &mut errors);

        if !self.has_template() && self.stages.is_empty() {
            errors.add(
                "pipeline",
                format!(
                    "Pipeline '{}' does not have any stages configured. A pipeline must have \
                     at least one stage.",
                    self.name
                ),
            );
        }

        errors
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
