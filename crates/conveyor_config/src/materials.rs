//! Materials a pipeline builds from: source repositories and upstream
//! pipeline dependencies.
//!
//! Every material has a fingerprint, a stable hash of the attributes that
//! identify what it polls. Two pipelines watching the same repository share
//! a fingerprint, which is what lets the server fan one commit out to all
//! interested pipelines.

use std::ptr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::name::{invalid_name_message, is_valid_name, CaseInsensitiveName};
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A git repository watched for commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMaterialConfig {
    pub name: Option<CaseInsensitiveName>,
    pub url: String,
    pub branch: String,
    pub auto_update: bool,
}

impl GitMaterialConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            branch: "master".to_string(),
            auto_update: true,
        }
    }

    pub fn with_branch(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..Self::new(url)
        }
    }
}

/// An upstream pipeline stage this pipeline triggers off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMaterialConfig {
    pub name: Option<CaseInsensitiveName>,
    pub pipeline: CaseInsensitiveName,
    pub stage: CaseInsensitiveName,
}

impl DependencyMaterialConfig {
    pub fn new(
        pipeline: impl Into<CaseInsensitiveName>,
        stage: impl Into<CaseInsensitiveName>,
    ) -> Self {
        Self {
            name: None,
            pipeline: pipeline.into(),
            stage: stage.into(),
        }
    }
}

/// A package from an external package repository. The package definition
/// itself is managed elsewhere; the material only references its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMaterialConfig {
    pub name: Option<CaseInsensitiveName>,
    pub package_id: String,
}

impl PackageMaterialConfig {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            name: None,
            package_id: package_id.into(),
        }
    }
}

/// A repository handled by an SCM plugin, referenced by scm id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluggableScmMaterialConfig {
    pub name: Option<CaseInsensitiveName>,
    pub scm_id: String,
}

impl PluggableScmMaterialConfig {
    pub fn new(scm_id: impl Into<String>) -> Self {
        Self {
            name: None,
            scm_id: scm_id.into(),
        }
    }
}

/// One material belonging to a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Git(GitMaterialConfig),
    Package(PackageMaterialConfig),
    PluggableScm(PluggableScmMaterialConfig),
    Dependency(DependencyMaterialConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialConfig {
    #[serde(flatten)]
    pub kind: MaterialKind,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl MaterialConfig {
    pub fn git(url: impl Into<String>) -> Self {
        Self::from(MaterialKind::Git(GitMaterialConfig::new(url)))
    }

    pub fn package(package_id: impl Into<String>) -> Self {
        Self::from(MaterialKind::Package(PackageMaterialConfig::new(package_id)))
    }

    pub fn pluggable_scm(scm_id: impl Into<String>) -> Self {
        Self::from(MaterialKind::PluggableScm(PluggableScmMaterialConfig::new(
            scm_id,
        )))
    }

    pub fn dependency(
        pipeline: impl Into<CaseInsensitiveName>,
        stage: impl Into<CaseInsensitiveName>,
    ) -> Self {
        Self::from(MaterialKind::Dependency(DependencyMaterialConfig::new(
            pipeline, stage,
        )))
    }

    /// The name this material can be referred to by. A dependency material
    /// without an explicit name answers to its upstream pipeline's name.
    pub fn name(&self) -> Option<CaseInsensitiveName> {
        match &self.kind {
            MaterialKind::Git(git) => git.name.clone(),
            MaterialKind::Package(package) => package.name.clone(),
            MaterialKind::PluggableScm(scm) => scm.name.clone(),
            MaterialKind::Dependency(dep) => {
                dep.name.clone().or_else(|| Some(dep.pipeline.clone()))
            }
        }
    }

    pub fn as_dependency(&self) -> Option<&DependencyMaterialConfig> {
        match &self.kind {
            MaterialKind::Dependency(dep) => Some(dep),
            _ => None,
        }
    }

    /// Stable hash of the attributes that identify what this material
    /// polls. Display attributes like the material name do not participate.
    pub fn fingerprint(&self) -> String {
        let identity = match &self.kind {
            MaterialKind::Git(git) => {
                format!("type=git,url={},branch={}", git.url, git.branch)
            }
            MaterialKind::Package(package) => {
                format!("type=package,package_id={}", package.package_id)
            }
            MaterialKind::PluggableScm(scm) => {
                format!("type=pluggable_scm,scm_id={}", scm.scm_id)
            }
            MaterialKind::Dependency(dep) => format!(
                "type=dependency,pipeline={},stage={}",
                dep.pipeline.lower(),
                dep.stage.lower()
            ),
        };
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }

    fn validate_name_uniqueness(&self, ctx: &ValidationContext<'_>, errors: &mut ConfigErrors) {
        let Some(name) = self.name() else {
            return;
        };
        if let Some(NodeRef::Materials(siblings)) = ctx.first_of_kind(NodeKind::Materials) {
            let duplicated = siblings
                .materials
                .iter()
                .any(|other| !ptr::eq(other, self) && other.name().as_ref() == Some(&name));
            if duplicated {
                errors.add(
                    "materialName",
                    format!(
                        "You have defined multiple materials called '{name}'. Material names are \
                         case-insensitive and must be unique. Note that for dependency materials \
                         the default materialName is the name of the upstream pipeline. You can \
                         override this by setting the materialName explicitly for the upstream \
                         pipeline."
                    ),
                );
            }
        }
    }

    fn validate_dependency(
        &self,
        dep: &DependencyMaterialConfig,
        ctx: &ValidationContext<'_>,
        errors: &mut ConfigErrors,
    ) {
        let Some(pipeline) = ctx.pipeline() else {
            return;
        };
        let current = &pipeline.name;
        let origin = pipeline.origin.to_string();

        if !ctx.lookup().pipeline_exists(&dep.pipeline) {
            errors.add(
                "pipelineStageName",
                format!(
                    "Pipeline with name '{}' does not exist, it is defined as a dependency for pipeline '{}' ({})",
                    dep.pipeline, current, origin
                ),
            );
        } else if ctx.lookup().stage_index(&dep.pipeline, &dep.stage).is_none() {
            errors.add(
                "pipelineStageName",
                format!(
                    "Stage with name '{}' does not exist on pipeline '{}', it is being referred to from pipeline '{}' ({})",
                    dep.stage, dep.pipeline, current, origin
                ),
            );
        } else if pipeline.origin.is_local() {
            if let Some(upstream) = ctx.lookup().pipeline_origin(&dep.pipeline) {
                if !upstream.is_local() {
                    errors.add(
                        "origin",
                        format!(
                            "Pipeline '{}' defined in the main configuration cannot depend on pipeline '{}' defined in configuration repository ({})",
                            current, dep.pipeline, upstream
                        ),
                    );
                }
            }
        }
    }
}

impl From<MaterialKind> for MaterialConfig {
    fn from(kind: MaterialKind) -> Self {
        Self {
            kind,
            errors: ConfigErrors::new(),
        }
    }
}

impl ConfigNode for MaterialConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Material
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();

        if let Some(name) = self.name() {
            if !name.is_blank() && !is_valid_name(name.as_str()) {
                errors.add("name", invalid_name_message("material", name.as_str()));
            }
        }
        self.validate_name_uniqueness(ctx, &mut errors);

        match &self.kind {
            MaterialKind::Git(git) => {
                if git.url.trim().is_empty() {
                    errors.add("url", "URL cannot be blank");
                }
            }
            MaterialKind::Package(package) => {
                if package.package_id.trim().is_empty() {
                    errors.add("packageId", "Please select a repository and package");
                }
            }
            MaterialKind::PluggableScm(scm) => {
                if scm.scm_id.trim().is_empty() {
                    errors.add("scmId", "Please select a SCM");
                }
            }
            MaterialKind::Dependency(dep) => {
                self.validate_dependency(dep, ctx, &mut errors);
            }
        }

        errors
    }
}

/// The ordered set of materials on one pipeline.
///
/// Dependency cycles discovered across the whole configuration are reported
/// on this collection's `base` field, on the pipeline where the walk found
/// the cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialConfigs {
    pub materials: Vec<MaterialConfig>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl MaterialConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: MaterialConfig) {
        self.materials.push(material);
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialConfig> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Names the materials of this pipeline answer to, in declaration order.
    pub fn material_names(&self) -> Vec<CaseInsensitiveName> {
        self.materials
            .iter()
            .filter_map(MaterialConfig::name)
            .collect()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &DependencyMaterialConfig> {
        self.materials.iter().filter_map(MaterialConfig::as_dependency)
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ConfigErrors {
        &mut self.errors
    }

    pub(crate) fn apply_errors(
        &mut self,
        records: &mut std::vec::IntoIter<(NodeKind, ConfigErrors)>,
    ) {
        self.errors = crate::walker::take_record(records, NodeKind::Materials);
        for material in &mut self.materials {
            let errors = crate::walker::take_record(records, NodeKind::Material);
            material.set_errors(errors);
        }
    }
}

impl<'a> IntoIterator for &'a MaterialConfigs {
    type Item = &'a MaterialConfig;
    type IntoIter = std::slice::Iter<'a, MaterialConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.materials.iter()
    }
}

impl ConfigNode for MaterialConfigs {
    fn kind(&self) -> NodeKind {
        NodeKind::Materials
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        self.materials.iter().map(NodeRef::Material).collect()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if self.materials.is_empty() {
            errors.add("materials", "A pipeline must have at least one material");
        }
        errors
    }
}

#[cfg(test)]
#[path = "materials_tests.rs"]
mod tests;
