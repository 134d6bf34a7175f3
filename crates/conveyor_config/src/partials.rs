//! Partial configurations contributed by configuration repositories.
//!
//! A partial is the parsed content of one repository at one revision. The
//! reload orchestrator hands the ordered list of partials to the merge
//! strategy; everything a partial contributes is stamped with the partial's
//! origin so later validation can tell local from remote definitions.

use serde::{Deserialize, Serialize};

use crate::environments::BasicEnvironmentConfig;
use crate::origin::ConfigOrigin;
use crate::pipeline_group::BasicPipelineGroup;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialConfig {
    pub origin: ConfigOrigin,
    pub groups: Vec<BasicPipelineGroup>,
    pub environments: Vec<BasicEnvironmentConfig>,
}

impl PartialConfig {
    pub fn new(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            groups: Vec::new(),
            environments: Vec::new(),
        }
    }

    pub fn add_group(&mut self, group: BasicPipelineGroup) {
        self.groups.push(group);
    }

    pub fn add_environment(&mut self, environment: BasicEnvironmentConfig) {
        self.environments.push(environment);
    }

    /// Stamps `origin` onto the partial and everything it contributes, down
    /// to the individual pipelines.
    pub fn set_origins(&mut self, origin: ConfigOrigin) {
        self.origin = origin.clone();
        for group in &mut self.groups {
            group.origin = origin.clone();
            for pipeline in &mut group.pipelines {
                pipeline.origin = origin.clone();
            }
        }
        for environment in &mut self.environments {
            environment.origin = origin.clone();
        }
    }
}

#[cfg(test)]
#[path = "partials_tests.rs"]
mod tests;
