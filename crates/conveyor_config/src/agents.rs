//! Build agents registered with the server.

use serde::{Deserialize, Serialize};

use crate::context::ValidationContext;
use crate::errors::ConfigErrors;
use crate::walker::{ConfigNode, NodeKind, NodeRef};

/// A registered build agent, addressed by its uuid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub uuid: String,
    pub hostname: String,
    pub ip_address: String,
    pub resources: Vec<String>,
    #[serde(skip)]
    errors: ConfigErrors,
}

impl AgentConfig {
    pub fn new(
        uuid: impl Into<String>,
        hostname: impl Into<String>,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            hostname: hostname.into(),
            ip_address: ip_address.into(),
            resources: Vec::new(),
            errors: ConfigErrors::new(),
        }
    }

    pub fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    pub(crate) fn set_errors(&mut self, errors: ConfigErrors) {
        self.errors = errors;
    }
}

impl ConfigNode for AgentConfig {
    fn kind(&self) -> NodeKind {
        NodeKind::Agent
    }

    fn children(&self) -> Vec<NodeRef<'_>> {
        Vec::new()
    }

    fn errors(&self) -> &ConfigErrors {
        &self.errors
    }

    fn validate(&self, _ctx: &ValidationContext<'_>) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if self.uuid.trim().is_empty() {
            errors.add("uuid", "UUID cannot be empty");
        }
        errors
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
