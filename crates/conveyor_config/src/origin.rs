//! Identifies where a piece of configuration was defined.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a configuration element was defined.
///
/// Elements read from the server's own configuration file are local and can
/// be edited through the server. Elements contributed by a configuration
/// repository are remote: the server treats them as read-only and rejects
/// upstream references that would only exist remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOrigin {
    /// Defined in the server's own configuration file.
    #[default]
    File,
    /// Contributed by a configuration repository at a specific revision.
    Repo {
        /// Identifier of the configuration repository.
        id: String,
        /// Location of the repository material, shown in error messages.
        url: String,
        /// Revision the configuration was read at.
        revision: String,
    },
    /// Composite origin of a merged view, one entry per contributor.
    Merged(Vec<ConfigOrigin>),
}

impl ConfigOrigin {
    /// Creates a repository origin.
    pub fn repo(
        id: impl Into<String>,
        url: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        ConfigOrigin::Repo {
            id: id.into(),
            url: url.into(),
            revision: revision.into(),
        }
    }

    /// Builds the composite origin of a merged view from its contributors.
    pub fn merged(parts: impl IntoIterator<Item = ConfigOrigin>) -> Self {
        ConfigOrigin::Merged(parts.into_iter().collect())
    }

    /// Returns true when the element lives in the editable configuration
    /// file rather than a configuration repository.
    pub fn is_local(&self) -> bool {
        match self {
            ConfigOrigin::File => true,
            ConfigOrigin::Repo { .. } => false,
            ConfigOrigin::Merged(parts) => parts.iter().all(ConfigOrigin::is_local),
        }
    }
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File => f.write_str("conveyor-config.xml"),
            ConfigOrigin::Repo { url, revision, .. } => write!(f, "{url} at {revision}"),
            ConfigOrigin::Merged(parts) => {
                f.write_str("merged: ")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[path = "origin_tests.rs"]
mod tests;
