//! Case-insensitive identifiers used throughout the configuration tree.
//!
//! Pipelines, stages, jobs, templates, environments and groups are all
//! addressed by name, and two names that differ only in case refer to the
//! same entity. [`CaseInsensitiveName`] preserves the spelling the user
//! wrote while comparing, hashing and ordering on a cached lowercase form.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pattern every configuration entity name must match in full: it starts
/// with an alphanumeric, underscore or hyphen and may continue with periods.
pub static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-][a-zA-Z0-9_\-.]*$").expect("name pattern is valid"));

/// Longest accepted entity name.
pub const MAX_NAME_LENGTH: usize = 255;

/// An identifier that compares and hashes case-insensitively while
/// remembering the original spelling for display and serialization.
#[derive(Debug, Clone, Default)]
pub struct CaseInsensitiveName {
    name: String,
    lower: String,
}

impl CaseInsensitiveName {
    /// Creates a name from the spelling the user wrote.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let lower = name.to_lowercase();
        Self { name, lower }
    }

    /// Returns the original spelling.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the cached lowercase form used for comparisons.
    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// Returns true when the name is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty()
    }
}

impl PartialEq for CaseInsensitiveName {
    fn eq(&self, other: &Self) -> bool {
        self.lower == other.lower
    }
}

impl Eq for CaseInsensitiveName {}

impl Hash for CaseInsensitiveName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower.hash(state);
    }
}

impl PartialOrd for CaseInsensitiveName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaseInsensitiveName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lower.cmp(&other.lower)
    }
}

impl fmt::Display for CaseInsensitiveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for CaseInsensitiveName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CaseInsensitiveName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Serialize for CaseInsensitiveName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for CaseInsensitiveName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::new(name))
    }
}

/// Returns true when `name` is non-empty, within the length limit and
/// matches [`NAME_PATTERN`].
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && NAME_PATTERN.is_match(name)
}

/// Builds the standard rejection message for an entity name that failed
/// [`is_valid_name`].
pub fn invalid_name_message(entity: &str, name: &str) -> String {
    format!(
        "Invalid {entity} name '{name}'. This must be alphanumeric and can contain underscores, \
         hyphens and periods (however, it cannot start with a period). The maximum allowed length \
         is {MAX_NAME_LENGTH} characters."
    )
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
