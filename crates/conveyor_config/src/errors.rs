//! Error types for the configuration domain.
//!
//! Two distinct error classes exist side by side. [`ConfigError`] is the
//! fallible-operation surface: lookups that can miss and the cycle detector's
//! rejection. [`ConfigErrors`] is the per-node accumulator that validation
//! writes into; validation never returns `Err` and never panics, it records.
//!
//! Invariant violations (duplicate additions, structural mutation of a merged
//! configuration) are not represented here at all: they panic at the call
//! site, because they are bugs in the calling code rather than bad user
//! input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of fallible configuration operations.
///
/// These are signals to callers, distinct from validation errors: a missing
/// pipeline on lookup is an answer, not a defect recorded in the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Pipeline '{name}' not found.")]
    PipelineNotFound { name: String },

    #[error("Stage '{stage}' not found in pipeline '{pipeline}'.")]
    StageNotFound { pipeline: String, stage: String },

    #[error("Job '{job}' not found in stage '{stage}' of pipeline '{pipeline}'.")]
    JobNotFound {
        pipeline: String,
        stage: String,
        job: String,
    },

    #[error("Environment '{name}' not found.")]
    EnvironmentNotFound { name: String },

    #[error("Circular dependency: {path}")]
    CircularDependency { path: String },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-node accumulator of validation errors, keyed by field name.
///
/// Field order is insertion order and messages are deduplicated per field,
/// so repeated validation passes and the cycle detector's
/// attach-if-not-present discipline stay stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` under `field`, ignoring exact duplicates for that
    /// field.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.entries.iter_mut().find(|(f, _)| f == field) {
            Some((_, messages)) => {
                if !messages.contains(&message) {
                    messages.push(message);
                }
            }
            None => self.entries.push((field.to_string(), vec![message])),
        }
    }

    /// Merges every entry of `other` into this collection.
    pub fn add_all(&mut self, other: &ConfigErrors) {
        for (field, messages) in &other.entries {
            for message in messages {
                self.add(field, message.clone());
            }
        }
    }

    /// The first message recorded for `field`, if any.
    pub fn on(&self, field: &str) -> Option<&str> {
        self.all_on(field).first().map(String::as_str)
    }

    /// All messages recorded for `field`, in insertion order.
    pub fn all_on(&self, field: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or(&[])
    }

    /// Every message across every field, in insertion order.
    pub fn all(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|(_, messages)| messages.iter().map(String::as_str))
            .collect()
    }

    /// The first message across all fields, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.entries
            .first()
            .and_then(|(_, messages)| messages.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of recorded messages.
    pub fn error_count(&self) -> usize {
        self.entries.iter().map(|(_, messages)| messages.len()).sum()
    }

    /// Iterates `(field, messages)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
