//! # Conveyor Config
//!
//! The configuration domain model for Conveyor: pipelines, stages, jobs and
//! the materials that feed them, plus the machinery that validates a whole
//! configuration tree and merges contributions from external config
//! repositories into one effective view.
//!
//! ## Overview
//!
//! A [`ConveyorConfig`] owns the full tree. Validation runs in two passes
//! over the same traversal order: an immutable walk collects errors per
//! node, then a mutable pass writes them back onto the nodes they belong
//! to, so errors live next to the fields that caused them. Cross-pipeline
//! rules (dependency targets, fetch sources, name clashes) resolve through
//! the [`CrossPipelineLookup`] trait, answered either by the tree itself or
//! by a [`PipelineLookupCache`] snapshot when a single pipeline is edited
//! outside the tree.
//!
//! The primary entry points are:
//! - [`ConveyorConfig::validate_after_preprocess`] - validate the whole tree
//! - [`validate_pipeline_for_edit`] - validate one pipeline against a lookup
//! - [`ConveyorConfig::merged`] - overlay config repository partials
//! - [`PipelineLookupCache`] - indexed lookups over one config snapshot
//!
//! ## Example
//!
//! ```no_run
//! use conveyor_config::jobs::JobConfig;
//! use conveyor_config::materials::MaterialConfig;
//! use conveyor_config::pipeline::PipelineConfig;
//! use conveyor_config::pipeline_group::BasicPipelineGroup;
//! use conveyor_config::stages::StageConfig;
//! use conveyor_config::ConveyorConfig;
//!
//! let mut pipeline = PipelineConfig::with_stages(
//!     "build",
//!     vec![StageConfig::with_jobs("compile", vec![JobConfig::new("compile-job")])],
//! );
//! pipeline.materials.add(MaterialConfig::git("https://example.com/app.git"));
//!
//! let mut config = ConveyorConfig::new();
//! config.add_group(BasicPipelineGroup::with_pipelines("first", vec![pipeline]));
//! config.validate_after_preprocess();
//! assert!(config.get_all_errors().is_empty());
//! ```

// Naming, errors and provenance
pub mod errors;
pub mod name;
pub mod origin;

// Configuration tree nodes
pub mod agents;
pub mod environment_variables;
pub mod environments;
pub mod jobs;
pub mod materials;
pub mod params;
pub mod pipeline;
pub mod pipeline_group;
pub mod security;
pub mod stages;
pub mod tasks;
pub mod templates;

// Config repository contributions
pub mod partials;

// Traversal and validation
pub mod context;
pub mod dependencies;
pub mod walker;

// Top-level configuration and lookups
pub mod cache;
pub mod config;

// Cross-module integration tests
#[cfg(test)]
mod integration_tests;

// Re-export for convenient access
pub use cache::PipelineLookupCache;
pub use config::{validate_pipeline_for_edit, ConveyorConfig, Strategy};
pub use context::CrossPipelineLookup;
pub use errors::{ConfigError, ConfigErrors, ConfigResult};
pub use name::CaseInsensitiveName;
pub use origin::ConfigOrigin;
pub use pipeline::PipelineConfig;
