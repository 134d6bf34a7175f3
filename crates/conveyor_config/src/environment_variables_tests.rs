//! Tests for environment variable validation.

use super::*;
use crate::context::EmptyLookup;
use crate::jobs::JobConfig;
use crate::pipeline::PipelineConfig;
use crate::stages::StageConfig;

/// Validates the variable at `index` as if its collection sat directly on
/// the given pipeline.
fn validate_on_pipeline(
    pipeline: &PipelineConfig,
    variables: &EnvironmentVariablesConfig,
    index: usize,
) -> ConfigErrors {
    let lookup = EmptyLookup;
    let ctx = ValidationContext::for_chain(
        &lookup,
        vec![NodeRef::Pipeline(pipeline), NodeRef::Variables(variables)],
    );
    variables.variables[index].validate(&ctx)
}

// ============================================================================
// Name Presence Tests
// ============================================================================

#[test]
fn test_variable_with_empty_name_is_rejected() {
    let pipeline = PipelineConfig::new("pipeline");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("", "some-value"));

    let errors = validate_on_pipeline(&pipeline, &variables, 0);

    assert_eq!(
        errors.on("name"),
        Some("Environment Variable cannot have an empty name for pipeline 'pipeline'.")
    );
}

#[test]
fn test_variable_with_name_passes() {
    let pipeline = PipelineConfig::new("pipeline");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("PATH_PREFIX", "/opt"));

    let errors = validate_on_pipeline(&pipeline, &variables, 0);

    assert!(errors.is_empty());
}

// ============================================================================
// Duplicate Name Tests
// ============================================================================

#[test]
fn test_duplicate_names_are_flagged_on_both_occurrences() {
    let pipeline = PipelineConfig::new("dev");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("WORKING_DIR", "one"));
    variables.add(EnvironmentVariableConfig::new("WORKING_DIR", "two"));

    for index in 0..2 {
        let errors = validate_on_pipeline(&pipeline, &variables, index);
        assert_eq!(
            errors.on("name"),
            Some("Environment Variable name 'WORKING_DIR' is not unique for pipeline 'dev'.")
        );
    }
}

#[test]
fn test_duplicate_detection_ignores_case() {
    let pipeline = PipelineConfig::new("dev");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("Working_Dir", "one"));
    variables.add(EnvironmentVariableConfig::new("WORKING_DIR", "two"));

    let errors = validate_on_pipeline(&pipeline, &variables, 1);
    assert_eq!(
        errors.on("name"),
        Some("Environment Variable name 'WORKING_DIR' is not unique for pipeline 'dev'.")
    );
}

#[test]
fn test_distinct_names_do_not_conflict() {
    let pipeline = PipelineConfig::new("dev");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("FIRST", "1"));
    variables.add(EnvironmentVariableConfig::new("SECOND", "2"));

    assert!(validate_on_pipeline(&pipeline, &variables, 0).is_empty());
    assert!(validate_on_pipeline(&pipeline, &variables, 1).is_empty());
}

// ============================================================================
// Owner Description Tests
// ============================================================================

#[test]
fn test_error_names_the_nearest_enclosing_entity() {
    let pipeline = PipelineConfig::new("dev");
    let stage = StageConfig::new("build");
    let job = JobConfig::new("compile");
    let mut variables = EnvironmentVariablesConfig::new();
    variables.add(EnvironmentVariableConfig::new("", "x"));

    let lookup = EmptyLookup;
    let ctx = ValidationContext::for_chain(
        &lookup,
        vec![
            NodeRef::Pipeline(&pipeline),
            NodeRef::Stage(&stage),
            NodeRef::Job(&job),
            NodeRef::Variables(&variables),
        ],
    );
    let errors = variables.variables[0].validate(&ctx);

    assert_eq!(
        errors.on("name"),
        Some("Environment Variable cannot have an empty name for job 'compile'.")
    );
}

// ============================================================================
// Secure Variable Tests
// ============================================================================

#[test]
fn test_secure_constructor_marks_variable_secure() {
    let variable = EnvironmentVariableConfig::secure("TOKEN", "s3cret");
    assert!(variable.secure);

    let variable = EnvironmentVariableConfig::new("TOKEN", "plain");
    assert!(!variable.secure);
}
