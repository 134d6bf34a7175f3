//! Tests for environments and their merged views.

use super::*;
use crate::context::{EmptyLookup, StubLookup, StubPipeline};

fn create_file_env(name: &str, pipelines: &[&str]) -> BasicEnvironmentConfig {
    let mut env = BasicEnvironmentConfig::new(name);
    for pipeline in pipelines {
        env.add_pipeline(*pipeline);
    }
    env
}

fn create_repo_env(name: &str, pipelines: &[&str]) -> BasicEnvironmentConfig {
    let mut env = create_file_env(name, pipelines);
    env.origin = ConfigOrigin::repo("repo1", "https://configs.example.com/repo.git", "rev1");
    env
}

// ============================================================================
// Reference Validation Tests
// ============================================================================

#[test]
fn test_an_unknown_pipeline_reference_is_reported() {
    let env = EnvironmentConfig::Basic(create_file_env("foo", &["does_not_exist"]));
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = env.validate(&ctx);
    assert_eq!(
        errors.on("pipeline"),
        Some("Environment 'foo' refers to an unknown pipeline 'does_not_exist'.")
    );
}

#[test]
fn test_an_unknown_agent_uuid_is_reported() {
    let mut basic = create_file_env("foo-environment", &[]);
    basic.add_agent("invalid-one");
    let env = EnvironmentConfig::Basic(basic);
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = env.validate(&ctx);
    assert_eq!(
        errors.on("uuid"),
        Some("Environment 'foo-environment' has an invalid agent uuid 'invalid-one'")
    );
}

#[test]
fn test_known_references_are_accepted() {
    let mut basic = create_file_env("uat", &["deployment"]);
    basic.add_agent("agent-1");
    let env = EnvironmentConfig::Basic(basic);

    let mut lookup = StubLookup::of(vec![StubPipeline::new("deployment", &[("stage", &["job"])])]);
    lookup.add_agent("agent-1");
    let ctx = ValidationContext::new(&lookup);

    assert!(env.validate(&ctx).is_empty());
}

#[test]
fn test_a_local_environment_cannot_reference_a_repo_sourced_pipeline() {
    let mut remote = StubPipeline::new("papp", &[("build", &["job"])]);
    remote.origin = ConfigOrigin::repo("repo1", "https://config.git", "abc123");
    let lookup = StubLookup::of(vec![remote]);
    let env = EnvironmentConfig::Basic(create_file_env("uat", &["papp"]));
    let ctx = ValidationContext::new(&lookup);

    let errors = env.validate(&ctx);
    assert_eq!(
        errors.on("origin"),
        Some(
            "Environment 'uat' defined in the main configuration cannot reference \
             pipeline 'papp' defined in configuration repository (https://config.git at abc123)"
        )
    );
}

#[test]
fn test_a_repo_sourced_environment_may_reference_repo_pipelines() {
    let mut remote = StubPipeline::new("papp", &[("build", &["job"])]);
    remote.origin = ConfigOrigin::repo("repo1", "https://config.git", "abc123");
    let lookup = StubLookup::of(vec![remote]);
    let env = EnvironmentConfig::Basic(create_repo_env("uat", &["papp"]));
    let ctx = ValidationContext::new(&lookup);

    let errors = env.validate(&ctx);
    assert!(errors.is_empty());
}

#[test]
fn test_environment_name_must_match_the_name_pattern() {
    let env = EnvironmentConfig::Basic(create_file_env(".uat", &[]));
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = env.validate(&ctx);
    let expected = invalid_name_message("environment", ".uat");
    assert_eq!(errors.on("name"), Some(expected.as_str()));
}

// ============================================================================
// Merged View Tests
// ============================================================================

#[test]
#[should_panic(expected = "cannot merge environments with different names")]
fn test_merging_differently_named_parts_is_fatal() {
    MergedEnvironmentConfig::new(vec![
        create_file_env("envName1", &[]),
        create_file_env("envName2", &[]),
    ]);
}

#[test]
fn test_merged_environment_takes_the_shared_name() {
    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![
        create_file_env("UAT", &[]),
        create_repo_env("UAT", &[]),
    ]));

    assert_eq!(env.name(), &"UAT".into());
    assert!(!env.is_local());
}

#[test]
fn test_merged_pipeline_membership_is_deduplicated() {
    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![
        create_file_env("uat", &["deployment"]),
        create_repo_env("uat", &["deployment"]),
    ]));

    assert_eq!(env.pipeline_names(), vec!["deployment".into()]);
    assert!(env.contains_pipeline(&"DEPLOYMENT".into()));
}

#[test]
fn test_merged_agents_are_deduplicated_in_order() {
    let mut first = create_file_env("uat", &[]);
    first.add_agent("123");
    let mut second = create_repo_env("uat", &[]);
    second.add_agent("123");
    second.add_agent("345");

    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![first, second]));

    assert_eq!(env.agent_uuids(), vec!["123".to_string(), "345".to_string()]);
    assert!(env.has_agent("345"));
    assert!(!env.has_agent("999"));
}

#[test]
fn test_remote_pipelines_come_from_repo_parts_only() {
    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![
        create_file_env("uat", &["local-pipeline"]),
        create_repo_env("uat", &["remote-pipeline"]),
    ]));

    assert_eq!(env.remote_pipelines(), vec!["remote-pipeline".into()]);
}

#[test]
fn test_local_part_is_the_file_origin_contributor() {
    let local = create_file_env("uat", &["local-pipeline"]);
    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![
        create_repo_env("uat", &[]),
        local.clone(),
    ]));

    assert_eq!(env.local_part(), Some(&local));
}

#[test]
fn test_merged_origin_is_the_composite_of_part_origins() {
    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![
        create_file_env("uat", &[]),
        create_repo_env("uat", &[]),
    ]));

    let ConfigOrigin::Merged(parts) = env.origin() else {
        panic!("expected a composite origin");
    };
    assert_eq!(parts.len(), 2);
}

// ============================================================================
// Merged Variable Tests
// ============================================================================

#[test]
fn test_identical_variables_from_two_parts_collapse_to_one() {
    let mut first = create_file_env("uat", &[]);
    first
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("variable-name1", "variable-value1"));
    let mut second = create_repo_env("uat", &[]);
    second
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("variable-name1", "variable-value1"));

    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![first, second]));

    assert_eq!(env.variables().len(), 1);
    assert!(env.has_variable("variable-name1"));
}

#[test]
fn test_conflicting_variable_values_across_parts_are_reported() {
    let mut first = create_file_env("uat", &[]);
    first
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("variable-name1", "variable-value1"));
    let mut second = create_repo_env("uat", &[]);
    second
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("variable-name1", "variable-value2"));

    let env = EnvironmentConfig::Merged(MergedEnvironmentConfig::new(vec![first, second]));
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = env.validate(&ctx);
    assert_eq!(
        errors.on("variables"),
        Some("Environment variable 'variable-name1' is defined more than once with different values")
    );
}

#[test]
fn test_conflicting_values_within_one_part_are_left_to_variable_validation() {
    let mut basic = create_file_env("uat", &[]);
    basic
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("name", "one"));
    basic
        .variables
        .variables
        .push(EnvironmentVariableConfig::new("name", "two"));

    let env = EnvironmentConfig::Basic(basic);
    let ctx = ValidationContext::new(&EmptyLookup);

    assert!(env.validate(&ctx).on("variables").is_none());
}
