//! Tests for pipeline configuration, label templates in particular.

use super::*;
use crate::context::{EmptyLookup, StubLookup, StubPipeline};
use crate::jobs::JobConfig;
use crate::materials::{GitMaterialConfig, MaterialConfig, MaterialKind};

fn create_test_pipeline(label: &str) -> PipelineConfig {
    let mut pipeline = PipelineConfig::with_stages(
        "release",
        vec![StageConfig::with_jobs("stage", vec![JobConfig::new("job")])],
    );
    let mut git = GitMaterialConfig::new("https://example.com/repo.git");
    git.name = Some("git".into());
    pipeline.materials.add(MaterialConfig::from(MaterialKind::Git(git)));
    pipeline.label_template = label.to_string();
    pipeline
}

fn validate_label(label: &str) -> ConfigErrors {
    let pipeline = create_test_pipeline(label);
    let ctx = ValidationContext::new(&EmptyLookup);
    pipeline.validate(&ctx)
}

fn assert_label_is_invalid(label: &str, expected: &str) {
    assert_eq!(validate_label(label).on("labelTemplate"), Some(expected));
}

// ============================================================================
// Label Template Tests
// ============================================================================

#[test]
fn test_default_label_template_is_the_build_counter() {
    let pipeline = PipelineConfig::new("p");
    assert_eq!(pipeline.label_template, "${COUNT}");
}

#[test]
fn test_label_template_cannot_be_blank() {
    assert_label_is_invalid("  ", &format!("Label cannot be blank. {LABEL_FORMAT_MESSAGE}"));
}

#[test]
fn test_label_template_without_any_token_is_invalid() {
    assert_label_is_invalid(
        "1.3.0",
        "Invalid label '1.3.0'. Label should be composed of alphanumeric text, it can \
         contain the build number as ${COUNT}, can contain a material revision as \
         ${<material-name>} of ${<material-name>[:<number>]}, or use params as \
         #{<param-name>}.",
    );
}

#[test]
fn test_malformed_tokens_are_invalid() {
    for label in ["1.3.0-{COUNT}", "1.3.0-$COUNT}", "1.3.0-${COUNT"] {
        assert_label_is_invalid(label, &format!("Invalid label '{label}'. {LABEL_FORMAT_MESSAGE}"));
    }
}

#[test]
fn test_empty_label_token_is_rejected() {
    assert_label_is_invalid("1.3.0-${}", "Label template variable cannot be blank.");
}

#[test]
fn test_count_token_is_case_insensitive() {
    assert!(validate_label("release-${count}").is_empty());
    assert!(validate_label("release-${COUNT}").is_empty());
}

#[test]
fn test_environment_variable_tokens_are_accepted() {
    assert!(validate_label("${COUNT}-${env:USER}").is_empty());
}

#[test]
fn test_environment_variable_token_needs_a_name() {
    assert_label_is_invalid("${COUNT}-${env:}", "Missing environment variable name.");
}

#[test]
fn test_material_revision_tokens_resolve_against_material_names() {
    assert!(validate_label("release-${COUNT}-${git}").is_empty());
    assert!(validate_label("release-${COUNT}-${GIT[:7]}").is_empty());
}

#[test]
fn test_unknown_material_in_label_is_reported() {
    assert_label_is_invalid(
        "pipeline-${COUNT}-${noSuch[:7]}-alpha",
        "You have defined a label template in pipeline 'release' that refers to a material \
         called 'noSuch', but no material with this name is defined.",
    );
}

#[test]
fn test_token_with_stray_bracket_is_treated_as_a_material_name() {
    assert_label_is_invalid(
        "1.3.0-${COUNT}-${git:7]}",
        "You have defined a label template in pipeline 'release' that refers to a material \
         called 'git:7]', but no material with this name is defined.",
    );
}

#[test]
fn test_broken_truncation_syntax_is_invalid() {
    for label in [
        "1.3.0-${COUNT}-${git[:7}",
        "1.3.0-${COUNT}-${git[7]}",
        "1.3.0-${COUNT}-${git[:]}",
        "1.3.0-${COUNT}-${git[:-1]}",
    ] {
        assert_label_is_invalid(label, &format!("Invalid label '{label}'. {LABEL_FORMAT_MESSAGE}"));
    }
}

#[test]
fn test_zero_truncation_length_is_rejected() {
    let label = "pipeline-${COUNT}-${git[:0]}-alpha";
    assert_label_is_invalid(
        label,
        &format!("Length of zero not allowed on label {label} defined on pipeline release."),
    );
}

#[test]
fn test_leading_zero_truncation_length_is_rejected() {
    let label = "pipeline-${COUNT}-${git[:0]}${one[:00]}-alpha";
    assert_label_is_invalid(
        label,
        &format!("Length of zero not allowed on label {label} defined on pipeline release."),
    );
}

#[test]
fn test_only_the_first_invalid_token_is_reported() {
    let errors = validate_label("${nope}-${}-${env:}");
    assert_eq!(errors.all_on("labelTemplate").len(), 1);
}

// ============================================================================
// Pipeline Name Tests
// ============================================================================

#[test]
fn test_pipeline_name_must_match_the_name_pattern() {
    let mut pipeline = create_test_pipeline("${COUNT}");
    pipeline.name = ".bad".into();
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = pipeline.validate(&ctx);
    let expected = invalid_name_message("pipeline", ".bad");
    assert_eq!(errors.on("name"), Some(expected.as_str()));
}

#[test]
fn test_duplicate_pipeline_names_in_the_tree_are_reported() {
    let lookup = StubLookup::of(vec![
        StubPipeline::new("release", &[("stage", &["job"])]),
        StubPipeline::new("RELEASE", &[("stage", &["job"])]),
    ]);
    let pipeline = create_test_pipeline("${COUNT}");
    let ctx = ValidationContext::new(&lookup);

    let errors = pipeline.validate(&ctx);
    assert_eq!(
        errors.on("name"),
        Some(
            "You have defined multiple pipelines called 'release'. Pipeline names are \
             case-insensitive and must be unique."
        )
    );
}

#[test]
fn test_a_single_occurrence_is_not_a_duplicate() {
    let lookup = StubLookup::of(vec![StubPipeline::new("release", &[("stage", &["job"])])]);
    let pipeline = create_test_pipeline("${COUNT}");
    let ctx = ValidationContext::new(&lookup);

    assert!(pipeline.validate(&ctx).is_empty());
}

#[test]
fn test_any_existing_pipeline_with_the_name_clashes_in_edit_mode() {
    let lookup = StubLookup::of(vec![StubPipeline::new("release", &[("stage", &["job"])])]);
    let pipeline = create_test_pipeline("${COUNT}");
    let ctx = ValidationContext::new(&lookup).in_edit_mode();

    let errors = pipeline.validate(&ctx);
    assert_eq!(
        errors.on("name"),
        Some(
            "You have defined multiple pipelines called 'release'. Pipeline names are \
             case-insensitive and must be unique."
        )
    );
}

// ============================================================================
// Template Association Tests
// ============================================================================

#[test]
fn test_a_pipeline_cannot_have_both_stages_and_a_template() {
    let mut pipeline = create_test_pipeline("${COUNT}");
    pipeline.template_name = Some("build-template".into());
    let mut lookup = StubLookup::of(Vec::new());
    lookup.add_template("build-template");
    let ctx = ValidationContext::new(&lookup);

    let errors = pipeline.validate(&ctx);
    assert_eq!(
        errors.on("stages"),
        Some("Cannot add stages to pipeline 'release' which already references template 'build-template'")
    );
    assert_eq!(
        errors.on("template"),
        Some("Cannot set template 'build-template' on pipeline 'release' because it already has stages defined")
    );
}

#[test]
fn test_a_dangling_template_reference_is_reported() {
    let mut pipeline = PipelineConfig::new("release");
    pipeline.template_name = Some("gone".into());
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = pipeline.validate(&ctx);
    assert_eq!(
        errors.on("pipeline"),
        Some("Pipeline 'release' refers to non-existent template 'gone'.")
    );
}

#[test]
fn test_a_pipeline_with_only_a_template_reference_is_valid() {
    let mut pipeline = PipelineConfig::new("release");
    pipeline.template_name = Some("build-template".into());
    let mut lookup = StubLookup::of(Vec::new());
    lookup.add_template("build-template");
    let ctx = ValidationContext::new(&lookup);

    assert!(pipeline.validate(&ctx).is_empty());
}

#[test]
fn test_a_pipeline_without_template_needs_stages() {
    let pipeline = PipelineConfig::new("release");
    let ctx = ValidationContext::new(&EmptyLookup);

    let errors = pipeline.validate(&ctx);
    assert_eq!(
        errors.on("pipeline"),
        Some(
            "Pipeline 'release' does not have any stages configured. A pipeline must have \
             at least one stage."
        )
    );
}

// ============================================================================
// Stage Navigation Tests
// ============================================================================

#[test]
fn test_stage_navigation_follows_declaration_order() {
    let pipeline = PipelineConfig::with_stages(
        "p",
        vec![
            StageConfig::with_jobs("build", vec![JobConfig::new("job")]),
            StageConfig::with_jobs("test", vec![JobConfig::new("job")]),
            StageConfig::with_jobs("deploy", vec![JobConfig::new("job")]),
        ],
    );

    assert_eq!(pipeline.stage_index_of(&"TEST".into()), Some(1));
    let next = pipeline.next_stage(&"build".into());
    assert_eq!(next.map(|s| s.name.as_str()), Some("test"));
    let previous = pipeline.previous_stage(&"test".into());
    assert_eq!(previous.map(|s| s.name.as_str()), Some("build"));
    assert!(pipeline.next_stage(&"deploy".into()).is_none());
    assert!(pipeline.previous_stage(&"build".into()).is_none());
}

#[test]
fn test_depends_on_looks_at_dependency_materials() {
    let mut pipeline = PipelineConfig::new("downstream");
    pipeline.materials.add(MaterialConfig::git("url"));
    pipeline.materials.add(MaterialConfig::dependency("Upstream", "build"));

    assert!(pipeline.depends_on(&"upstream".into()));
    assert!(!pipeline.depends_on(&"other".into()));
}

// ============================================================================
// Lock Behavior Tests
// ============================================================================

#[test]
fn test_lock_behavior_defaults_to_none() {
    let pipeline = PipelineConfig::new("p");
    assert_eq!(pipeline.lock_behavior, LockBehavior::None);
    assert!(!pipeline.lock_behavior.is_lockable());
}

#[test]
fn test_lock_behavior_serializes_in_camel_case() {
    let json = serde_json::to_string(&LockBehavior::LockOnFailure).unwrap();
    assert_eq!(json, "\"lockOnFailure\"");
    let json = serde_json::to_string(&LockBehavior::UnlockWhenFinished).unwrap();
    assert_eq!(json, "\"unlockWhenFinished\"");

    let parsed: LockBehavior = serde_json::from_str("\"none\"").unwrap();
    assert_eq!(parsed, LockBehavior::None);
}
