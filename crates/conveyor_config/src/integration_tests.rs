//! Cross-module integration tests: whole configuration trees are built,
//! merged, validated and cached together, complementing the unit tests
//! that live next to each module.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::agents::AgentConfig;
use crate::environments::BasicEnvironmentConfig;
use crate::jobs::JobConfig;
use crate::materials::MaterialConfig;
use crate::partials::PartialConfig;
use crate::pipeline_group::{BasicPipelineGroup, PipelineGroup};
use crate::stages::StageConfig;
use crate::tasks::{ExecTask, Task};
use crate::templates::PipelineTemplateConfig;
use crate::{
    validate_pipeline_for_edit, CaseInsensitiveName, ConfigOrigin, ConveyorConfig,
    PipelineConfig, PipelineLookupCache,
};

fn pipeline_with_material(name: &str, url: &str) -> PipelineConfig {
    let job = JobConfig::with_tasks("compile", vec![Task::exec(ExecTask::new("ls"))]);
    let stage = StageConfig::with_jobs("build", vec![job]);
    let mut pipeline = PipelineConfig::with_stages(name, vec![stage]);
    pipeline.materials.add(MaterialConfig::git(url));
    pipeline
}

fn dependent_pipeline(name: &str, url: &str, upstream: &str) -> PipelineConfig {
    let mut pipeline = pipeline_with_material(name, url);
    pipeline.materials.add(MaterialConfig::dependency(upstream, "build"));
    pipeline
}

/// A tree using every top-level section at once validates cleanly and
/// answers the dependency and template queries consistently.
#[test]
fn test_a_realistic_configuration_validates_cleanly() {
    let mut config = ConveyorConfig::new();
    config.add_group(BasicPipelineGroup::with_pipelines(
        "apps",
        vec![
            pipeline_with_material("build", "https://example.com/app.git"),
            dependent_pipeline("test", "https://example.com/app.git", "build"),
            dependent_pipeline("deploy", "https://example.com/app.git", "test"),
        ],
    ));
    config.add_template(PipelineTemplateConfig::with_stages(
        "services",
        vec![StageConfig::with_jobs(
            "package",
            vec![JobConfig::with_tasks("archive", vec![Task::exec(ExecTask::new("tar"))])],
        )],
    ));
    let mut service = PipelineConfig::new("svc");
    service.template_name = Some("services".into());
    service.materials.add(MaterialConfig::git("https://example.com/svc.git"));
    config.add_pipeline("apps", service);

    let mut prod = BasicEnvironmentConfig::new("prod");
    prod.add_pipeline("deploy");
    prod.add_agent("agent-1");
    config.add_environment(prod);
    config.add_agent(AgentConfig::new("agent-1", "agent01", "10.0.0.7"));

    config.validate_after_preprocess();
    assert!(config.get_all_errors().is_empty());

    let downstream: Vec<CaseInsensitiveName> = config
        .downstream_pipelines_of(&"build".into())
        .into_iter()
        .map(|pipeline| pipeline.name.clone())
        .collect();
    assert_eq!(downstream, vec!["test".into()]);
    assert!(config.dependency_closure_contains(&"deploy".into(), &"build".into()));
    assert!(!config.dependency_closure_contains(&"build".into(), &"deploy".into()));

    let build = config.pipeline_config_by_name(&"build".into()).unwrap();
    let used = config.stages_used_as_materials(build);
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].name, "build".into());

    assert_eq!(
        config.templates_with_associated_pipelines(),
        vec![("services".into(), vec!["svc".into()])]
    );
}

/// Unresolved references are reported on the nodes that hold them, not
/// on the root.
#[test]
fn test_validation_reports_unresolved_references_in_place() {
    let mut config = ConveyorConfig::new();
    config.add_group(BasicPipelineGroup::with_pipelines(
        "first",
        vec![dependent_pipeline("web", "https://example.com/web.git", "ghost")],
    ));
    let mut prod = BasicEnvironmentConfig::new("prod");
    prod.add_pipeline("missing-app");
    prod.add_agent("no-such-agent");
    config.add_environment(prod);

    config.validate_after_preprocess();

    let web = config.pipeline_config_by_name(&"web".into()).unwrap();
    assert_eq!(
        web.materials.materials[1].errors().on("pipelineStageName"),
        Some(
            "Pipeline with name 'ghost' does not exist, it is defined as a dependency \
             for pipeline 'web' (conveyor-config.xml)"
        )
    );

    let all = config.get_all_errors();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|errors| {
        errors.on("pipeline") == Some("Environment 'prod' refers to an unknown pipeline 'missing-app'.")
            && errors.on("uuid") == Some("Environment 'prod' has an invalid agent uuid 'no-such-agent'")
    }));
}

/// Group names collide case-insensitively no matter the casing stored.
#[test]
#[should_panic(expected = "Group with name 'platform' already exists!")]
fn test_duplicate_group_names_are_rejected_case_insensitively() {
    let mut config = ConveyorConfig::new();
    config.add_group(BasicPipelineGroup::with_pipelines(
        "Platform",
        vec![pipeline_with_material("build", "https://example.com/a.git")],
    ));
    config.add_group(BasicPipelineGroup::with_pipelines(
        "platform",
        vec![pipeline_with_material("other", "https://example.com/b.git")],
    ));
}

/// Partial contributions merge into the main tree and validate as one,
/// including dependencies that cross the contribution boundary.
#[test]
fn test_partial_contributions_merge_into_one_validating_tree() {
    let mut main = ConveyorConfig::new();
    main.add_group(BasicPipelineGroup::with_pipelines(
        "apps",
        vec![pipeline_with_material("app", "https://example.com/app.git")],
    ));

    let origin = ConfigOrigin::repo("repo1", "https://config.git", "abc123");
    let mut partial = PartialConfig::new(origin.clone());
    partial.add_group(BasicPipelineGroup::with_pipelines(
        "apps",
        vec![dependent_pipeline(
            "app-deploy",
            "https://example.com/deploy.git",
            "app",
        )],
    ));
    partial.set_origins(origin);

    let mut config = ConveyorConfig::merged(main, vec![partial]);
    config.validate_after_preprocess();
    assert!(config.get_all_errors().is_empty());

    assert_eq!(config.all_pipelines().count(), 2);
    let group = config.group_of_pipeline(&"app-deploy".into()).unwrap();
    assert!(matches!(group, PipelineGroup::Merged(_)));
    assert_eq!(group.name(), &"apps".into());

    config.add_pipeline(
        "apps",
        pipeline_with_material("app-canary", "https://example.com/canary.git"),
    );
    config.validate_after_preprocess();
    assert!(config.get_all_errors().is_empty());
    assert_eq!(config.all_pipelines().count(), 3);
}

/// A pipeline may belong to one environment across all contributions.
#[test]
fn test_environment_membership_stays_disjoint_across_partials() {
    let origin = ConfigOrigin::repo("repo1", "https://config.git", "abc123");
    let mut partial = PartialConfig::new(origin.clone());
    partial.add_group(BasicPipelineGroup::with_pipelines(
        "remote-apps",
        vec![pipeline_with_material("papp", "https://example.com/p.git")],
    ));
    let mut remote_env = BasicEnvironmentConfig::new("prod");
    remote_env.add_pipeline("papp");
    partial.add_environment(remote_env);
    partial.set_origins(origin);

    let mut config = ConveyorConfig::merged(ConveyorConfig::new(), vec![partial]);
    let mut qa = BasicEnvironmentConfig::new("qa");
    qa.add_pipeline("papp");
    let result = catch_unwind(AssertUnwindSafe(|| config.add_environment(qa)));

    assert!(result.is_err());
    assert_eq!(config.environments().len(), 1);
    assert_eq!(config.environments()[0].name(), &"prod".into());
}

/// Saving an edited pipeline through the cache makes it visible to the
/// next edit's validation.
#[test]
fn test_the_edit_flow_against_a_cached_snapshot() {
    let mut config = ConveyorConfig::new();
    config.add_group(BasicPipelineGroup::with_pipelines(
        "first",
        vec![
            pipeline_with_material("dev", "https://example.com/dev.git"),
            pipeline_with_material("qa", "https://example.com/qa.git"),
        ],
    ));
    let cache = PipelineLookupCache::for_config(Arc::new(config));

    let mut fresh = pipeline_with_material("integration", "https://example.com/int.git");
    validate_pipeline_for_edit(&mut fresh, &cache);
    assert!(fresh.errors().is_empty());
    cache.on_pipeline_config_change(&fresh);

    let mut clash = pipeline_with_material("integration", "https://example.com/other.git");
    validate_pipeline_for_edit(&mut clash, &cache);
    assert_eq!(
        clash.errors().on("name"),
        Some(
            "You have defined multiple pipelines called 'integration'. Pipeline names are \
             case-insensitive and must be unique."
        )
    );
}

/// The whole tree, merged views included, survives a JSON round trip.
#[test]
fn test_the_tree_survives_a_json_round_trip() {
    let mut main = ConveyorConfig::new();
    main.add_group(BasicPipelineGroup::with_pipelines(
        "apps",
        vec![pipeline_with_material("app", "https://example.com/app.git")],
    ));
    let origin = ConfigOrigin::repo("repo1", "https://config.git", "abc123");
    let mut partial = PartialConfig::new(origin.clone());
    partial.add_group(BasicPipelineGroup::with_pipelines(
        "apps",
        vec![pipeline_with_material("papp", "https://example.com/p.git")],
    ));
    partial.set_origins(origin);
    let mut config = ConveyorConfig::merged(main, vec![partial]);
    let mut prod = BasicEnvironmentConfig::new("prod");
    prod.add_pipeline("app");
    config.add_environment(prod);

    let serialized = serde_json::to_string(&config).unwrap();
    let restored: ConveyorConfig = serde_json::from_str(&serialized).unwrap();

    assert_eq!(restored, config);
    assert!(restored.has_pipeline_named(&"papp".into()));
}
