//! Tests for roles and security settings.

use super::*;
use crate::context::EmptyLookup;

fn validate(node: &dyn ConfigNode) -> ConfigErrors {
    let lookup = EmptyLookup;
    let ctx = ValidationContext::new(&lookup);
    node.validate(&ctx)
}

#[test]
fn test_role_with_valid_name_passes() {
    let role = Role::with_users("qa_lead", ["alice", "bob"]);
    assert!(validate(&role).is_empty());
}

#[test]
fn test_role_with_invalid_name_is_rejected() {
    let role = Role::new(".hidden");
    let errors = validate(&role);
    assert_eq!(
        errors.on("name"),
        Some(invalid_name_message("role", ".hidden").as_str())
    );
}

#[test]
fn test_duplicate_users_within_a_role_are_rejected() {
    let role = Role::with_users("dev", ["alice", "bob", "ALICE"]);
    let errors = validate(&role);
    assert_eq!(errors.on("users"), Some("User 'ALICE' already exists in 'dev'."));
}

#[test]
fn test_duplicate_role_names_are_rejected() {
    let mut security = SecurityConfig::new();
    security.add_role(Role::new("admin"));
    security.add_role(Role::new("ADMIN"));

    let errors = validate(&security);
    assert_eq!(
        errors.on("role"),
        Some("Role names should be unique. Duplicate names found.")
    );
}

#[test]
fn test_admin_role_reference_must_exist() {
    let mut security = SecurityConfig::new();
    security.add_role(Role::new("ops"));
    security.admins.roles.push("non-existent-role".into());

    let errors = validate(&security);
    assert_eq!(
        errors.on("roles"),
        Some("Role \"non-existent-role\" does not exist.")
    );
}

#[test]
fn test_admin_role_reference_ignores_case() {
    let mut security = SecurityConfig::new();
    security.add_role(Role::new("Ops"));
    security.admins.roles.push("OPS".into());

    assert!(validate(&security).is_empty());
}

#[test]
fn test_role_membership_lookup() {
    let role = Role::with_users("dev", ["Alice"]);
    assert!(role.has_user(&"alice".into()));
    assert!(!role.has_user(&"mallory".into()));

    let mut security = SecurityConfig::new();
    security.add_role(role);
    assert!(security.has_role(&"DEV".into()));
    assert!(security.role_named(&"dev".into()).is_some());
    assert!(!security.has_role(&"other".into()));
}
