//! Cross-component behavior over YAML policy documents.
//!
//! Each test parses a policy the way an operator would write it and drives
//! the resolver, composer, and validator off one shared store.

use jgate_auth::{
    normalize, IssueRecord, ParticipationValidator, PermissionResolver, QueryFilterComposer,
};
use jgate_policy::{PolicyDocument, PolicyStore};
use std::sync::Arc;

fn store(yaml: &str) -> Arc<PolicyStore> {
    let doc = PolicyDocument::from_yaml(yaml).expect("policy YAML should parse");
    doc.validate().expect("policy should validate");
    Arc::new(PolicyStore::from_document(doc))
}

const ACME: &str = r#"
defaults:
  allowed-jira-projects: ["all"]
  allowed-commands: ["all"]
organizations:
  acme:
    allowed-jira-projects:
      - BP
      - key: PM
        commands: ["issue.get", "issue.comment"]
        filters:
          jql: "issuetype = Bug"
          participated: { was-assignee: true, was-commenter: true }
    allowed-commands: ["issue", "me"]
    allowed-confluence-spaces: ["DOCS"]
"#;

/// Organization entry wins over defaults; unknown aliases fall back.
#[test]
fn organization_selection() {
    let resolver = PermissionResolver::new(store(ACME));

    assert!(!resolver.is_project_allowed("XX", Some("acme")));
    assert!(resolver.is_project_allowed("XX", Some("globex")));
    assert!(resolver.is_project_allowed("XX", None));
    assert!(!resolver.is_space_allowed("HR", Some("acme")));
    assert!(resolver.is_space_allowed("DOCS", Some("acme")));
}

/// Ambient organization from the store is used when no alias is passed.
#[test]
fn current_org_applies_without_alias() {
    let doc = PolicyDocument::from_yaml(ACME).unwrap();
    let store = Arc::new(PolicyStore::from_document(doc).with_current_org("acme"));
    let resolver = PermissionResolver::new(store);

    assert!(!resolver.is_project_allowed("XX", None));
    assert!(resolver.is_project_allowed("BP", None));
}

/// Scoped commands replace the global list for that project only.
#[test]
fn scoped_commands_replace_not_merge() {
    let resolver = PermissionResolver::new(store(ACME));
    let acme = Some("acme");

    assert!(resolver.is_command_allowed("issue.delete", Some("BP"), acme));
    assert!(resolver.is_command_allowed("issue.comment.add", Some("PM"), acme));
    assert!(!resolver.is_command_allowed("issue.delete", Some("PM"), acme));
    // "me" is granted globally but not in PM's own list.
    assert!(resolver.is_command_allowed("me", Some("BP"), acme));
    assert!(!resolver.is_command_allowed("me", Some("PM"), acme));
}

/// Legacy names in a request and in the policy both resolve to paths.
#[test]
fn legacy_names_on_both_sides() {
    let resolver = PermissionResolver::new(store(ACME));
    assert!(resolver.is_command_allowed("add-label-to-issue", Some("BP"), Some("acme")));
    assert!(resolver.is_command_allowed("user.me", Some("BP"), Some("acme")));
    assert!(!resolver.is_command_allowed("get-page", Some("BP"), Some("acme")));
}

/// A legacy request name is covered by a coarse hierarchical grant.
#[test]
fn legacy_request_against_coarse_grant() {
    let resolver = PermissionResolver::new(store(
        r#"
defaults:
  allowed-commands: ["user"]
"#,
    ));
    assert!(resolver.is_command_allowed("me", None, None));
    assert_eq!(
        resolver.is_command_allowed("me", None, None),
        resolver.is_command_allowed("user.me", None, None)
    );
    assert!(!resolver.is_command_allowed("get-issue", None, None));
}

/// Exempt commands work with no policy at all.
#[test]
fn exempt_commands_without_policy() {
    let resolver = PermissionResolver::new(Arc::new(PolicyStore::empty()));
    for command in ["about", "auth.login", "settings", "settings.apply"] {
        assert!(resolver.is_command_allowed(command, None, None), "{command}");
    }
    assert!(!resolver.is_command_allowed("issue.get", None, None));
    assert!(!resolver.is_project_allowed("BP", None));
}

/// A legacy flat file evaluates like its migrated `defaults`.
#[test]
fn legacy_schema_is_migrated() {
    let legacy = store(
        r#"
projects: ["BP"]
commands: ["add-label-to-issue", "me"]
"#,
    );
    let resolver = PermissionResolver::new(Arc::clone(&legacy));

    assert!(resolver.is_project_allowed("BP", None));
    assert!(!resolver.is_project_allowed("PM", None));
    assert!(resolver.is_command_allowed("issue.label.add", Some("BP"), None));
    assert!(!resolver.is_command_allowed("issue.label.remove", Some("BP"), None));

    let saved = legacy.get().unwrap().to_yaml().unwrap();
    assert!(saved.contains("add-label-to-issue"));
    assert!(!saved.contains("issue.label.add"));
}

/// Normalisation is idempotent for everything a policy might contain.
#[test]
fn normalize_idempotence() {
    for command in ["me", "add-label-to-issue", "issue.get", "unknown-thing", "all"] {
        let once = normalize(command);
        assert_eq!(normalize(once.as_str()), once);
    }
}

// ── Query rewriting ─────────────────────────────────────────

#[test]
fn rewrite_uses_organization_projects_and_sub_filters() {
    let composer = QueryFilterComposer::new(store(ACME));

    assert_eq!(
        composer.rewrite("priority = High ORDER BY updated DESC", Some("acme")),
        r#"(project = "BP" OR (project = "PM" AND (issuetype = Bug))) AND (priority = High) ORDER BY updated DESC"#
    );
    assert_eq!(
        composer.rewrite("priority = High ORDER BY updated DESC", None),
        "priority = High ORDER BY updated DESC"
    );
}

/// A filter that closes its own group early cannot widen the project scope.
#[test]
fn rewrite_rejects_filter_escaping_its_group() {
    let composer = QueryFilterComposer::new(store(
        r#"
defaults:
  allowed-jira-projects: ["BP"]
"#,
    ));
    let rewritten = composer.rewrite(r#"a = 1) OR (project = "SECRET""#, None);
    assert_eq!(rewritten, r#"project = "NONE""#);
    assert!(!rewritten.contains("SECRET"));
}

#[test]
fn rewrite_with_empty_allow_list_fails_closed() {
    let composer = QueryFilterComposer::new(store(
        r#"
defaults:
  allowed-jira-projects: []
"#,
    ));
    assert_eq!(
        composer.rewrite("priority = High", None),
        r#"project = "NONE" AND (priority = High)"#
    );
}

#[test]
fn rewrite_keeps_order_clause_last_for_any_casing() {
    let composer = QueryFilterComposer::new(store(
        r#"
defaults:
  allowed-jira-projects: ["PROJ"]
"#,
    ));
    for (query, expected) in [
        (
            "status = Open order by rank",
            r#"(project = "PROJ") AND (status = Open) order by rank"#,
        ),
        ("Order By rank", r#"(project = "PROJ") Order By rank"#),
        ("", r#"(project = "PROJ")"#),
    ] {
        assert_eq!(composer.rewrite(query, None), expected, "query {query:?}");
    }
}

// ── Participation ───────────────────────────────────────────

#[test]
fn participation_gate_on_fetched_records() {
    let validator = ParticipationValidator::new(store(ACME));
    let acme = Some("acme");

    let assigned = IssueRecord::new("PM-1").with_assignee("me");
    let commented = IssueRecord::new("PM-2").with_comment_author("me");
    let reported = IssueRecord::new("PM-3").with_reporter("me");

    assert!(validator.is_allowed(&assigned, "me", acme));
    assert!(validator.is_allowed(&commented, "me", acme));
    assert!(!validator.is_allowed(&reported, "me", acme));
    // Bare rule: no constraint.
    assert!(validator.is_allowed(&IssueRecord::new("BP-1"), "me", acme));
    // Project outside the allow-list.
    assert!(!validator.is_allowed(&IssueRecord::new("XX-1"), "me", acme));
}

#[test]
fn participation_from_rest_json() {
    let validator = ParticipationValidator::new(store(ACME));
    let record = IssueRecord::from_json(&serde_json::json!({
        "key": "PM-4",
        "fields": {
            "assignee": { "accountId": "someone-else" },
            "comment": { "comments": [ { "author": { "accountId": "me" } } ] }
        }
    }))
    .unwrap();

    assert!(validator.is_allowed(&record, "me", Some("acme")));
    assert!(!validator.is_allowed(&record, "stranger", Some("acme")));
}

// ── Cache lifecycle ─────────────────────────────────────────

#[test]
fn apply_changes_decisions_for_all_components() {
    let store = store(ACME);
    let resolver = PermissionResolver::new(Arc::clone(&store));
    let composer = QueryFilterComposer::new(Arc::clone(&store));
    assert!(resolver.is_project_allowed("XX", None));

    store.apply(
        PolicyDocument::from_yaml(
            r#"
defaults:
  allowed-jira-projects: ["BP"]
"#,
        )
        .unwrap(),
    );

    assert!(!resolver.is_project_allowed("XX", None));
    assert_eq!(composer.rewrite("a = 1", None), r#"(project = "BP") AND (a = 1)"#);
}
