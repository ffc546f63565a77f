//! Search query rewriting.
//!
//! A free-form query is intersected with the allowed-project set so it can
//! only ever return issues from permitted projects:
//!
//! ```text
//! priority = High ORDER BY updated DESC
//!        │                   │
//!   filter part          order part (kept verbatim, always last)
//!        ▼
//! (project = "BP" OR (project = "PM" AND (issuetype = Bug))) AND (priority = High) ORDER BY updated DESC
//! ```
//!
//! # Fail-Closed Cases
//!
//! The filter part is pasted inside its own parenthesis group, so it must
//! not be able to close that group early. A filter whose parentheses do not
//! nest (outside quoted literals), or that leaves a quote open, is replaced
//! by [`DENY_ALL_CLAUSE`] alone. A scoped rule whose `jql` fragment fails
//! the same check contributes no clause.
//!
//! # Known Limitation
//!
//! [`split_order_clause`] is a textual scan, not a query-language parse. An
//! `ORDER BY` inside a quoted literal is taken as the sort clause. The
//! filter part then ends inside an open quote and fails closed.

use jgate_policy::{OrgPolicy, PolicyStore, ProjectFilters, ProjectRule};
use std::sync::Arc;

/// Always-false project predicate used when no project is permitted.
pub const DENY_ALL_CLAUSE: &str = r#"project = "NONE""#;

const ORDER: &[u8] = b"order";
const BY: &[u8] = b"by";

/// Splits `query` at the first `ORDER BY` keyword (case-insensitive).
///
/// Returns `(filter, order)` where `order` starts at the keyword and runs
/// to the end of the input. Without a sort clause `order` is empty.
///
/// # Example
///
/// ```
/// use jgate_auth::split_order_clause;
///
/// assert_eq!(
///     split_order_clause("status = Open order by created"),
///     ("status = Open ", "order by created")
/// );
/// assert_eq!(split_order_clause("recordedBy = me"), ("recordedBy = me", ""));
/// ```
#[must_use]
pub fn split_order_clause(query: &str) -> (&str, &str) {
    match find_order_by(query.as_bytes()) {
        Some(at) => query.split_at(at),
        None => (query, ""),
    }
}

/// Byte offset of the first `ORDER <ws>+ BY` standing as whole words.
///
/// The match always starts on an ASCII byte, so the offset is a char
/// boundary.
fn find_order_by(bytes: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = find_ignore_case(&bytes[from..], ORDER) {
        let at = from + offset;
        from = at + 1;

        if at > 0 && is_word_byte(bytes[at - 1]) {
            continue;
        }

        let gap_start = at + ORDER.len();
        let gap = bytes[gap_start..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        if gap == 0 {
            continue;
        }

        let by_start = gap_start + gap;
        let is_by = bytes
            .get(by_start..by_start + BY.len())
            .is_some_and(|word| word.eq_ignore_ascii_case(BY));
        let ends_word = !bytes
            .get(by_start + BY.len())
            .is_some_and(|&b| is_word_byte(b));
        if is_by && ends_word {
            return Some(at);
        }
    }
    None
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

// Non-ASCII bytes count as word characters so `ÜORDER BY` is not a keyword.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || !b.is_ascii()
}

/// Returns `true` if every `(` outside quoted literals has a matching `)`
/// and every quote is closed.
///
/// `"` and `'` open literals; a backslash escapes the next character inside
/// one.
///
/// # Example
///
/// ```
/// use jgate_auth::has_balanced_groups;
///
/// assert!(has_balanced_groups(r#"a = 1 AND (b = 2 OR summary ~ "x)")"#));
/// assert!(!has_balanced_groups(r#"a = 1) OR (project = "SECRET""#));
/// assert!(!has_balanced_groups(r#"summary ~ "open"#));
/// ```
#[must_use]
pub fn has_balanced_groups(text: &str) -> bool {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(_) if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return false,
                },
                _ => {}
            },
        }
    }

    depth == 0 && quote.is_none()
}

/// Rewrites `query` against one policy.
///
/// `None` (no effective policy) behaves like an empty project list and
/// yields the [`DENY_ALL_CLAUSE`]. A wildcard project list returns the
/// query unchanged. A filter part that fails [`has_balanced_groups`]
/// yields [`DENY_ALL_CLAUSE`] alone.
#[must_use]
pub fn compose(query: &str, policy: Option<&OrgPolicy>) -> String {
    if policy.is_some_and(OrgPolicy::allows_all_projects) {
        return query.to_string();
    }

    let (filter, order) = split_order_clause(query);
    let filter = filter.trim();

    if !has_balanced_groups(filter) {
        tracing::warn!(
            query,
            "unbalanced parentheses or quotes in query filter: matching nothing"
        );
        return DENY_ALL_CLAUSE.to_string();
    }

    let clauses: Vec<String> = policy
        .map(|p| p.allowed_projects.iter().filter_map(project_clause).collect())
        .unwrap_or_default();

    let mut composed = if clauses.is_empty() {
        DENY_ALL_CLAUSE.to_string()
    } else {
        format!("({})", clauses.join(" OR "))
    };

    if !filter.is_empty() {
        composed.push_str(" AND (");
        composed.push_str(filter);
        composed.push(')');
    }

    if !order.is_empty() {
        composed.push(' ');
        composed.push_str(order);
    }

    composed
}

fn project_clause(rule: &ProjectRule) -> Option<String> {
    let key = rule.project_key()?;
    let clause = match rule.filters().and_then(ProjectFilters::sub_jql) {
        Some(sub) if !has_balanced_groups(sub) => {
            tracing::warn!(
                project = key,
                jql = sub,
                "unbalanced project jql filter: project excluded"
            );
            return None;
        }
        Some(sub) => format!(r#"(project = "{key}" AND ({sub}))"#),
        None => format!(r#"project = "{key}""#),
    };
    Some(clause)
}

/// Rewrites search queries against the effective policy.
///
/// # Example
///
/// ```
/// use jgate_auth::QueryFilterComposer;
/// use jgate_policy::{OrgPolicy, PolicyDocument, PolicyStore, ProjectRule};
/// use std::sync::Arc;
///
/// let store = Arc::new(PolicyStore::from_document(PolicyDocument::with_defaults(
///     OrgPolicy::permissive().with_projects([ProjectRule::key("PROJ")]),
/// )));
/// let composer = QueryFilterComposer::new(store);
///
/// assert_eq!(
///     composer.rewrite("assignee = currentUser() ORDER BY updated DESC", None),
///     r#"(project = "PROJ") AND (assignee = currentUser()) ORDER BY updated DESC"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct QueryFilterComposer {
    store: Arc<PolicyStore>,
}

impl QueryFilterComposer {
    /// Creates a composer reading from `store`.
    #[must_use]
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Intersects `query` with the allowed projects for `alias`.
    ///
    /// Never fails: with no effective policy the result matches nothing.
    #[must_use]
    pub fn rewrite(&self, query: &str, alias: Option<&str>) -> String {
        let policy = self.store.effective_policy(alias);
        if policy.is_none() {
            tracing::warn!(org = ?alias, "no effective policy: query restricted to nothing");
        }
        let rewritten = compose(query, policy.as_ref());
        tracing::debug!(query, rewritten = %rewritten, "query rewritten");
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jgate_policy::PolicyDocument;

    fn policy(projects: Vec<ProjectRule>) -> OrgPolicy {
        OrgPolicy::permissive().with_projects(projects)
    }

    fn with_jql(key: &str, jql: &str) -> ProjectRule {
        ProjectRule::scoped(key).with_filters(ProjectFilters {
            participated: None,
            jql: Some(jql.to_string()),
        })
    }

    // ── split_order_clause ──────────────────────────────────

    #[test]
    fn split_without_order_clause() {
        assert_eq!(split_order_clause("priority = High"), ("priority = High", ""));
        assert_eq!(split_order_clause(""), ("", ""));
    }

    #[test]
    fn split_is_case_insensitive() {
        assert_eq!(
            split_order_clause("a = 1 Order  By b"),
            ("a = 1 ", "Order  By b")
        );
        assert_eq!(split_order_clause("ORDER\tBY rank"), ("", "ORDER\tBY rank"));
    }

    #[test]
    fn split_uses_first_match() {
        assert_eq!(
            split_order_clause("a = 1 ORDER BY b ORDER BY c"),
            ("a = 1 ", "ORDER BY b ORDER BY c")
        );
    }

    #[test]
    fn split_requires_word_boundaries() {
        assert_eq!(split_order_clause("reorder by = x"), ("reorder by = x", ""));
        assert_eq!(split_order_clause("orderby = x"), ("orderby = x", ""));
        assert_eq!(split_order_clause("order bypass = x"), ("order bypass = x", ""));
        assert_eq!(split_order_clause("order_by = x"), ("order_by = x", ""));
    }

    #[test]
    fn split_handles_non_ascii_text() {
        assert_eq!(
            split_order_clause("summary ~ \"café\" ORDER BY key"),
            ("summary ~ \"café\" ", "ORDER BY key")
        );
        assert_eq!(split_order_clause("éorder by x"), ("éorder by x", ""));
    }

    #[test]
    fn split_inside_quoted_literal_is_a_known_limitation() {
        let (filter, order) = split_order_clause(r#"summary ~ "order by me" AND a = 1"#);
        assert_eq!(filter, r#"summary ~ ""#);
        assert_eq!(order, r#"order by me" AND a = 1"#);
    }

    // ── compose ─────────────────────────────────────────────

    #[test]
    fn wildcard_is_a_no_op() {
        let p = policy(vec![ProjectRule::key("BP"), ProjectRule::Wildcard]);
        for q in ["priority = High", "", "x ORDER BY y", "  spaced  "] {
            assert_eq!(compose(q, Some(&p)), q);
        }
    }

    #[test]
    fn project_intersection() {
        let p = policy(vec![ProjectRule::key("BP"), ProjectRule::key("PM")]);
        assert_eq!(
            compose("priority = High", Some(&p)),
            r#"(project = "BP" OR project = "PM") AND (priority = High)"#
        );
    }

    #[test]
    fn sub_filter_composition() {
        let p = policy(vec![ProjectRule::key("BP"), with_jql("PM", "issuetype = Bug")]);
        assert_eq!(
            compose("priority = High", Some(&p)),
            r#"(project = "BP" OR (project = "PM" AND (issuetype = Bug))) AND (priority = High)"#
        );
    }

    #[test]
    fn blank_sub_filter_is_ignored() {
        let p = policy(vec![with_jql("PM", "   ")]);
        assert_eq!(compose("a = 1", Some(&p)), r#"(project = "PM") AND (a = 1)"#);
    }

    #[test]
    fn order_clause_is_preserved_last() {
        let p = policy(vec![ProjectRule::key("PROJ")]);
        assert_eq!(
            compose("assignee = currentUser() ORDER BY updated DESC", Some(&p)),
            r#"(project = "PROJ") AND (assignee = currentUser()) ORDER BY updated DESC"#
        );
        assert_eq!(
            compose("ORDER BY updated DESC", Some(&p)),
            r#"(project = "PROJ") ORDER BY updated DESC"#
        );
    }

    #[test]
    fn empty_query_yields_project_group_alone() {
        let p = policy(vec![ProjectRule::key("BP")]);
        assert_eq!(compose("", Some(&p)), r#"(project = "BP")"#);
        assert_eq!(compose("   ", Some(&p)), r#"(project = "BP")"#);
    }

    #[test]
    fn empty_allow_list_uses_sentinel() {
        let p = policy(vec![]);
        assert_eq!(
            compose("priority = High", Some(&p)),
            r#"project = "NONE" AND (priority = High)"#
        );
        assert_eq!(compose("", Some(&p)), DENY_ALL_CLAUSE);
    }

    #[test]
    fn unbalanced_filter_cannot_escape_project_scope() {
        let p = policy(vec![ProjectRule::key("BP")]);
        assert_eq!(
            compose(r#"a = 1) OR (project = "SECRET""#, Some(&p)),
            DENY_ALL_CLAUSE
        );
        assert_eq!(compose("(a = 1", Some(&p)), DENY_ALL_CLAUSE);
        assert_eq!(compose("a = 1) ORDER BY key", Some(&p)), DENY_ALL_CLAUSE);
    }

    #[test]
    fn parentheses_inside_literals_are_ignored() {
        let p = policy(vec![ProjectRule::key("BP")]);
        assert_eq!(
            compose(r#"summary ~ "a) OR (b" AND (c = 1)"#, Some(&p)),
            r#"(project = "BP") AND (summary ~ "a) OR (b" AND (c = 1))"#
        );
        assert_eq!(
            compose(r"summary ~ 'it\'s (x'", Some(&p)),
            r#"(project = "BP") AND (summary ~ 'it\'s (x')"#
        );
    }

    #[test]
    fn order_by_inside_literal_fails_closed() {
        let p = policy(vec![ProjectRule::key("BP")]);
        assert_eq!(
            compose(r#"summary ~ "order by me" OR project = SECRET"#, Some(&p)),
            DENY_ALL_CLAUSE
        );
    }

    #[test]
    fn unbalanced_sub_filter_excludes_its_project() {
        let p = policy(vec![
            ProjectRule::key("BP"),
            with_jql("PM", "issuetype = Bug) OR (project = SECRET"),
        ]);
        assert_eq!(compose("a = 1", Some(&p)), r#"(project = "BP") AND (a = 1)"#);

        let p = policy(vec![with_jql("PM", "(issuetype = Bug")]);
        assert_eq!(compose("a = 1", Some(&p)), r#"project = "NONE" AND (a = 1)"#);
    }

    #[test]
    fn missing_policy_uses_sentinel() {
        assert_eq!(
            compose("a = 1 ORDER BY key", None),
            r#"project = "NONE" AND (a = 1) ORDER BY key"#
        );
    }

    // ── QueryFilterComposer ─────────────────────────────────

    #[test]
    fn rewrite_reads_effective_policy() {
        let doc = PolicyDocument::with_defaults(OrgPolicy::permissive()).with_organization(
            "acme",
            policy(vec![ProjectRule::key("BP")]),
        );
        let composer = QueryFilterComposer::new(Arc::new(PolicyStore::from_document(doc)));

        assert_eq!(composer.rewrite("a = 1", None), "a = 1");
        assert_eq!(
            composer.rewrite("a = 1", Some("acme")),
            r#"(project = "BP") AND (a = 1)"#
        );
    }

    #[test]
    fn rewrite_without_policy_fails_closed() {
        let composer = QueryFilterComposer::new(Arc::new(PolicyStore::empty()));
        assert_eq!(composer.rewrite("", None), DENY_ALL_CLAUSE);
    }
}
