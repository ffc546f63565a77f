//! Post-fetch participation checks.
//!
//! A project rule may require that the current user took part in an issue
//! (assignee, reporter, commenter, or watcher). The check runs after the
//! record is fetched, on top of the project and command gates.

use crate::AccessDenied;
use jgate_policy::{OrgPolicy, ParticipationSpec, PolicyStore, ProjectRule};
use serde_json::Value;
use std::sync::Arc;

/// A user reference on a fetched issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRef {
    /// Stable account id.
    pub id: String,
}

impl UserRef {
    /// Creates a user reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Reads `accountId`, then `id`, then `name` from a user object.
    fn from_json(value: &Value) -> Option<Self> {
        ["accountId", "id", "name"]
            .into_iter()
            .find_map(|field| value.get(field).and_then(Value::as_str))
            .map(Self::new)
    }
}

/// The participation-relevant view of a fetched issue.
///
/// `is_watching` is resolved by the caller; the validator does no lookups.
///
/// # Example
///
/// ```
/// use jgate_auth::IssueRecord;
///
/// let record = IssueRecord::new("PM-7")
///     .with_assignee("u1")
///     .with_comment_author("u2")
///     .with_comment_author("u3")
///     .watching(true);
///
/// assert_eq!(record.project_key(), "PM");
/// assert_eq!(record.assignee.as_ref().map(|u| u.id.as_str()), Some("u1"));
/// assert!(record.reporter.is_none());
/// assert_eq!(record.comment_authors.len(), 2);
/// assert!(record.is_watching);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueRecord {
    /// Issue key, such as `BP-123`.
    pub key: String,
    /// Current assignee, if any.
    pub assignee: Option<UserRef>,
    /// User who created the issue, if known.
    pub reporter: Option<UserRef>,
    /// Author of each comment, in comment order. May repeat.
    pub comment_authors: Vec<UserRef>,
    /// Whether the current user watches the issue.
    pub is_watching: bool,
}

impl IssueRecord {
    /// Creates a record with no people attached.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the assignee.
    #[must_use]
    pub fn with_assignee(mut self, id: impl Into<String>) -> Self {
        self.assignee = Some(UserRef::new(id));
        self
    }

    /// Sets the reporter.
    #[must_use]
    pub fn with_reporter(mut self, id: impl Into<String>) -> Self {
        self.reporter = Some(UserRef::new(id));
        self
    }

    /// Appends one comment author. Call once per comment.
    #[must_use]
    pub fn with_comment_author(mut self, id: impl Into<String>) -> Self {
        self.comment_authors.push(UserRef::new(id));
        self
    }

    /// Sets whether the current user watches the issue.
    #[must_use]
    pub fn watching(mut self, value: bool) -> Self {
        self.is_watching = value;
        self
    }

    /// Text before the first `-` of the key (`BP` for `BP-123`).
    #[must_use]
    pub fn project_key(&self) -> &str {
        self.key.split_once('-').map_or(self.key.as_str(), |(p, _)| p)
    }

    /// Builds a record from the tracker's REST issue shape.
    ///
    /// ```text
    /// key
    /// fields.assignee.accountId
    /// fields.reporter.accountId
    /// fields.comment.comments[].author.accountId
    /// fields.watches.isWatching
    /// ```
    ///
    /// Returns `None` if `key` is missing or not a string. Missing people
    /// and comments are simply absent.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let key = value.get("key")?.as_str()?;
        let fields = value.get("fields");
        let field = |name: &str| fields.and_then(|f| f.get(name));

        let comment_authors = field("comment")
            .and_then(|c| c.get("comments"))
            .and_then(Value::as_array)
            .map(|comments| {
                comments
                    .iter()
                    .filter_map(|c| c.get("author").and_then(UserRef::from_json))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            key: key.to_string(),
            assignee: field("assignee").and_then(UserRef::from_json),
            reporter: field("reporter").and_then(UserRef::from_json),
            comment_authors,
            is_watching: field("watches")
                .and_then(|w| w.get("isWatching"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

/// Outcome of evaluating one record against one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Allowed,
    ProjectNotAllowed,
    NotParticipant,
}

fn evaluate(policy: &OrgPolicy, record: &IssueRecord, user: &str) -> Verdict {
    let Some(rule) = policy.rule_for(record.project_key()) else {
        return Verdict::ProjectNotAllowed;
    };
    match participation_of(rule) {
        Some(spec) if !spec.is_unconstrained() => {
            if participated(spec, record, user) {
                Verdict::Allowed
            } else {
                Verdict::NotParticipant
            }
        }
        _ => Verdict::Allowed,
    }
}

fn participation_of(rule: &ProjectRule) -> Option<&ParticipationSpec> {
    rule.filters().and_then(|f| f.participated.as_ref())
}

fn participated(spec: &ParticipationSpec, record: &IssueRecord, user: &str) -> bool {
    let is_user = |r: &Option<UserRef>| r.as_ref().is_some_and(|u| u.id == user);

    (spec.was_assignee && is_user(&record.assignee))
        || (spec.was_reporter && is_user(&record.reporter))
        || (spec.was_commenter && record.comment_authors.iter().any(|a| a.id == user))
        || (spec.is_watcher && record.is_watching)
}

/// Applies per-project participation constraints to fetched records.
///
/// # Example
///
/// ```
/// use jgate_auth::{IssueRecord, ParticipationValidator};
/// use jgate_policy::{OrgPolicy, ParticipationSpec, PolicyDocument, PolicyStore, ProjectFilters, ProjectRule};
/// use std::sync::Arc;
///
/// let rule = ProjectRule::scoped("PM").with_filters(ProjectFilters {
///     participated: Some(ParticipationSpec { was_assignee: true, ..Default::default() }),
///     jql: None,
/// });
/// let store = Arc::new(PolicyStore::from_document(PolicyDocument::with_defaults(
///     OrgPolicy::permissive().with_projects([rule]),
/// )));
/// let validator = ParticipationValidator::new(store);
///
/// let mine = IssueRecord::new("PM-1").with_assignee("u1");
/// assert!(validator.is_allowed(&mine, "u1", None));
/// assert!(!validator.is_allowed(&mine, "u2", None));
/// ```
#[derive(Debug, Clone)]
pub struct ParticipationValidator {
    store: Arc<PolicyStore>,
}

impl ParticipationValidator {
    /// Creates a validator reading from `store`.
    #[must_use]
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if `current_user` may see `record`.
    #[must_use]
    pub fn is_allowed(&self, record: &IssueRecord, current_user: &str, alias: Option<&str>) -> bool {
        self.ensure_allowed(record, current_user, alias).is_ok()
    }

    /// Like [`is_allowed`](Self::is_allowed), with a reason.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::NoPolicy`], [`AccessDenied::ProjectDenied`] or
    /// [`AccessDenied::NotParticipant`].
    pub fn ensure_allowed(
        &self,
        record: &IssueRecord,
        current_user: &str,
        alias: Option<&str>,
    ) -> Result<(), AccessDenied> {
        let Some(policy) = self.store.effective_policy(alias) else {
            let org = alias.or(self.store.current_org());
            tracing::warn!(org = ?org, issue = %record.key, "no effective policy: denying");
            return Err(AccessDenied::no_policy(org));
        };

        match evaluate(&policy, record, current_user) {
            Verdict::Allowed => {
                tracing::debug!(issue = %record.key, "participation check passed");
                Ok(())
            }
            Verdict::ProjectNotAllowed => {
                tracing::warn!(issue = %record.key, "issue denied: project not allowed");
                Err(AccessDenied::ProjectDenied {
                    project: record.project_key().to_string(),
                })
            }
            Verdict::NotParticipant => {
                tracing::warn!(issue = %record.key, user = current_user, "issue denied: not a participant");
                Err(AccessDenied::NotParticipant {
                    issue: record.key.clone(),
                })
            }
        }
    }
}
