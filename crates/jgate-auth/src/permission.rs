//! Project, command and space permission checks.
//!
//! # Rules
//!
//! | Check | Allowed when |
//! |-------|--------------|
//! | Project | `allowed-jira-projects` has `all` or an exact key match |
//! | Command (exempt root) | always, even with no policy |
//! | Command with project | the project's own `commands` list if non-empty, else global `allowed-commands` |
//! | Command without project | global `allowed-commands`, or any scoped project's `commands` |
//! | Space | `allowed-confluence-spaces` has `all` or an exact match |
//!
//! With no effective policy every non-exempt check is denied.
//!
//! # Audit Logging
//!
//! - Allowed decisions: debug level
//! - Denied decisions: warn level

use crate::command_path::{is_exempt, matches, normalize, CommandPath};
use crate::AccessDenied;
use jgate_policy::{OrgPolicy, PolicyStore, ProjectRule, ALL};
use std::sync::Arc;

/// Answers "may this be touched?" against the effective policy.
///
/// # Example
///
/// ```
/// use jgate_auth::PermissionResolver;
/// use jgate_policy::{OrgPolicy, PolicyDocument, PolicyStore, ProjectRule};
/// use std::sync::Arc;
///
/// let store = Arc::new(PolicyStore::from_document(PolicyDocument::with_defaults(
///     OrgPolicy::permissive()
///         .with_projects([ProjectRule::key("BP")])
///         .with_commands(["issue"]),
/// )));
/// let resolver = PermissionResolver::new(store);
///
/// assert!(resolver.is_project_allowed("BP", None));
/// assert!(!resolver.is_project_allowed("PM", None));
/// assert!(resolver.is_command_allowed("issue.label.add", Some("BP"), None));
/// assert!(!resolver.is_command_allowed("page.get", None, None));
/// assert!(resolver.is_command_allowed("settings", None, None));
/// ```
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    store: Arc<PolicyStore>,
}

impl PermissionResolver {
    /// Creates a resolver reading from `store`.
    #[must_use]
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if `key` may be touched at all.
    #[must_use]
    pub fn is_project_allowed(&self, key: &str, alias: Option<&str>) -> bool {
        self.ensure_project(key, alias).is_ok()
    }

    /// Returns `true` if `command` may run, optionally against `project`.
    #[must_use]
    pub fn is_command_allowed(
        &self,
        command: &str,
        project: Option<&str>,
        alias: Option<&str>,
    ) -> bool {
        self.ensure_command(command, project, alias).is_ok()
    }

    /// Returns `true` if wiki space `space` may be touched.
    #[must_use]
    pub fn is_space_allowed(&self, space: &str, alias: Option<&str>) -> bool {
        self.ensure_space(space, alias).is_ok()
    }

    /// Like [`is_project_allowed`](Self::is_project_allowed), with a reason.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::NoPolicy`] or [`AccessDenied::ProjectDenied`].
    pub fn ensure_project(&self, key: &str, alias: Option<&str>) -> Result<(), AccessDenied> {
        let policy = self.policy(alias)?;
        if project_allowed(&policy, key) {
            tracing::debug!(project = key, "project allowed");
            Ok(())
        } else {
            tracing::warn!(project = key, "project denied: not in allowed projects");
            Err(AccessDenied::ProjectDenied {
                project: key.to_string(),
            })
        }
    }

    /// Like [`is_command_allowed`](Self::is_command_allowed), with a reason.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::NoPolicy`] or [`AccessDenied::CommandDenied`].
    pub fn ensure_command(
        &self,
        command: &str,
        project: Option<&str>,
        alias: Option<&str>,
    ) -> Result<(), AccessDenied> {
        let path = normalize(command);
        if is_exempt(&path) {
            tracing::debug!(command = %path, "command exempt from policy");
            return Ok(());
        }

        let policy = self.policy(alias)?;
        if command_allowed(&policy, &path, project) {
            tracing::debug!(command = %path, project = ?project, "command allowed");
            Ok(())
        } else {
            tracing::warn!(command = %path, project = ?project, "command denied");
            Err(AccessDenied::CommandDenied {
                command: path.to_string(),
                project: project.map(str::to_string),
            })
        }
    }

    /// Like [`is_space_allowed`](Self::is_space_allowed), with a reason.
    ///
    /// # Errors
    ///
    /// [`AccessDenied::NoPolicy`] or [`AccessDenied::SpaceDenied`].
    pub fn ensure_space(&self, space: &str, alias: Option<&str>) -> Result<(), AccessDenied> {
        let policy = self.policy(alias)?;
        if space_allowed(&policy, space) {
            tracing::debug!(space, "space allowed");
            Ok(())
        } else {
            tracing::warn!(space, "space denied: not in allowed spaces");
            Err(AccessDenied::SpaceDenied {
                space: space.to_string(),
            })
        }
    }

    fn policy(&self, alias: Option<&str>) -> Result<OrgPolicy, AccessDenied> {
        self.store.effective_policy(alias).ok_or_else(|| {
            let org = alias.or(self.store.current_org());
            tracing::warn!(org = ?org, "no effective policy: denying");
            AccessDenied::no_policy(org)
        })
    }
}

/// Project check against one policy.
#[must_use]
pub fn project_allowed(policy: &OrgPolicy, key: &str) -> bool {
    policy
        .allowed_projects
        .iter()
        .any(|rule| rule.is_wildcard() || rule.project_key() == Some(key))
}

/// Command check against one policy (exemptions not applied).
///
/// With a project, a scoped rule's non-empty `commands` list replaces the
/// global list; an empty or absent list inherits it. Without a project, a
/// command is visible if the global list or any scoped list grants it.
#[must_use]
pub fn command_allowed(policy: &OrgPolicy, path: &CommandPath, project: Option<&str>) -> bool {
    match project {
        Some(key) => {
            let scoped = policy
                .rule_for(key)
                .and_then(ProjectRule::commands)
                .filter(|commands| !commands.is_empty());
            match scoped {
                Some(commands) => matches(path, commands),
                None => matches(path, &policy.allowed_commands),
            }
        }
        None => {
            matches(path, &policy.allowed_commands)
                || policy
                    .allowed_projects
                    .iter()
                    .filter_map(ProjectRule::commands)
                    .any(|commands| matches(path, commands))
        }
    }
}

/// Space check against one policy.
#[must_use]
pub fn space_allowed(policy: &OrgPolicy, space: &str) -> bool {
    policy
        .allowed_spaces
        .iter()
        .any(|allowed| allowed == ALL || allowed == space)
}
