//! Access denied error type.
//!
//! The predicates in this crate return `bool`; the `ensure_*` variants wrap
//! the same decisions in [`AccessDenied`] for callers that prefer `?`.
//! Messages are deliberately short: user-facing remediation hints belong
//! to the caller.

use thiserror::Error;

/// Why an operation was refused.
///
/// # Example
///
/// ```
/// use jgate_auth::AccessDenied;
///
/// let err = AccessDenied::CommandDenied {
///     command: "issue.delete".to_string(),
///     project: Some("BP".to_string()),
/// };
///
/// assert_eq!(err.to_string(), "command 'issue.delete' is not allowed in project 'BP'");
/// assert_eq!(err.layer(), "command");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// No policy applies to the organization.
    #[error("no policy configured for organization '{org}'")]
    NoPolicy {
        /// Alias that was resolved, or `default`.
        org: String,
    },

    /// Project is outside `allowed-jira-projects`.
    #[error("project '{project}' is not allowed")]
    ProjectDenied {
        /// The project key.
        project: String,
    },

    /// Command is outside the applicable command list.
    #[error("command '{command}' is not allowed{}", in_project(.project.as_deref()))]
    CommandDenied {
        /// The normalised command path.
        command: String,
        /// The project the command targeted, if any.
        project: Option<String>,
    },

    /// Wiki space is outside `allowed-confluence-spaces`.
    #[error("space '{space}' is not allowed")]
    SpaceDenied {
        /// The space key.
        space: String,
    },

    /// Record fails the project's participation constraint.
    #[error("not a participant of issue '{issue}'")]
    NotParticipant {
        /// The issue key.
        issue: String,
    },
}

impl AccessDenied {
    /// Returns the check that refused access.
    #[must_use]
    pub fn layer(&self) -> &'static str {
        match self {
            Self::NoPolicy { .. } => "policy",
            Self::ProjectDenied { .. } => "project",
            Self::CommandDenied { .. } => "command",
            Self::SpaceDenied { .. } => "space",
            Self::NotParticipant { .. } => "participation",
        }
    }

    pub(crate) fn no_policy(org: Option<&str>) -> Self {
        Self::NoPolicy {
            org: org.unwrap_or("default").to_string(),
        }
    }
}

fn in_project(project: Option<&str>) -> String {
    project.map_or_else(String::new, |p| format!(" in project '{p}'"))
}
