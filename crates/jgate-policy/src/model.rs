//! Policy document model.
//!
//! # Shape
//!
//! ```yaml
//! defaults:
//!   allowed-jira-projects: ["all"]
//!   allowed-commands: ["all"]
//!   allowed-confluence-spaces: ["all"]
//! organizations:
//!   acme:
//!     allowed-jira-projects:
//!       - BP
//!       - key: PM
//!         commands: ["issue.get", "issue.comment"]
//!         filters:
//!           jql: "issuetype = Bug"
//!           participated: { was-assignee: true, was-reporter: true }
//!     allowed-commands: ["issue", "me"]
//! ```
//!
//! Each `allowed-*` list defaults to `["all"]` when absent or `null`.
//!
//! # Legacy Schema
//!
//! Older files carry flat top-level `projects` / `commands` / `spaces`
//! lists. These are folded into `defaults` when the document is parsed.
//! Command strings are kept exactly as written; translation of legacy
//! names happens at evaluation time only, so a load → save round trip
//! never rewrites what the user authored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Wildcard sentinel for project, command and space lists.
pub const ALL: &str = "all";

/// An entry in `allowed-commands`.
///
/// Either the literal `"all"` or a dot-separated path such as `"issue"` or
/// `"issue.label.add"`. Legacy flat names (`"add-label-to-issue"`) are
/// accepted and stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandPattern(String);

impl CommandPattern {
    /// Creates a pattern from its textual form.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The `"all"` pattern.
    #[must_use]
    pub fn all() -> Self {
        Self(ALL.to_string())
    }

    /// Returns `true` for the `"all"` pattern.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.0 == ALL
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CommandPattern {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Participation constraint on a scoped project.
///
/// The enabled flags are OR-combined. With no flag set it imposes no
/// constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParticipationSpec {
    /// Current user is the assignee.
    #[serde(skip_serializing_if = "is_false")]
    pub was_assignee: bool,
    /// Current user is the reporter.
    #[serde(skip_serializing_if = "is_false")]
    pub was_reporter: bool,
    /// Current user authored at least one comment.
    #[serde(skip_serializing_if = "is_false")]
    pub was_commenter: bool,
    /// Current user watches the issue.
    #[serde(skip_serializing_if = "is_false")]
    pub is_watcher: bool,
}

impl ParticipationSpec {
    /// Returns `true` if no flag is set.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        !(self.was_assignee || self.was_reporter || self.was_commenter || self.is_watcher)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(b: &bool) -> bool {
    !*b
}

/// Extra restrictions attached to a scoped project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFilters {
    /// Post-fetch participation constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participated: Option<ParticipationSpec>,
    /// Opaque query fragment ANDed into composed searches for this project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jql: Option<String>,
}

impl ProjectFilters {
    /// Returns the trimmed sub-query, or `None` if absent or blank.
    #[must_use]
    pub fn sub_jql(&self) -> Option<&str> {
        self.jql
            .as_deref()
            .map(str::trim)
            .filter(|jql| !jql.is_empty())
    }
}

/// An entry in `allowed-jira-projects`.
///
/// ```text
/// "all"                         → Wildcard
/// "BP"                          → Key("BP")
/// { key: PM, commands, filters} → Scoped
/// ```
///
/// A `Scoped` rule without `commands` inherits the policy's global
/// `allowed-commands`; with `commands` it replaces them for that project.
///
/// Only the bare string `"all"` is the wildcard. `{ key: all, ... }` stays
/// `Scoped` and is rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProjectRule", into = "RawProjectRule")]
pub enum ProjectRule {
    /// Every project.
    Wildcard,
    /// A single project by key.
    Key(String),
    /// A single project with its own command list and/or filters.
    Scoped {
        key: String,
        commands: Option<Vec<CommandPattern>>,
        filters: Option<ProjectFilters>,
    },
}

impl ProjectRule {
    /// Creates a bare key rule (`"all"` becomes [`ProjectRule::Wildcard`]).
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        let key = key.into();
        if key == ALL {
            Self::Wildcard
        } else {
            Self::Key(key)
        }
    }

    /// Creates a scoped rule with no command list and no filters.
    #[must_use]
    pub fn scoped(key: impl Into<String>) -> Self {
        Self::Scoped {
            key: key.into(),
            commands: None,
            filters: None,
        }
    }

    /// Sets the command list of a scoped rule. No-op on other variants.
    #[must_use]
    pub fn with_commands<I, C>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandPattern>,
    {
        if let Self::Scoped { commands, .. } = &mut self {
            *commands = Some(patterns.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Sets the filters of a scoped rule. No-op on other variants.
    #[must_use]
    pub fn with_filters(mut self, value: ProjectFilters) -> Self {
        if let Self::Scoped { filters, .. } = &mut self {
            *filters = Some(value);
        }
        self
    }

    /// Returns the project key, or `None` for the wildcard.
    #[must_use]
    pub fn project_key(&self) -> Option<&str> {
        match self {
            Self::Wildcard => None,
            Self::Key(key) | Self::Scoped { key, .. } => Some(key),
        }
    }

    /// Returns `true` for the wildcard rule.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Returns the project-specific command list, if this rule has one.
    #[must_use]
    pub fn commands(&self) -> Option<&[CommandPattern]> {
        match self {
            Self::Scoped {
                commands: Some(commands),
                ..
            } => Some(commands),
            _ => None,
        }
    }

    /// Returns the project filters, if this rule has them.
    #[must_use]
    pub fn filters(&self) -> Option<&ProjectFilters> {
        match self {
            Self::Scoped {
                filters: Some(filters),
                ..
            } => Some(filters),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawProjectRule {
    Bare(String),
    Scoped {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commands: Option<Vec<CommandPattern>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filters: Option<ProjectFilters>,
    },
}

impl From<RawProjectRule> for ProjectRule {
    fn from(raw: RawProjectRule) -> Self {
        match raw {
            RawProjectRule::Bare(key) => Self::key(key),
            RawProjectRule::Scoped {
                key,
                commands,
                filters,
            } => Self::Scoped {
                key,
                commands,
                filters,
            },
        }
    }
}

impl From<ProjectRule> for RawProjectRule {
    fn from(rule: ProjectRule) -> Self {
        match rule {
            ProjectRule::Wildcard => Self::Bare(ALL.to_string()),
            ProjectRule::Key(key) => Self::Bare(key),
            ProjectRule::Scoped {
                key,
                commands,
                filters,
            } => Self::Scoped {
                key,
                commands,
                filters,
            },
        }
    }
}

/// Access policy of one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOrgPolicy", into = "RawOrgPolicy")]
pub struct OrgPolicy {
    /// `allowed-jira-projects`, in file order.
    pub allowed_projects: Vec<ProjectRule>,
    /// `allowed-commands`, in file order.
    pub allowed_commands: Vec<CommandPattern>,
    /// `allowed-confluence-spaces`, in file order.
    pub allowed_spaces: Vec<String>,
}

impl OrgPolicy {
    /// A policy allowing every project, command and space.
    ///
    /// This is what an `OrgPolicy` with every list omitted parses to.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allowed_projects: vec![ProjectRule::Wildcard],
            allowed_commands: vec![CommandPattern::all()],
            allowed_spaces: vec![ALL.to_string()],
        }
    }

    /// Replaces the project list.
    #[must_use]
    pub fn with_projects(mut self, projects: impl IntoIterator<Item = ProjectRule>) -> Self {
        self.allowed_projects = projects.into_iter().collect();
        self
    }

    /// Replaces the global command list.
    #[must_use]
    pub fn with_commands<I, C>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CommandPattern>,
    {
        self.allowed_commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the space list.
    #[must_use]
    pub fn with_spaces<I, S>(mut self, spaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_spaces = spaces.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if the project list contains the wildcard.
    #[must_use]
    pub fn allows_all_projects(&self) -> bool {
        self.allowed_projects.iter().any(ProjectRule::is_wildcard)
    }

    /// Finds the rule governing `key`.
    ///
    /// An exact `Key`/`Scoped` match wins over the wildcard, regardless of
    /// list order. Matching is exact and case-sensitive.
    #[must_use]
    pub fn rule_for(&self, key: &str) -> Option<&ProjectRule> {
        self.allowed_projects
            .iter()
            .find(|rule| rule.project_key() == Some(key))
            .or_else(|| self.allowed_projects.iter().find(|rule| rule.is_wildcard()))
    }
}

#[derive(Default, Serialize, Deserialize)]
struct RawOrgPolicy {
    #[serde(rename = "allowed-jira-projects", default)]
    allowed_projects: Option<Vec<ProjectRule>>,
    #[serde(rename = "allowed-commands", default)]
    allowed_commands: Option<Vec<CommandPattern>>,
    #[serde(rename = "allowed-confluence-spaces", default)]
    allowed_spaces: Option<Vec<String>>,
}

impl RawOrgPolicy {
    fn is_empty(&self) -> bool {
        self.allowed_projects.is_none()
            && self.allowed_commands.is_none()
            && self.allowed_spaces.is_none()
    }
}

impl From<RawOrgPolicy> for OrgPolicy {
    fn from(raw: RawOrgPolicy) -> Self {
        let all = Self::permissive();
        Self {
            allowed_projects: raw.allowed_projects.unwrap_or(all.allowed_projects),
            allowed_commands: raw.allowed_commands.unwrap_or(all.allowed_commands),
            allowed_spaces: raw.allowed_spaces.unwrap_or(all.allowed_spaces),
        }
    }
}

impl From<OrgPolicy> for RawOrgPolicy {
    fn from(policy: OrgPolicy) -> Self {
        Self {
            allowed_projects: Some(policy.allowed_projects),
            allowed_commands: Some(policy.allowed_commands),
            allowed_spaces: Some(policy.allowed_spaces),
        }
    }
}

/// The whole policy file: optional defaults plus per-organization entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPolicyDocument", into = "RawPolicyDocument")]
pub struct PolicyDocument {
    /// Policy for organizations without their own entry.
    pub defaults: Option<OrgPolicy>,
    /// Per-organization policies keyed by alias.
    pub organizations: BTreeMap<String, OrgPolicy>,
}

impl PolicyDocument {
    /// Creates a document with only a `defaults` entry.
    #[must_use]
    pub fn with_defaults(policy: OrgPolicy) -> Self {
        Self {
            defaults: Some(policy),
            organizations: BTreeMap::new(),
        }
    }

    /// Adds or replaces an organization entry.
    #[must_use]
    pub fn with_organization(mut self, alias: impl Into<String>, policy: OrgPolicy) -> Self {
        self.organizations.insert(alias.into(), policy);
        self
    }

    /// Selects the policy for `alias`.
    ///
    /// Returns the organization entry if present, else `defaults`, else
    /// `None` (deny-all).
    #[must_use]
    pub fn effective(&self, alias: Option<&str>) -> Option<&OrgPolicy> {
        alias
            .and_then(|alias| self.organizations.get(alias))
            .or(self.defaults.as_ref())
    }

    /// Parses a document, migrating the legacy flat schema if present.
    ///
    /// # Errors
    ///
    /// Returns the YAML error if the text is not a valid document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    /// Serializes to YAML in the current (non-legacy) shape.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[derive(Default, Serialize, Deserialize)]
struct RawPolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defaults: Option<OrgPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organizations: Option<BTreeMap<String, OrgPolicy>>,

    // Legacy flat schema, read-only.
    #[serde(default, skip_serializing)]
    projects: Option<Vec<ProjectRule>>,
    #[serde(default, skip_serializing)]
    commands: Option<Vec<CommandPattern>>,
    #[serde(default, skip_serializing)]
    spaces: Option<Vec<String>>,
}

impl From<RawPolicyDocument> for PolicyDocument {
    fn from(raw: RawPolicyDocument) -> Self {
        let legacy = RawOrgPolicy {
            allowed_projects: raw.projects,
            allowed_commands: raw.commands,
            allowed_spaces: raw.spaces,
        };

        let defaults = match (raw.defaults, legacy.is_empty()) {
            (Some(defaults), true) => Some(defaults),
            (Some(defaults), false) => {
                tracing::warn!("policy has both 'defaults' and legacy top-level lists; ignoring legacy lists");
                Some(defaults)
            }
            (None, false) => {
                tracing::info!("migrating legacy flat policy schema into 'defaults'");
                Some(OrgPolicy::from(legacy))
            }
            (None, true) => None,
        };

        Self {
            defaults,
            organizations: raw.organizations.unwrap_or_default(),
        }
    }
}

impl From<PolicyDocument> for RawPolicyDocument {
    fn from(doc: PolicyDocument) -> Self {
        Self {
            defaults: doc.defaults,
            organizations: (!doc.organizations.is_empty()).then_some(doc.organizations),
            ..Self::default()
        }
    }
}
