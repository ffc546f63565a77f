//! Hierarchical command paths.
//!
//! Commands are dot-separated permission scopes: granting `issue` grants
//! `issue.label.add`, but granting `issue.label.add` does not grant
//! `issue.label`.
//!
//! Older policy files name commands with flat identifiers
//! (`add-label-to-issue`, `me`). [`normalize`] translates them through a
//! static table at evaluation time; the stored policy is never rewritten.
//! Strings not in the table pass through unchanged, so new or already
//! hierarchical names need no table entry.

use jgate_policy::CommandPattern;
use std::fmt;

/// Flat legacy command names and their hierarchical equivalents.
///
/// No right-hand side appears on the left, which keeps [`normalize`]
/// idempotent.
pub const LEGACY_COMMANDS: &[(&str, &str)] = &[
    // Issues
    ("get-issue", "issue.get"),
    ("create-issue", "issue.create"),
    ("update-issue", "issue.update"),
    ("delete-issue", "issue.delete"),
    ("search-issues", "issue.search"),
    ("assign-issue", "issue.assign"),
    ("transition-issue", "issue.transition"),
    ("get-transitions", "issue.transition.list"),
    ("add-comment", "issue.comment.add"),
    ("get-comments", "issue.comment.list"),
    ("add-label-to-issue", "issue.label.add"),
    ("remove-label-from-issue", "issue.label.remove"),
    ("link-issues", "issue.link.create"),
    ("add-worklog", "issue.worklog.add"),
    ("get-worklogs", "issue.worklog.list"),
    ("get-watchers", "issue.watcher.list"),
    ("add-watcher", "issue.watcher.add"),
    ("add-attachment", "issue.attachment.add"),
    // Projects and boards
    ("list-projects", "project.list"),
    ("get-project", "project.get"),
    ("list-boards", "board.list"),
    ("list-sprints", "sprint.list"),
    // Users
    ("me", "user.me"),
    ("search-users", "user.search"),
    // Wiki
    ("get-page", "page.get"),
    ("create-page", "page.create"),
    ("update-page", "page.update"),
    ("search-pages", "page.search"),
    ("list-spaces", "space.list"),
];

/// Command roots that bypass policy entirely.
///
/// These must keep working with no policy at all so an operator can view
/// and fix configuration.
pub const EXEMPT_COMMANDS: &[&str] = &["about", "auth", "settings"];

/// A normalised, dot-separated command path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandPath(String);

impl CommandPath {
    /// Returns the path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first segment (`issue` for `issue.label.add`).
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Iterates the path and its ancestors, most specific first.
    ///
    /// ```text
    /// issue.label.add → "issue.label.add", "issue.label", "issue"
    /// ```
    pub fn prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        let path = self.0.as_str();
        std::iter::once(path).chain(path.rmatch_indices('.').map(move |(i, _)| &path[..i]))
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Translates a command name to its hierarchical path.
///
/// Total and pure: legacy names are mapped through [`LEGACY_COMMANDS`],
/// everything else is returned unchanged, surrounding whitespace included.
///
/// # Example
///
/// ```
/// use jgate_auth::normalize;
///
/// assert_eq!(normalize("add-label-to-issue").as_str(), "issue.label.add");
/// assert_eq!(normalize("issue.label.add").as_str(), "issue.label.add");
/// assert_eq!(normalize("brand.new.command").as_str(), "brand.new.command");
/// ```
#[must_use]
pub fn normalize(command: &str) -> CommandPath {
    let path = LEGACY_COMMANDS
        .iter()
        .find(|(legacy, _)| *legacy == command)
        .map_or(command, |&(_, path)| path);
    CommandPath(path.to_string())
}

/// Returns `true` if any granted pattern covers `path`.
///
/// `"all"` covers everything. Otherwise the path and each of its ancestors
/// are tested for membership in the (normalised) granted set; any hit
/// allows. The check is a set test, so pattern order never matters.
#[must_use]
pub fn matches(path: &CommandPath, allowed: &[CommandPattern]) -> bool {
    if allowed.iter().any(CommandPattern::is_all) {
        return true;
    }
    let granted: Vec<CommandPath> = allowed.iter().map(|p| normalize(p.as_str())).collect();
    path.prefixes()
        .any(|prefix| granted.iter().any(|g| g.as_str() == prefix))
}

/// Returns `true` if the command's root is in [`EXEMPT_COMMANDS`].
#[must_use]
pub fn is_exempt(path: &CommandPath) -> bool {
    EXEMPT_COMMANDS.contains(&path.root())
}
