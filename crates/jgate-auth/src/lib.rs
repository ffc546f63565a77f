//! Access decisions for jgate.
//!
//! Every component here reads the effective policy from a shared
//! [`PolicyStore`](jgate_policy::PolicyStore) and answers one question:
//!
//! | Component | Question |
//! |-----------|----------|
//! | [`command_path`] | Does a granted command scope cover this command? |
//! | [`PermissionResolver`] | May this project / command / space be touched? |
//! | [`QueryFilterComposer`] | How must this search be rewritten to stay in scope? |
//! | [`ParticipationValidator`] | Did the current user take part in this fetched issue? |
//!
//! # Request Flow
//!
//! ```text
//! caller ──► PermissionResolver::is_command_allowed
//!              │ allowed
//!              ├── bulk search ──► QueryFilterComposer::rewrite ──► tracker
//!              └── single issue ──► (fetch) ──► ParticipationValidator::is_allowed
//! ```
//!
//! # Failure Semantics
//!
//! No effective policy means deny-all: every non-exempt predicate returns
//! `false` and composed queries fail closed. Nothing in this crate panics
//! or errors on missing configuration.

pub mod command_path;
pub mod error;
pub mod participation;
pub mod permission;
pub mod query;

pub use command_path::{is_exempt, matches, normalize, CommandPath, EXEMPT_COMMANDS};
pub use error::AccessDenied;
pub use participation::{IssueRecord, ParticipationValidator, UserRef};
pub use permission::PermissionResolver;
pub use query::{has_balanced_groups, split_order_clause, QueryFilterComposer, DENY_ALL_CLAUSE};

// Re-export the policy model for convenience
pub use jgate_policy::{OrgPolicy, PolicyDocument, PolicyStore, ProjectRule};
