//! Policy documents for jgate.
//!
//! This crate owns the per-organization access policy: its data model,
//! the YAML loader (including migration of the legacy flat schema), and
//! the process-wide cache that the decision components in `jgate-auth`
//! read from.
//!
//! # Crate Architecture
//!
//! ```text
//! jgate-policy  ◄── THIS CRATE
//! (PolicyDocument, PolicyLoader, PolicyStore)
//!     ↑
//! jgate-auth
//! (PermissionResolver, QueryFilterComposer, ParticipationValidator)
//!     ↑
//! jgate-cli
//! ```
//!
//! # Effective Policy
//!
//! ```text
//! organizations[alias]  ──(absent)──►  defaults  ──(absent)──►  None (deny-all)
//! ```
//!
//! `None` is never an error: callers treat it as "nothing is allowed",
//! so an unconfigured organization fails safe.
//!
//! # Example
//!
//! ```
//! use jgate_policy::{PolicyDocument, PolicyStore};
//!
//! let doc = PolicyDocument::from_yaml(
//!     r#"
//! defaults:
//!   allowed-jira-projects: ["BP"]
//! organizations:
//!   acme:
//!     allowed-jira-projects: ["all"]
//! "#,
//! )
//! .unwrap();
//!
//! let store = PolicyStore::from_document(doc);
//! let acme = store.effective_policy(Some("acme")).unwrap();
//! assert!(acme.allows_all_projects());
//!
//! let other = store.effective_policy(Some("unknown")).unwrap();
//! assert!(!other.allows_all_projects());
//! ```

pub mod error;
pub mod loader;
pub mod model;
pub mod source;
pub mod store;
mod validate;

pub use error::{PolicyError, PolicyValidationError};
pub use loader::{save_policy, PolicyLoader, ORG_ENV_VAR, POLICY_PATH_ENV_VAR};
pub use model::{
    CommandPattern, OrgPolicy, ParticipationSpec, PolicyDocument, ProjectFilters, ProjectRule,
    ALL,
};
pub use source::{PolicySource, StaticSource};
pub use store::PolicyStore;

/// Default global policy directory (`~/.jgate`).
#[must_use]
pub fn default_policy_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".jgate")
}

/// Default policy file path (`~/.jgate/policy.yaml`).
#[must_use]
pub fn default_policy_path() -> std::path::PathBuf {
    default_policy_dir().join(POLICY_FILE)
}

/// Policy file name inside the policy directory.
pub const POLICY_FILE: &str = "policy.yaml";
