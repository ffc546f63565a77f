//! Policy file loader.
//!
//! # Resolution Order
//!
//! | Setting | 1st | 2nd | 3rd |
//! |---------|-----|-----|-----|
//! | Policy path | [`PolicyLoader::with_path`] | `JGATE_POLICY` | `~/.jgate/policy.yaml` |
//! | Current organization | [`PolicyLoader::with_org`] | `JGATE_ORG` | none (defaults) |
//!
//! A missing policy file is not an error: it loads as "no policy".

use crate::{default_policy_path, PolicyDocument, PolicyError, PolicySource, PolicyStore};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the policy file path.
pub const POLICY_PATH_ENV_VAR: &str = "JGATE_POLICY";

/// Environment variable naming the current organization alias.
pub const ORG_ENV_VAR: &str = "JGATE_ORG";

/// Policy loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use jgate_policy::PolicyLoader;
///
/// let store = PolicyLoader::new()
///     .with_path("/etc/jgate/policy.yaml")
///     .with_org("acme")
///     .into_store();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyLoader {
    /// Explicit policy file path.
    path: Option<PathBuf>,

    /// Explicit current organization alias.
    org: Option<String>,

    /// Skip environment variable lookup.
    skip_env: bool,
}

impl PolicyLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the policy file path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the current organization alias.
    #[must_use]
    pub fn with_org(mut self, alias: impl Into<String>) -> Self {
        self.org = Some(alias.into());
        self
    }

    /// Skips environment variable lookup.
    ///
    /// Useful for testing with deterministic paths.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Returns the policy file path this loader reads.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidEnvVar`] if `JGATE_POLICY` is set but empty.
    pub fn resolved_path(&self) -> Result<PathBuf, PolicyError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if !self.skip_env {
            if let Ok(val) = std::env::var(POLICY_PATH_ENV_VAR) {
                if val.trim().is_empty() {
                    return Err(PolicyError::invalid_env_var(
                        POLICY_PATH_ENV_VAR,
                        "expected a file path",
                    ));
                }
                return Ok(PathBuf::from(val));
            }
        }
        Ok(default_policy_path())
    }

    /// Returns the current organization alias, if any.
    ///
    /// An empty `JGATE_ORG` counts as unset.
    #[must_use]
    pub fn resolved_org(&self) -> Option<String> {
        if self.org.is_some() {
            return self.org.clone();
        }
        if self.skip_env {
            return None;
        }
        std::env::var(ORG_ENV_VAR)
            .ok()
            .filter(|alias| !alias.trim().is_empty())
    }

    /// Loads, migrates and validates the policy file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if the file exists but cannot be read,
    /// parsed or validated. A missing file yields `Ok(None)`.
    pub fn load(&self) -> Result<Option<PolicyDocument>, PolicyError> {
        let path = self.resolved_path()?;
        let Some(doc) = load_file(&path)? else {
            debug!(path = %path.display(), "No policy file");
            return Ok(None);
        };
        doc.validate()?;
        debug!(
            path = %path.display(),
            organizations = doc.organizations.len(),
            has_defaults = doc.defaults.is_some(),
            "Loaded policy"
        );
        Ok(Some(doc))
    }

    /// Builds a lazily-loading [`PolicyStore`] over this loader.
    ///
    /// The resolved organization alias becomes the store's current
    /// organization.
    #[must_use]
    pub fn into_store(self) -> PolicyStore {
        let org = self.resolved_org();
        let store = PolicyStore::new(self);
        match org {
            Some(alias) => store.with_current_org(alias),
            None => store,
        }
    }
}

impl PolicySource for PolicyLoader {
    fn load(&self) -> Result<Option<PolicyDocument>, PolicyError> {
        PolicyLoader::load(self)
    }
}

/// Reads a policy file, returning `None` if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<PolicyDocument>, PolicyError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| PolicyError::read_file(path, e))?;

    let doc = PolicyDocument::from_yaml(&content).map_err(|e| PolicyError::parse_yaml(path, e))?;

    Ok(Some(doc))
}

/// Writes a policy document to `path`.
///
/// Creates the parent directory if needed. The document is written in the
/// current schema; command strings are written exactly as held.
///
/// # Errors
///
/// Returns [`PolicyError`] if the file cannot be serialized or written.
pub fn save_policy(path: &Path, doc: &PolicyDocument) -> Result<(), PolicyError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| PolicyError::create_dir(parent, e))?;
        }
    }

    let yaml = doc.to_yaml()?;
    std::fs::write(path, yaml).map_err(|e| PolicyError::write_file(path, e))?;

    debug!(path = %path.display(), "Saved policy");
    Ok(())
}
