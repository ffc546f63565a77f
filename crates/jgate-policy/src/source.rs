//! Where a [`PolicyStore`](crate::PolicyStore) gets its document from.
//!
//! ```text
//! PolicySource trait
//!     ├── PolicyLoader   ← YAML file on disk (+ env overrides)
//!     └── StaticSource   ← in-memory document (tests, embedding)
//! ```

use crate::{PolicyDocument, PolicyError};

/// Produces the policy document backing a store.
///
/// `Ok(None)` means "no policy configured": every non-exempt check is
/// denied, but it is not an error.
pub trait PolicySource: Send + Sync {
    /// Loads the current document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if a document exists but cannot be used.
    fn load(&self) -> Result<Option<PolicyDocument>, PolicyError>;
}

/// A fixed, in-memory policy source.
///
/// # Example
///
/// ```
/// use jgate_policy::{OrgPolicy, PolicyDocument, PolicySource, StaticSource};
///
/// let source = StaticSource::new(PolicyDocument::with_defaults(OrgPolicy::permissive()));
/// assert!(source.load().unwrap().is_some());
///
/// assert!(StaticSource::empty().load().unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    document: Option<PolicyDocument>,
}

impl StaticSource {
    /// Creates a source that always yields `document`.
    #[must_use]
    pub fn new(document: PolicyDocument) -> Self {
        Self {
            document: Some(document),
        }
    }

    /// Creates a source with no document (deny-all).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl PolicySource for StaticSource {
    fn load(&self) -> Result<Option<PolicyDocument>, PolicyError> {
        Ok(self.document.clone())
    }
}
