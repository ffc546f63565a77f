//! Process-wide policy cache.
//!
//! [`PolicyStore`] is an explicit, injectable object rather than a hidden
//! global: every decision component takes an `Arc<PolicyStore>`, so tests
//! (and multi-tenant callers) get isolation by constructing independent
//! stores.
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──get()──► Loaded(doc | none)
//!    ▲                    │
//!    └───invalidate()─────┘   reload() / apply(doc) replace the cached value
//! ```

use crate::{OrgPolicy, PolicyDocument, PolicyError, PolicySource, StaticSource};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
enum Cached {
    Unloaded,
    Loaded(Option<Arc<PolicyDocument>>),
}

/// Lazily-loaded, invalidatable policy cache.
///
/// # Thread Safety
///
/// The cache sits behind an `RwLock`. A poisoned lock is logged and reads
/// as "no policy", which denies every non-exempt check.
///
/// # Example
///
/// ```
/// use jgate_policy::{OrgPolicy, PolicyDocument, PolicyStore, ProjectRule};
///
/// let store = PolicyStore::from_document(PolicyDocument::with_defaults(
///     OrgPolicy::permissive().with_projects([ProjectRule::key("BP")]),
/// ));
///
/// let policy = store.effective_policy(None).unwrap();
/// assert!(policy.rule_for("BP").is_some());
///
/// store.apply(PolicyDocument::default());
/// assert!(store.effective_policy(None).is_none());
/// ```
pub struct PolicyStore {
    source: Box<dyn PolicySource>,
    current_org: Option<String>,
    cache: RwLock<Cached>,
}

impl PolicyStore {
    /// Creates a store that loads from `source` on first use.
    #[must_use]
    pub fn new(source: impl PolicySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current_org: None,
            cache: RwLock::new(Cached::Unloaded),
        }
    }

    /// Creates a store over a fixed in-memory document.
    #[must_use]
    pub fn from_document(doc: PolicyDocument) -> Self {
        Self::new(StaticSource::new(doc))
    }

    /// Creates a store with no policy (deny-all).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(StaticSource::empty())
    }

    /// Sets the organization used when a call passes no alias.
    #[must_use]
    pub fn with_current_org(mut self, alias: impl Into<String>) -> Self {
        self.current_org = Some(alias.into());
        self
    }

    /// Returns the ambient organization alias, if any.
    #[must_use]
    pub fn current_org(&self) -> Option<&str> {
        self.current_org.as_deref()
    }

    /// Returns the cached document, loading it on first use.
    ///
    /// A source error is logged and yields `None` without being cached, so
    /// the next call retries.
    #[must_use]
    pub fn get(&self) -> Option<Arc<PolicyDocument>> {
        match self.cache.read() {
            Ok(cache) => {
                if let Cached::Loaded(doc) = &*cache {
                    return doc.clone();
                }
            }
            Err(e) => {
                error!("policy_store: cache lock poisoned on get: {e}");
                return None;
            }
        }

        let loaded = match self.source.load() {
            Ok(doc) => doc.map(Arc::new),
            Err(e) => {
                error!(error = %e, "policy_store: failed to load policy, denying all");
                return None;
            }
        };

        match self.cache.write() {
            Ok(mut cache) => {
                // Another caller may have finished loading first.
                if let Cached::Loaded(doc) = &*cache {
                    return doc.clone();
                }
                debug!(present = loaded.is_some(), "policy_store: policy loaded");
                *cache = Cached::Loaded(loaded.clone());
            }
            Err(e) => {
                error!("policy_store: cache lock poisoned on load: {e}");
            }
        }

        loaded
    }

    /// Re-reads the source now and replaces the cached document.
    ///
    /// # Errors
    ///
    /// Returns the source's [`PolicyError`]; the cache is left untouched.
    pub fn reload(&self) -> Result<(), PolicyError> {
        let loaded = self.source.load()?;
        info!(present = loaded.is_some(), "policy_store: policy reloaded");
        self.set(Cached::Loaded(loaded.map(Arc::new)));
        Ok(())
    }

    /// Replaces the cached document (the "apply settings" flow).
    ///
    /// Persisting the document is the caller's job
    /// ([`save_policy`](crate::save_policy)).
    pub fn apply(&self, doc: PolicyDocument) {
        info!("policy_store: policy applied");
        self.set(Cached::Loaded(Some(Arc::new(doc))));
    }

    /// Clears the cache; the next [`get`](Self::get) reloads from the source.
    pub fn invalidate(&self) {
        debug!("policy_store: cache invalidated");
        self.set(Cached::Unloaded);
    }

    /// Selects the policy for `alias`, falling back to the current
    /// organization, then `defaults`.
    ///
    /// `None` means deny-all; it is never an error.
    #[must_use]
    pub fn effective_policy(&self, alias: Option<&str>) -> Option<OrgPolicy> {
        let doc = self.get()?;
        let alias = alias.or(self.current_org.as_deref());
        doc.effective(alias).cloned()
    }

    fn set(&self, value: Cached) {
        match self.cache.write() {
            Ok(mut cache) => *cache = value,
            Err(e) => error!("policy_store: cache lock poisoned on set: {e}"),
        }
    }
}

impl fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStore")
            .field("current_org", &self.current_org)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
