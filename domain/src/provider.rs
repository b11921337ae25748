//! The owning identity provider and the lazy reference rows hold to it.

use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::{CoreError, IdentityProviderLookup};

/// An identity provider (e.g. a corporate SSO system) users can log in through.
///
/// Only the fields the domain relationship needs are modelled here; the rest of
/// the provider configuration belongs to the provider management layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityProvider {
    pub internal_id: String,
    pub alias: String,
    pub display_name: Option<String>,
    pub enabled: bool,
}

impl IdentityProvider {
    pub fn new<I: Into<String>, A: Into<String>>(internal_id: I, alias: A) -> Self {
        Self {
            internal_id: internal_id.into(),
            alias: alias.into(),
            display_name: None,
            enabled: true,
        }
    }
}

/// Many-to-one reference from a domain row to its owning provider.
///
/// Always carries the provider's internal id (the foreign key). The provider
/// itself is either handed in already loaded, or fetched on first
/// [`resolve`](Self::resolve) and cached; later resolves return the same `Arc`.
#[derive(Clone, Debug)]
pub struct ProviderRef {
    provider_id: String,
    loaded: OnceLock<Arc<IdentityProvider>>,
}

impl ProviderRef {
    /// A reference that has not been fetched yet.
    pub fn unresolved<S: Into<String>>(provider_id: S) -> Self {
        Self {
            provider_id: provider_id.into(),
            loaded: OnceLock::new(),
        }
    }

    /// A reference to a provider the caller already holds.
    pub fn resolved(provider: Arc<IdentityProvider>) -> Self {
        let loaded = OnceLock::new();
        let provider_id = provider.internal_id.clone();
        let _ = loaded.set(provider);
        Self {
            provider_id,
            loaded,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// The provider if it is already loaded; never touches the store.
    pub fn get(&self) -> Option<&Arc<IdentityProvider>> {
        self.loaded.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Return the provider, fetching it through `lookup` on first access.
    ///
    /// Store failures are propagated unchanged. A provider id the store does
    /// not know yields [`CoreError::NotFound`]; nothing is cached in either case.
    pub fn resolve<L>(&self, lookup: &L) -> Result<Arc<IdentityProvider>, CoreError>
    where
        L: IdentityProviderLookup + ?Sized,
    {
        if let Some(p) = self.loaded.get() {
            return Ok(Arc::clone(p));
        }
        trace!(provider_id = %self.provider_id, "fetching identity provider");
        let provider = lookup
            .find_provider(&self.provider_id)?
            .ok_or(CoreError::NotFound)?;
        Ok(Arc::clone(self.loaded.get_or_init(|| Arc::new(provider))))
    }
}

impl From<Arc<IdentityProvider>> for ProviderRef {
    fn from(provider: Arc<IdentityProvider>) -> Self {
        Self::resolved(provider)
    }
}

impl From<IdentityProvider> for ProviderRef {
    fn from(provider: IdentityProvider) -> Self {
        Self::resolved(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        known: Option<IdentityProvider>,
    }

    impl IdentityProviderLookup for CountingLookup {
        fn find_provider(&self, internal_id: &str) -> Result<Option<IdentityProvider>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .known
                .clone()
                .filter(|p| p.internal_id == internal_id))
        }
    }

    struct UnavailableLookup;

    impl IdentityProviderLookup for UnavailableLookup {
        fn find_provider(&self, _: &str) -> Result<Option<IdentityProvider>, CoreError> {
            Err(CoreError::Repository("store unavailable".into()))
        }
    }

    #[test]
    fn resolved_ref_hands_back_same_arc() {
        let p = Arc::new(IdentityProvider::new("idp-1", "corp-sso"));
        let r = ProviderRef::resolved(Arc::clone(&p));
        assert_eq!(r.provider_id(), "idp-1");
        assert!(Arc::ptr_eq(r.get().unwrap(), &p));
        let via_resolve = r.resolve(&UnavailableLookup).unwrap();
        assert!(Arc::ptr_eq(&via_resolve, &p));
    }

    #[test]
    fn unresolved_ref_fetches_once_then_caches() {
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
            known: Some(IdentityProvider::new("idp-1", "corp-sso")),
        };
        let r = ProviderRef::unresolved("idp-1");
        assert!(!r.is_resolved());

        let first = r.resolve(&lookup).unwrap();
        let second = r.resolve(&lookup).unwrap();
        assert_eq!(first.alias, "corp-sso");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dangling_ref_is_not_found_and_not_cached() {
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
            known: None,
        };
        let r = ProviderRef::unresolved("gone");
        assert!(matches!(r.resolve(&lookup), Err(CoreError::NotFound)));
        assert!(matches!(r.resolve(&lookup), Err(CoreError::NotFound)));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
        assert!(!r.is_resolved());
    }

    #[test]
    fn store_failure_propagates_unchanged() {
        let r = ProviderRef::unresolved("idp-1");
        let err = r.resolve(&UnavailableLookup).unwrap_err();
        match err {
            CoreError::Repository(msg) => assert_eq!(msg, "store unavailable"),
            other => panic!("expected Repository, got {other:?}"),
        }
    }
}
