//! Persisted form of an identity provider domain (`IDENTITY_PROVIDER_DOMAIN`).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::provider::{IdentityProvider, ProviderRef};
use crate::{CoreError, IdentityProviderLookup};

/// A stored domain row owned by one identity provider.
///
/// The id is assigned by the repository on insert and is not expected to
/// change afterwards; its length limit ([`crate::ID_MAX_LEN`]) is enforced by
/// the storage schema, not here.
///
/// Equality and hashing both derive from the id. Rows without an id are only
/// equal to themselves.
#[derive(Clone, Debug, Default)]
pub struct DomainRow {
    id: Option<String>,
    name: Option<String>,
    identity_provider: Option<ProviderRef>,
}

impl DomainRow {
    /// A new, not yet persisted row owned by `provider`.
    pub fn new<S, P>(name: S, provider: P) -> Self
    where
        S: Into<String>,
        P: Into<ProviderRef>,
    {
        Self {
            id: None,
            name: Some(name.into()),
            identity_provider: Some(provider.into()),
        }
    }

    /// Rebuild a row as loaded from storage, with the owner left unresolved.
    pub fn from_storage(id: String, name: Option<String>, provider_id: String) -> Self {
        Self {
            id: Some(id),
            name,
            identity_provider: Some(ProviderRef::unresolved(provider_id)),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id<S: Into<String>>(&mut self, id: S) {
        self.id = Some(id.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = Some(name.into());
    }

    pub fn clear_name(&mut self) {
        self.name = None;
    }

    /// The owner reference; `None` while the row is detached.
    pub fn identity_provider(&self) -> Option<&ProviderRef> {
        self.identity_provider.as_ref()
    }

    /// Internal id of the owner without touching the store.
    pub fn identity_provider_id(&self) -> Option<&str> {
        self.identity_provider.as_ref().map(ProviderRef::provider_id)
    }

    pub fn set_identity_provider<P: Into<ProviderRef>>(&mut self, provider: P) {
        self.identity_provider = Some(provider.into());
    }

    pub fn detach(&mut self) {
        self.identity_provider = None;
    }

    /// Load the owning provider, fetching it through `lookup` if this row was
    /// read from storage and the owner has not been accessed yet.
    pub fn resolve_identity_provider<L>(&self, lookup: &L) -> Result<Arc<IdentityProvider>, CoreError>
    where
        L: IdentityProviderLookup + ?Sized,
    {
        self.identity_provider
            .as_ref()
            .ok_or(CoreError::Detached)?
            .resolve(lookup)
    }
}

impl PartialEq for DomainRow {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b)
    }
}

impl Eq for DomainRow {}

impl Hash for DomainRow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
