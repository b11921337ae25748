use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::{CoreError, DomainRow, DomainRowRepository, IdentityProvider, IdentityProviderLookup};

/// Stored shape of a domain row: name and owning provider id.
#[derive(Clone, Debug)]
struct StoredRow {
    name: Option<String>,
    provider_id: String,
}

/// Simple in-memory store for tests. Holds providers and domain rows behind
/// mutexes and mirrors the foreign-key checks of the SQLite schema.
pub struct InMemoryStore {
    providers: Mutex<BTreeMap<String, IdentityProvider>>,
    rows: Mutex<BTreeMap<String, StoredRow>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(BTreeMap::new()),
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a provider so rows can reference it.
    pub fn put_provider(&self, provider: IdentityProvider) -> Result<(), CoreError> {
        let mut map = self
            .providers
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.insert(provider.internal_id.clone(), provider);
        Ok(())
    }

    // Zero-padded to the full id width so ids sort in creation order.
    fn reserve_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{n:036}")
    }

    fn provider_exists(&self, provider_id: &str) -> Result<bool, CoreError> {
        let map = self
            .providers
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.contains_key(provider_id))
    }

    fn checked_owner(&self, row: &DomainRow) -> Result<String, CoreError> {
        let provider_id = row.identity_provider_id().ok_or(CoreError::Detached)?;
        if !self.provider_exists(provider_id)? {
            return Err(CoreError::Constraint(format!(
                "unknown identity provider {provider_id}"
            )));
        }
        Ok(provider_id.to_string())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProviderLookup for InMemoryStore {
    fn find_provider(&self, internal_id: &str) -> Result<Option<IdentityProvider>, CoreError> {
        let map = self
            .providers
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(internal_id).cloned())
    }
}

impl DomainRowRepository for InMemoryStore {
    fn insert(&self, row: &mut DomainRow) -> Result<(), CoreError> {
        let provider_id = self.checked_owner(row)?;
        let mut map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let id = match row.id() {
            Some(id) => {
                // Same rule as the SQLite CHECK: length in characters, not bytes.
                if id.chars().count() > crate::ID_MAX_LEN {
                    return Err(CoreError::Constraint(format!(
                        "id longer than {} characters",
                        crate::ID_MAX_LEN
                    )));
                }
                if map.contains_key(id) {
                    return Err(CoreError::AlreadyExists);
                }
                id.to_string()
            }
            // Skip counter values a caller already used as explicit ids.
            None => loop {
                let id = self.reserve_id();
                if !map.contains_key(&id) {
                    break id;
                }
            },
        };
        map.insert(
            id.clone(),
            StoredRow {
                name: row.name().map(str::to_string),
                provider_id,
            },
        );
        debug!(id = %id, "inserted domain row");
        row.set_id(id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DomainRow>, CoreError> {
        let map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map
            .get(id)
            .map(|r| DomainRow::from_storage(id.to_string(), r.name.clone(), r.provider_id.clone())))
    }

    fn update(&self, row: &DomainRow) -> Result<(), CoreError> {
        let id = row.id().ok_or(CoreError::NotFound)?;
        let provider_id = self.checked_owner(row)?;
        let mut map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        match map.get_mut(id) {
            Some(stored) => {
                stored.name = row.name().map(str::to_string);
                stored.provider_id = provider_id;
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let mut map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.remove(id).map(|_| ()).ok_or(CoreError::NotFound)
    }

    fn list_by_provider(&self, provider_id: &str) -> Result<Vec<DomainRow>, CoreError> {
        let map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map
            .iter()
            .filter(|(_, r)| r.provider_id == provider_id)
            .map(|(id, r)| DomainRow::from_storage(id.clone(), r.name.clone(), r.provider_id.clone()))
            .collect())
    }

    fn delete_by_provider(&self, provider_id: &str) -> Result<usize, CoreError> {
        let mut map = self
            .rows
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let before = map.len();
        map.retain(|_, r| r.provider_id != provider_id);
        Ok(before - map.len())
    }
}
