//! Domain library for identity provider domains.
//!
//! An identity provider can be associated with a set of internet domains
//! (e.g. `example.com`) used to route users to it. This crate holds the two
//! forms of that concept and the storage ports around them:
//!
//! - [`DomainRecord`]: the transport representation exchanged across API
//!   boundaries.
//! - [`DomainRow`]: the persisted row, owned by exactly one
//!   [`IdentityProvider`] through a lazily resolved [`ProviderRef`].
//!
//! Keep adapters and IO concerns out of this crate; the SQLite implementation
//! lives in `sqlite-adapter`.

use thiserror::Error;

pub mod adapters;
pub mod entity;
pub mod provider;
pub mod representation;

pub use entity::DomainRow;
pub use provider::{IdentityProvider, ProviderRef};
pub use representation::DomainRecord;

/// Fixed maximum length of a persisted row id (UUID rendered as a string).
pub const ID_MAX_LEN: usize = 36;

/// Storage port used to resolve a [`ProviderRef`] on demand.
///
/// Implementations fetch a single provider by its internal id. `Ok(None)`
/// means the store answered but no such provider exists.
pub trait IdentityProviderLookup: Send + Sync {
    fn find_provider(&self, internal_id: &str) -> Result<Option<IdentityProvider>, CoreError>;
}

/// Repository port for persisting and loading domain rows.
pub trait DomainRowRepository: Send + Sync {
    /// Persist a new row. If the row has no id yet, one is generated and
    /// written back into `row`. Detached rows are rejected.
    fn insert(&self, row: &mut DomainRow) -> Result<(), CoreError>;
    /// Load a row by id. The owning provider is left unresolved.
    fn get(&self, id: &str) -> Result<Option<DomainRow>, CoreError>;
    /// Overwrite name and owner of an existing row.
    fn update(&self, row: &DomainRow) -> Result<(), CoreError>;
    fn delete(&self, id: &str) -> Result<(), CoreError>;
    /// List rows owned by a provider, ordered by id.
    fn list_by_provider(&self, provider_id: &str) -> Result<Vec<DomainRow>, CoreError>;
    /// Remove every row owned by a provider; returns how many were removed.
    fn delete_by_provider(&self, provider_id: &str) -> Result<usize, CoreError>;
}

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("resource already exists")]
    AlreadyExists,
    /// The row has no owning identity provider.
    #[error("domain row is not attached to an identity provider")]
    Detached,
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("repository error: {0}")]
    Repository(String),
}
