//! sqlite-adapter — SQLite implementation of the identity provider domain ports.
//!
//! Purpose
//! - Provide the relational persisted form of domain rows
//!   (`IDENTITY_PROVIDER_DOMAIN`) and the provider lookup used to resolve a
//!   row's owner on demand.
//! - Implements `DomainRowRepository` and `IdentityProviderLookup` from the
//!   `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Row ids are UUID v4 strings; the 36 character limit is a `CHECK`
//!   constraint in the schema.
//! - Foreign keys are enabled per connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{CoreError, DomainRow, DomainRowRepository, IdentityProvider, IdentityProviderLookup};
use rusqlite::{ffi, params, Connection, OptionalExtension};
use tracing::{debug, warn};

/// SQLite-backed store for providers and their domains.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/identity_providers.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH")
            .unwrap_or_else(|_| "./data/identity_providers.db".to_string());
        if let Some(dir) = Path::new(&path).parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| CoreError::Repository(format!("cannot create {}: {e}", dir.display())))?;
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }

    /// Insert or replace a provider row. Provider management proper lives
    /// elsewhere; this keeps the foreign key target populated.
    pub fn put_provider(&self, provider: &IdentityProvider) -> Result<(), CoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO IDENTITY_PROVIDER(INTERNAL_ID, PROVIDER_ALIAS, PROVIDER_DISPLAY_NAME, ENABLED) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(INTERNAL_ID) DO UPDATE SET PROVIDER_ALIAS = excluded.PROVIDER_ALIAS, PROVIDER_DISPLAY_NAME = excluded.PROVIDER_DISPLAY_NAME, ENABLED = excluded.ENABLED",
            params![provider.internal_id, provider.alias, provider.display_name, provider.enabled as i64],
        )
        .map_err(map_write_err)?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS IDENTITY_PROVIDER (
            INTERNAL_ID VARCHAR(36) PRIMARY KEY CHECK (length(INTERNAL_ID) <= 36),
            PROVIDER_ALIAS TEXT NOT NULL,
            PROVIDER_DISPLAY_NAME TEXT,
            ENABLED INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS IDENTITY_PROVIDER_DOMAIN (
            ID VARCHAR(36) PRIMARY KEY CHECK (length(ID) <= 36),
            NAME TEXT,
            IDENTITY_PROVIDER_ID VARCHAR(36) NOT NULL REFERENCES IDENTITY_PROVIDER(INTERNAL_ID)
        );
        CREATE INDEX IF NOT EXISTS IDX_IDP_DOMAIN_PROVIDER ON IDENTITY_PROVIDER_DOMAIN(IDENTITY_PROVIDER_ID);
        "#,
    )
    .map_err(map_sqerr)?;
    debug!("identity provider domain schema ready");
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    warn!(error = %e, "sqlite error");
    CoreError::Repository(format!("sqlite error: {e}"))
}

/// Like `map_sqerr`, but keeps constraint failures distinguishable.
fn map_write_err(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, msg) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY {
                return CoreError::AlreadyExists;
            }
            let detail = msg.clone().unwrap_or_else(|| err.to_string());
            warn!(error = %detail, "constraint violation");
            return CoreError::Constraint(detail);
        }
    }
    map_sqerr(e)
}

fn row_to_domain(row: &rusqlite::Row) -> rusqlite::Result<DomainRow> {
    let id: String = row.get(0)?;
    let name: Option<String> = row.get(1)?;
    let provider_id: String = row.get(2)?;
    Ok(DomainRow::from_storage(id, name, provider_id))
}

impl IdentityProviderLookup for SqliteStore {
    fn find_provider(&self, internal_id: &str) -> Result<Option<IdentityProvider>, CoreError> {
        let conn = self.lock()?;
        debug!(provider_id = internal_id, "loading identity provider");
        conn.query_row(
            "SELECT INTERNAL_ID, PROVIDER_ALIAS, PROVIDER_DISPLAY_NAME, ENABLED FROM IDENTITY_PROVIDER WHERE INTERNAL_ID = ?1",
            params![internal_id],
            |row| {
                let enabled: i64 = row.get(3)?;
                Ok(IdentityProvider {
                    internal_id: row.get(0)?,
                    alias: row.get(1)?,
                    display_name: row.get(2)?,
                    enabled: enabled != 0,
                })
            },
        )
        .optional()
        .map_err(map_sqerr)
    }
}

impl DomainRowRepository for SqliteStore {
    fn insert(&self, row: &mut DomainRow) -> Result<(), CoreError> {
        let provider_id = row.identity_provider_id().ok_or(CoreError::Detached)?.to_string();
        let id = match row.id() {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO IDENTITY_PROVIDER_DOMAIN(ID, NAME, IDENTITY_PROVIDER_ID) VALUES (?1, ?2, ?3)",
            params![id, row.name(), provider_id],
        )
        .map_err(map_write_err)?;
        debug!(id = %id, provider_id = %provider_id, "inserted domain row");
        row.set_id(id);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<DomainRow>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT ID, NAME, IDENTITY_PROVIDER_ID FROM IDENTITY_PROVIDER_DOMAIN WHERE ID = ?1",
            params![id],
            row_to_domain,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn update(&self, row: &DomainRow) -> Result<(), CoreError> {
        let id = row.id().ok_or(CoreError::NotFound)?;
        let provider_id = row.identity_provider_id().ok_or(CoreError::Detached)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE IDENTITY_PROVIDER_DOMAIN SET NAME = ?1, IDENTITY_PROVIDER_ID = ?2 WHERE ID = ?3",
                params![row.name(), provider_id, id],
            )
            .map_err(map_write_err)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            debug!(id = %id, "updated domain row");
            Ok(())
        }
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM IDENTITY_PROVIDER_DOMAIN WHERE ID = ?1", params![id])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(CoreError::NotFound)
        } else {
            debug!(id = %id, "deleted domain row");
            Ok(())
        }
    }

    fn list_by_provider(&self, provider_id: &str) -> Result<Vec<DomainRow>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT ID, NAME, IDENTITY_PROVIDER_ID FROM IDENTITY_PROVIDER_DOMAIN WHERE IDENTITY_PROVIDER_ID = ?1 ORDER BY ID")
            .map_err(map_sqerr)?;
        let rows = stmt
            .query_map(params![provider_id], row_to_domain)
            .map_err(map_sqerr)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sqerr)
    }

    fn delete_by_provider(&self, provider_id: &str) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM IDENTITY_PROVIDER_DOMAIN WHERE IDENTITY_PROVIDER_ID = ?1",
                params![provider_id],
            )
            .map_err(map_sqerr)?;
        debug!(provider_id = %provider_id, removed, "deleted provider domains");
        Ok(removed)
    }
}
