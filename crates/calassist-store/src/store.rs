//! SQLite-backed credential store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{Credential, Identity, IdentityUpdate, NewCredential, NewIdentity};
use crate::schema;

/// Clock used to stamp `created_at`/`updated_at`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Identity and credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// identities  (id PK, external_id UNIQUE, email, name, created_at, updated_at)
/// credentials (identity_id PK -> identities(id) ON DELETE CASCADE,
///              refresh_secret, access_secret, scope, expires_at,
///              created_at, updated_at)
/// ```
///
/// Timestamps are unix seconds. Every operation is a single statement under
/// one connection lock; the unique constraints arbitrate concurrent writers.
pub struct Store {
    conn: Mutex<Connection>,
    clock: Clock,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened credential store");
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(Utc::now),
        })
    }

    /// Replaces the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::database("connection lock poisoned"))
    }

    fn now(&self) -> i64 {
        (self.clock)().timestamp()
    }

    pub fn find_identity_by_external_id(&self, external_id: &str) -> StoreResult<Option<Identity>> {
        let conn = self.conn()?;
        let identity = conn
            .query_row(
                "SELECT id, external_id, email, name, created_at, updated_at
                 FROM identities WHERE external_id = ?1",
                params![external_id],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    pub fn find_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        let conn = self.conn()?;
        let identity = conn
            .query_row(
                "SELECT id, external_id, email, name, created_at, updated_at
                 FROM identities WHERE id = ?1",
                params![id],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }

    /// Creates an identity with a fresh internal id.
    ///
    /// Fails with [`StoreError::ConstraintViolation`] when the external id is
    /// already linked.
    pub fn create_identity(&self, new: NewIdentity) -> StoreResult<Identity> {
        if new.external_id.is_empty() {
            return Err(StoreError::invalid_input("external_id must not be empty"));
        }
        if new.email.is_empty() {
            return Err(StoreError::invalid_input("email must not be empty"));
        }

        let id = Uuid::new_v4().to_string();
        let now = self.now();

        self.conn()?.execute(
            "INSERT INTO identities (id, external_id, email, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, new.external_id, new.email, new.name, now],
        )?;

        debug!(identity_id = %id, "created identity");
        Ok(Identity {
            id,
            external_id: new.external_id,
            email: new.email,
            name: new.name,
            created_at: from_unix(now),
            updated_at: from_unix(now),
        })
    }

    /// Applies a partial update.
    ///
    /// Returns true if a stored value changed. `updated_at` moves only then.
    pub fn update_identity(&self, id: &str, update: IdentityUpdate) -> StoreResult<bool> {
        if update.is_empty() {
            return Ok(false);
        }
        if update.email.as_deref() == Some("") {
            return Err(StoreError::invalid_input("email must not be empty"));
        }

        let set_name = update.name.is_some();
        let name = update.name.flatten();
        let changed = self.conn()?.execute(
            "UPDATE identities
             SET email = COALESCE(?2, email),
                 name = CASE WHEN ?5 THEN ?3 ELSE name END,
                 updated_at = ?4
             WHERE id = ?1
               AND (email IS NOT COALESCE(?2, email) OR (?5 AND name IS NOT ?3))",
            params![id, update.email, name, self.now(), set_name],
        )?;

        if changed > 0 {
            debug!(identity_id = %id, "updated identity");
        }
        Ok(changed > 0)
    }

    pub fn find_active_credential(&self, identity_id: &str) -> StoreResult<Option<Credential>> {
        let conn = self.conn()?;
        let credential = conn
            .query_row(
                "SELECT identity_id, refresh_secret, access_secret, scope, expires_at,
                        created_at, updated_at
                 FROM credentials WHERE identity_id = ?1",
                params![identity_id],
                credential_from_row,
            )
            .optional()?;
        Ok(credential)
    }

    /// Stores `new` as the identity's only credential, replacing any prior one.
    pub fn upsert_credential(&self, new: NewCredential) -> StoreResult<Credential> {
        if new.refresh_secret.is_empty() {
            return Err(StoreError::invalid_input("refresh secret must not be empty"));
        }

        let now = self.now();
        let conn = self.conn()?;
        let credential = conn.query_row(
            "INSERT INTO credentials (
                 identity_id, refresh_secret, access_secret, scope, expires_at,
                 created_at, updated_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(identity_id) DO UPDATE SET
                 refresh_secret = excluded.refresh_secret,
                 access_secret = excluded.access_secret,
                 scope = excluded.scope,
                 expires_at = excluded.expires_at,
                 updated_at = excluded.updated_at
             RETURNING identity_id, refresh_secret, access_secret, scope, expires_at,
                       created_at, updated_at",
            params![
                new.identity_id,
                new.refresh_secret,
                new.access_secret,
                new.scope,
                new.expires_at.map(|t| t.timestamp()),
                now,
            ],
            credential_from_row,
        )?;

        debug!(identity_id = %credential.identity_id, "stored credential");
        Ok(credential)
    }

    /// Revokes the identity's credential. Returns true if one existed.
    pub fn delete_credential(&self, identity_id: &str) -> StoreResult<bool> {
        let removed = self.conn()?.execute(
            "DELETE FROM credentials WHERE identity_id = ?1",
            params![identity_id],
        )?;
        Ok(removed > 0)
    }

    pub fn count_identities(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        external_id: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        created_at: from_unix(row.get(4)?),
        updated_at: from_unix(row.get(5)?),
    })
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    let expires_at: Option<i64> = row.get(4)?;
    Ok(Credential {
        identity_id: row.get(0)?,
        refresh_secret: row.get(1)?,
        access_secret: row.get(2)?,
        scope: row.get(3)?,
        expires_at: expires_at.map(from_unix),
        created_at: from_unix(row.get(5)?),
        updated_at: from_unix(row.get(6)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    /// Store whose clock is driven by the returned counter.
    fn store_with_manual_clock(start: i64) -> (Store, Arc<AtomicI64>) {
        let now = Arc::new(AtomicI64::new(start));
        let clock_now = Arc::clone(&now);
        let store = store().with_clock(Arc::new(move || from_unix(clock_now.load(Ordering::SeqCst))));
        (store, now)
    }

    #[test]
    fn create_and_find_identity() {
        let store = store();
        let created = store
            .create_identity(NewIdentity::new("g1", "a@b.com").with_name("Ada"))
            .unwrap();

        assert_eq!(created.id.len(), 36);
        assert_eq!(
            store.find_identity_by_external_id("g1").unwrap(),
            Some(created.clone())
        );
        assert_eq!(store.find_identity(&created.id).unwrap(), Some(created));
        assert_eq!(store.find_identity_by_external_id("g2").unwrap(), None);
    }

    #[test]
    fn duplicate_external_id_is_constraint_violation() {
        let store = store();
        store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();

        let err = store
            .create_identity(NewIdentity::new("g1", "other@b.com"))
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(store.count_identities().unwrap(), 1);
    }

    #[test]
    fn identities_get_distinct_internal_ids() {
        let store = store();
        let a = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();
        let b = store.create_identity(NewIdentity::new("g2", "b@b.com")).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn create_rejects_empty_fields() {
        let store = store();
        assert!(matches!(
            store.create_identity(NewIdentity::new("", "a@b.com")),
            Err(StoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            store.create_identity(NewIdentity::new("g1", "")),
            Err(StoreError::InvalidInput { .. })
        ));
    }

    #[test]
    fn update_touches_timestamp_only_on_change() {
        let (store, now) = store_with_manual_clock(1_000);
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();

        now.store(2_000, Ordering::SeqCst);
        let same = IdentityUpdate {
            email: Some("a@b.com".to_string()),
            name: None,
        };
        assert!(!store.update_identity(&identity.id, same).unwrap());
        let unchanged = store.find_identity(&identity.id).unwrap().unwrap();
        assert_eq!(unchanged.updated_at.timestamp(), 1_000);

        now.store(3_000, Ordering::SeqCst);
        let rename = IdentityUpdate {
            email: Some("new@b.com".to_string()),
            name: Some(Some("Ada".to_string())),
        };
        assert!(store.update_identity(&identity.id, rename).unwrap());
        let updated = store.find_identity(&identity.id).unwrap().unwrap();
        assert_eq!(updated.email, "new@b.com");
        assert_eq!(updated.name.as_deref(), Some("Ada"));
        assert_eq!(updated.created_at.timestamp(), 1_000);
        assert_eq!(updated.updated_at.timestamp(), 3_000);
        assert_eq!(updated.external_id, "g1");
    }

    #[test]
    fn update_without_fields_is_noop() {
        let store = store();
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();
        assert!(!store.update_identity(&identity.id, IdentityUpdate::default()).unwrap());
    }

    #[test]
    fn update_keeps_name_when_not_supplied() {
        let store = store();
        let identity = store
            .create_identity(NewIdentity::new("g1", "a@b.com").with_name("Ada"))
            .unwrap();
        let update = IdentityUpdate {
            email: Some("c@b.com".to_string()),
            name: None,
        };
        store.update_identity(&identity.id, update).unwrap();
        let stored = store.find_identity(&identity.id).unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn update_clears_name_when_set_to_none() {
        let (store, now) = store_with_manual_clock(1_000);
        let identity = store
            .create_identity(NewIdentity::new("g1", "a@b.com").with_name("Ada"))
            .unwrap();

        now.store(2_000, Ordering::SeqCst);
        let clear = IdentityUpdate {
            email: Some("a@b.com".to_string()),
            name: Some(None),
        };
        assert!(store.update_identity(&identity.id, clear.clone()).unwrap());
        let stored = store.find_identity(&identity.id).unwrap().unwrap();
        assert_eq!(stored.name, None);
        assert_eq!(stored.updated_at.timestamp(), 2_000);

        now.store(3_000, Ordering::SeqCst);
        assert!(!store.update_identity(&identity.id, clear).unwrap());
        let again = store.find_identity(&identity.id).unwrap().unwrap();
        assert_eq!(again.updated_at.timestamp(), 2_000);
    }

    #[test]
    fn second_upsert_replaces_first() {
        let (store, now) = store_with_manual_clock(1_000);
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();

        store
            .upsert_credential(
                NewCredential::new(&identity.id, "rt-1").with_scope(Some("calendar".to_string())),
            )
            .unwrap();

        now.store(5_000, Ordering::SeqCst);
        let expiry = from_unix(9_000);
        let second = store
            .upsert_credential(
                NewCredential::new(&identity.id, "rt-2")
                    .with_access_secret(Some("at-2".to_string()))
                    .with_expires_at(Some(expiry)),
            )
            .unwrap();

        let active = store.find_active_credential(&identity.id).unwrap().unwrap();
        assert_eq!(active, second);
        assert_eq!(active.refresh_secret, "rt-2");
        assert_eq!(active.access_secret.as_deref(), Some("at-2"));
        assert_eq!(active.scope, None);
        assert_eq!(active.expires_at, Some(expiry));
        assert_eq!(active.created_at.timestamp(), 1_000);
        assert_eq!(active.updated_at.timestamp(), 5_000);

        let rows: i64 = store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM credentials", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn upsert_rejects_empty_refresh_secret() {
        let store = store();
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();
        let err = store
            .upsert_credential(NewCredential::new(&identity.id, ""))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
        assert!(store.find_active_credential(&identity.id).unwrap().is_none());
    }

    #[test]
    fn upsert_for_unknown_identity_is_constraint_violation() {
        let store = store();
        let err = store
            .upsert_credential(NewCredential::new("no-such-identity", "rt-1"))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn delete_credential_revokes() {
        let store = store();
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();
        store
            .upsert_credential(NewCredential::new(&identity.id, "rt-1"))
            .unwrap();

        assert!(store.delete_credential(&identity.id).unwrap());
        assert!(!store.delete_credential(&identity.id).unwrap());
        assert!(store.find_active_credential(&identity.id).unwrap().is_none());
    }

    #[test]
    fn deleting_identity_cascades_to_credential() {
        let store = store();
        let identity = store.create_identity(NewIdentity::new("g1", "a@b.com")).unwrap();
        store
            .upsert_credential(NewCredential::new(&identity.id, "rt-1"))
            .unwrap();

        store
            .conn()
            .unwrap()
            .execute("DELETE FROM identities WHERE id = ?1", params![identity.id])
            .unwrap();
        assert!(store.find_active_credential(&identity.id).unwrap().is_none());
    }

    #[test]
    fn open_creates_parent_directory_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("calendar-assistant.db");

        let id = {
            let store = Store::open(&path).unwrap();
            store
                .create_identity(NewIdentity::new("g1", "a@b.com"))
                .unwrap()
                .id
        };

        let reopened = Store::open(&path).unwrap();
        let identity = reopened.find_identity_by_external_id("g1").unwrap().unwrap();
        assert_eq!(identity.id, id);
    }
}
