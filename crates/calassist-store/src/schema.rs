//! Idempotent schema migration.

use rusqlite::Connection;
use tracing::debug;

use crate::error::StoreResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id TEXT PRIMARY KEY,
    external_id TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    name TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    identity_id TEXT PRIMARY KEY
        REFERENCES identities(id) ON DELETE CASCADE,
    refresh_secret TEXT NOT NULL,
    access_secret TEXT,
    scope TEXT,
    expires_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Enables foreign keys and creates missing tables.
pub(crate) fn migrate(conn: &Connection) -> StoreResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)?;
    debug!("credential store schema ready");
    Ok(())
}
