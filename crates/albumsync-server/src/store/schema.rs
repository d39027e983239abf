//! Album database schema and `user_version` migrations.

use rusqlite::Connection;

use super::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS albums (
    local_id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    cover_ref TEXT,
    photo_count INTEGER NOT NULL DEFAULT 0,
    source_date INTEGER NOT NULL,
    product_url TEXT,
    display_order INTEGER NOT NULL DEFAULT 0,
    categories TEXT NOT NULL DEFAULT '[]',
    imported_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_albums_order ON albums(display_order, source_date DESC);
"#;

pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StoreError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Creates or upgrades the schema; safe to run on every open.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StoreError> {
    let current = get_schema_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current,
            expected: SCHEMA_VERSION,
        });
    }

    if current < SCHEMA_VERSION {
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!(from = current, to = SCHEMA_VERSION, "migrated album database");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'albums'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_schema_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(StoreError::UnsupportedSchemaVersion { .. })
        ));
    }
}
