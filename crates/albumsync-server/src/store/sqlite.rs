use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use albumsync_core::ImportedAlbum;
use albumsync_providers::BoxFuture;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{AlbumStore, CreateOutcome, NewAlbum, StoreError, StoreResult, schema};

const SELECT_COLUMNS: &str = "local_id, external_id, title, cover_ref, photo_count, source_date, \
     product_url, display_order, categories, imported_at";

/// SQLite-backed store; `external_id` carries a UNIQUE constraint.
pub struct SqliteAlbumStore {
    /// rusqlite connections are not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteAlbumStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAlbumStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteAlbumStore {
    /// Opens or creates the database, creating parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = open_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(&open_path).map_err(|source| StoreError::Open {
                path: open_path.clone(),
                source,
            })?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            schema::migrate(&conn)?;
            Ok::<_, StoreError>(conn)
        })
        .await??;

        tracing::info!(path = %path.display(), "opened album database");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Private database dropped with the store; used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::poisoned())
    }

    fn create_sync(&self, album: NewAlbum) -> StoreResult<CreateOutcome> {
        let categories = serde_json::to_string(&album.categories)
            .map_err(|e| StoreError::Query(format!("failed to encode categories: {e}")))?;
        let conn = self.lock()?;

        let inserted = conn
            .execute(
                "INSERT INTO albums (external_id, title, photo_count, source_date, product_url, \
                 display_order, categories, imported_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(external_id) DO NOTHING",
                params![
                    &album.external_id,
                    &album.title,
                    i64::try_from(album.photo_count).unwrap_or(i64::MAX),
                    album.source_date.timestamp(),
                    &album.product_url,
                    album.display_order,
                    categories,
                    Utc::now().timestamp(),
                ],
            )
            .map_err(StoreError::query)?;

        let record = find_row(&conn, &album.external_id)?.ok_or_else(|| {
            StoreError::Query(format!("album {} vanished after insert", album.external_id))
        })?;

        Ok(if inserted == 1 {
            CreateOutcome::Created(record)
        } else {
            CreateOutcome::Existing(record)
        })
    }

    fn attach_sync(&self, local_id: u64, cover_ref: &str) -> StoreResult<ImportedAlbum> {
        let conn = self.lock()?;
        let id = to_sql_id(local_id)?;
        let updated = conn
            .execute(
                "UPDATE albums SET cover_ref = ?1 WHERE local_id = ?2",
                params![cover_ref, id],
            )
            .map_err(StoreError::query)?;
        if updated == 0 {
            return Err(StoreError::UnknownAlbum(local_id));
        }

        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM albums WHERE local_id = ?1"),
            [id],
            AlbumRow::from_row,
        )
        .map_err(StoreError::query)?
        .into_album()
    }

    fn list_sync(&self) -> StoreResult<Vec<ImportedAlbum>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM albums \
                 ORDER BY display_order ASC, source_date DESC, local_id ASC"
            ))
            .map_err(StoreError::query)?;

        let rows = stmt
            .query_map([], AlbumRow::from_row)
            .map_err(StoreError::query)?;

        let mut albums = Vec::new();
        for row in rows {
            albums.push(row.map_err(StoreError::query)?.into_album()?);
        }
        Ok(albums)
    }

    fn count_sync(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))
            .map_err(StoreError::query)?;
        Ok(count.max(0) as u64)
    }
}

impl AlbumStore for SqliteAlbumStore {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ImportedAlbum>>> {
        Box::pin(async move { find_row(&*self.lock()?, external_id) })
    }

    fn create_if_absent(&self, album: NewAlbum) -> BoxFuture<'_, StoreResult<CreateOutcome>> {
        Box::pin(async move { self.create_sync(album) })
    }

    fn attach_cover<'a>(
        &'a self,
        local_id: u64,
        cover_ref: &'a str,
    ) -> BoxFuture<'a, StoreResult<ImportedAlbum>> {
        Box::pin(async move { self.attach_sync(local_id, cover_ref) })
    }

    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<ImportedAlbum>>> {
        Box::pin(async move { self.list_sync() })
    }

    fn count(&self) -> BoxFuture<'_, StoreResult<u64>> {
        Box::pin(async move { self.count_sync() })
    }
}

fn find_row(conn: &Connection, external_id: &str) -> StoreResult<Option<ImportedAlbum>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM albums WHERE external_id = ?1"),
        [external_id],
        AlbumRow::from_row,
    )
    .optional()
    .map_err(StoreError::query)?
    .map(AlbumRow::into_album)
    .transpose()
}

fn to_sql_id(local_id: u64) -> StoreResult<i64> {
    i64::try_from(local_id).map_err(|_| StoreError::UnknownAlbum(local_id))
}

/// Raw column values before validation.
struct AlbumRow {
    local_id: i64,
    external_id: String,
    title: String,
    cover_ref: Option<String>,
    photo_count: i64,
    source_date: i64,
    product_url: Option<String>,
    display_order: i64,
    categories: String,
    imported_at: i64,
}

impl AlbumRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            local_id: row.get(0)?,
            external_id: row.get(1)?,
            title: row.get(2)?,
            cover_ref: row.get(3)?,
            photo_count: row.get(4)?,
            source_date: row.get(5)?,
            product_url: row.get(6)?,
            display_order: row.get(7)?,
            categories: row.get(8)?,
            imported_at: row.get(9)?,
        })
    }

    fn into_album(self) -> StoreResult<ImportedAlbum> {
        let local_id = self.local_id.max(0) as u64;
        let corrupt = |message: String| StoreError::Corrupt { local_id, message };

        let categories: BTreeSet<String> = serde_json::from_str(&self.categories)
            .map_err(|e| corrupt(format!("categories: {e}")))?;
        let source_date = timestamp(self.source_date)
            .ok_or_else(|| corrupt(format!("source_date {}", self.source_date)))?;
        let imported_at = timestamp(self.imported_at)
            .ok_or_else(|| corrupt(format!("imported_at {}", self.imported_at)))?;

        Ok(ImportedAlbum {
            local_id,
            external_id: self.external_id,
            title: self.title,
            cover_ref: self.cover_ref,
            photo_count: self.photo_count.max(0) as u64,
            source_date,
            product_url: self.product_url,
            display_order: self.display_order,
            categories,
            imported_at,
        })
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
