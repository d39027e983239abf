use std::path::PathBuf;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open album database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("failed to prepare album database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("album database migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    #[error("album database query failed: {0}")]
    Query(String),

    #[error("failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    #[error("album database schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },

    /// A stored row could not be turned back into an album.
    #[error("corrupt album row {local_id}: {message}")]
    Corrupt { local_id: u64, message: String },

    #[error("no album with local id {0}")]
    UnknownAlbum(u64),
}

impl StoreError {
    pub fn query(source: rusqlite::Error) -> Self {
        Self::Query(source.to_string())
    }

    pub(crate) fn poisoned() -> Self {
        Self::Query("store lock poisoned".to_string())
    }
}
