//! Persistent album records.
//!
//! [`AlbumStore`] owns the `external_id -> local_id` mapping. Creation is a
//! single conditional insert inside the store, so two imports racing on the
//! same external id always end with one record.

mod error;
mod memory;
mod schema;
mod sqlite;

use std::collections::BTreeSet;

use albumsync_core::ImportedAlbum;
use chrono::{DateTime, Utc};

use albumsync_providers::BoxFuture;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryAlbumStore;
pub use sqlite::SqliteAlbumStore;

/// Fields of a record about to be created; the store assigns `local_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlbum {
    pub external_id: String,
    pub title: String,
    pub photo_count: u64,
    pub source_date: DateTime<Utc>,
    pub product_url: Option<String>,
    pub display_order: i64,
    pub categories: BTreeSet<String>,
}

impl NewAlbum {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            photo_count: 0,
            source_date: Utc::now(),
            product_url: None,
            display_order: 0,
            categories: BTreeSet::new(),
        }
    }

    fn into_record(self, local_id: u64, imported_at: DateTime<Utc>) -> ImportedAlbum {
        ImportedAlbum {
            local_id,
            external_id: self.external_id,
            title: self.title,
            cover_ref: None,
            photo_count: self.photo_count,
            source_date: self.source_date,
            product_url: self.product_url,
            display_order: self.display_order,
            categories: self.categories,
            imported_at,
        }
    }
}

/// Result of [`AlbumStore::create_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(ImportedAlbum),
    /// A record with the same external id was already present and is returned unchanged.
    Existing(ImportedAlbum),
}

impl CreateOutcome {
    pub fn record(&self) -> &ImportedAlbum {
        match self {
            Self::Created(r) | Self::Existing(r) => r,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Persistence for imported album records.
///
/// Implementations must make `create_if_absent` atomic per external id.
pub trait AlbumStore: Send + Sync {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ImportedAlbum>>>;

    /// Atomically creates the record unless one with the same external id exists.
    fn create_if_absent(&self, album: NewAlbum) -> BoxFuture<'_, StoreResult<CreateOutcome>>;

    /// Records the stored cover for an album and returns the updated record.
    fn attach_cover<'a>(
        &'a self,
        local_id: u64,
        cover_ref: &'a str,
    ) -> BoxFuture<'a, StoreResult<ImportedAlbum>>;

    /// All records, by `display_order` ascending then `source_date` newest first.
    fn list(&self) -> BoxFuture<'_, StoreResult<Vec<ImportedAlbum>>>;

    /// Number of records.
    fn count(&self) -> BoxFuture<'_, StoreResult<u64>>;
}

fn display_order(a: &ImportedAlbum, b: &ImportedAlbum) -> std::cmp::Ordering {
    a.display_order
        .cmp(&b.display_order)
        .then_with(|| b.source_date.cmp(&a.source_date))
        .then_with(|| a.local_id.cmp(&b.local_id))
}
