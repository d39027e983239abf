use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use albumsync_core::ImportedAlbum;
use albumsync_providers::BoxFuture;
use chrono::Utc;

use super::{AlbumStore, CreateOutcome, NewAlbum, StoreError, StoreResult, display_order};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    by_external_id: HashMap<String, u64>,
    records: HashMap<u64, ImportedAlbum>,
}

/// Process-local store; contents are lost when the daemon exits.
#[derive(Debug, Default)]
pub struct MemoryAlbumStore {
    inner: Mutex<Inner>,
}

impl MemoryAlbumStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::poisoned())
    }

    fn find_sync(&self, external_id: &str) -> StoreResult<Option<ImportedAlbum>> {
        let inner = self.lock()?;
        Ok(inner
            .by_external_id
            .get(external_id)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    fn create_sync(&self, album: NewAlbum) -> StoreResult<CreateOutcome> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .by_external_id
            .get(&album.external_id)
            .and_then(|id| inner.records.get(id))
        {
            return Ok(CreateOutcome::Existing(existing.clone()));
        }

        inner.next_id += 1;
        let local_id = inner.next_id;
        let record = album.into_record(local_id, Utc::now());
        inner
            .by_external_id
            .insert(record.external_id.clone(), local_id);
        inner.records.insert(local_id, record.clone());
        Ok(CreateOutcome::Created(record))
    }

    fn attach_sync(&self, local_id: u64, cover_ref: &str) -> StoreResult<ImportedAlbum> {
        let mut inner = self.lock()?;
        let record = inner
            .records
            .get_mut(&local_id)
            .ok_or(StoreError::UnknownAlbum(local_id))?;
        record.cover_ref = Some(cover_ref.to_string());
        Ok(record.clone())
    }

    fn list_sync(&self) -> StoreResult<Vec<ImportedAlbum>> {
        let mut records: Vec<_> = self.lock()?.records.values().cloned().collect();
        records.sort_by(display_order);
        Ok(records)
    }
}

impl AlbumStore for MemoryAlbumStore {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ImportedAlbum>>> {
        Box::pin(async move { self.find_sync(external_id) })
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
        Box::pin(async move { Ok(self.lock()?.records.len() as u64) })
    }
}
