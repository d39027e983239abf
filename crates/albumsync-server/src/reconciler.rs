//! Turning a selected upstream album into a local record.
//!
//! 1. look the external id up; an existing record ends the import
//! 2. create the record through the store's conditional insert
//! 3. download the cover, best effort

use std::sync::Arc;

use albumsync_core::{AlbumSummary, ImportReport, ImportStatus, ImportedAlbum};
use albumsync_providers::CoverFetcher;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::ServerResult;
use crate::media::MediaLibrary;
use crate::store::{AlbumStore, CreateOutcome, NewAlbum};

/// Result of [`ImportReconciler::import`], carrying the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new record was created by this call.
    Imported(ImportedAlbum),
    /// A record for the external id was already there; it was not touched.
    AlreadyExists(ImportedAlbum),
}

impl ImportOutcome {
    pub fn status(&self) -> ImportStatus {
        match self {
            Self::Imported(_) => ImportStatus::Imported,
            Self::AlreadyExists(_) => ImportStatus::AlreadyExists,
        }
    }

    pub fn record(&self) -> &ImportedAlbum {
        match self {
            Self::Imported(r) | Self::AlreadyExists(r) => r,
        }
    }

    pub fn report(&self) -> ImportReport {
        ImportReport::from_record(self.status(), self.record())
    }
}

/// Creates local records for upstream albums, at most one per external id.
pub struct ImportReconciler {
    store: Arc<dyn AlbumStore>,
    covers: Option<Arc<dyn CoverFetcher>>,
    media: MediaLibrary,
}

impl ImportReconciler {
    /// Reconciler that never downloads covers.
    pub fn new(store: Arc<dyn AlbumStore>, media: MediaLibrary) -> Self {
        Self {
            store,
            covers: None,
            media,
        }
    }

    /// Downloads covers through `fetcher` after each new record.
    pub fn with_cover_fetcher(mut self, fetcher: Arc<dyn CoverFetcher>) -> Self {
        self.covers = Some(fetcher);
        self
    }

    /// The store records are created in.
    pub fn store(&self) -> &Arc<dyn AlbumStore> {
        &self.store
    }

    /// Imports `album` unless its external id is already stored.
    ///
    /// A failed cover download does not fail the import.
    #[tracing::instrument(skip(self, album), fields(external_id = %album.external_id))]
    pub async fn import(&self, album: &AlbumSummary) -> ServerResult<ImportOutcome> {
        if let Some(existing) = self.store.find_by_external_id(&album.external_id).await? {
            debug!(local_id = existing.local_id, "album already imported");
            return Ok(ImportOutcome::AlreadyExists(existing));
        }

        let mut new = NewAlbum::new(&album.external_id, album.display_title());
        new.photo_count = album.media_count.unwrap_or(0);
        new.source_date = album.created_at.unwrap_or_else(Utc::now);
        new.product_url = album.product_url.clone();

        let record = match self.store.create_if_absent(new).await? {
            CreateOutcome::Created(record) => record,
            CreateOutcome::Existing(record) => {
                debug!(local_id = record.local_id, "lost creation race, record exists");
                return Ok(ImportOutcome::AlreadyExists(record));
            }
        };
        info!(local_id = record.local_id, title = %record.title, "album imported");

        let record = self.attach_cover(record, album).await;
        Ok(ImportOutcome::Imported(record))
    }

    /// Returns the record with its cover attached, or unchanged on any failure.
    async fn attach_cover(&self, record: ImportedAlbum, album: &AlbumSummary) -> ImportedAlbum {
        let Some(fetcher) = &self.covers else {
            return record;
        };
        let Some(raw_url) = album.cover_url.as_deref() else {
            return record;
        };
        let Some(url) = album.cover_url_parsed() else {
            warn!(local_id = record.local_id, url = raw_url, "ignoring unusable cover URL");
            return record;
        };

        match self.download_cover(fetcher.as_ref(), record.local_id, url.as_str()).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(local_id = record.local_id, error = %e, "cover not attached");
                record
            }
        }
    }

    async fn download_cover(
        &self,
        fetcher: &dyn CoverFetcher,
        local_id: u64,
        url: &str,
    ) -> ServerResult<ImportedAlbum> {
        let image = fetcher.fetch(url).await?;
        let cover_ref = self.media.store_cover(local_id, &image).await?;
        match self.store.attach_cover(local_id, &cover_ref).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.media.remove_cover(&cover_ref).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryAlbumStore, SqliteAlbumStore, StoreError, StoreResult};
    use albumsync_providers::{
        BoxFuture, CoverImage, HttpCoverFetcher, ProviderError, ProviderResult,
    };
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CoverFetcher for CountingFetcher {
        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, ProviderResult<CoverImage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(ProviderError::unavailable("connection reset"))
                } else {
                    Ok(CoverImage {
                        bytes: vec![0xff, 0xd8, 0xff],
                        content_type: Some("image/jpeg".into()),
                    })
                }
            })
        }
    }

    fn summary(id: &str) -> AlbumSummary {
        AlbumSummary::new(id, "Porto")
            .with_media_count(42)
            .with_cover_url(format!("https://lh3.googleusercontent.com/{id}=w1024-h1024"))
            .with_created_at(Utc.with_ymd_and_hms(2022, 5, 3, 10, 0, 0).unwrap())
    }

    fn reconciler(
        dir: &tempfile::TempDir,
        fetcher: Arc<CountingFetcher>,
    ) -> (ImportReconciler, Arc<MemoryAlbumStore>) {
        let store = Arc::new(MemoryAlbumStore::new());
        let reconciler = ImportReconciler::new(store.clone(), MediaLibrary::new(dir.path()))
            .with_cover_fetcher(fetcher);
        (reconciler, store)
    }

    #[tokio::test]
    async fn import_creates_record_with_cover() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let (reconciler, _) = reconciler(&dir, fetcher.clone());

        let outcome = reconciler.import(&summary("ext-1")).await.unwrap();
        let ImportOutcome::Imported(record) = &outcome else {
            panic!("expected a new import");
        };
        assert_eq!(record.photo_count, 42);
        assert_eq!(record.display_order, 0);
        assert!(record.categories.is_empty());
        assert_eq!(record.cover_ref.as_deref(), Some("1-cover.jpg"));
        assert!(dir.path().join("1-cover.jpg").exists());
        assert!(outcome.report().cover_attached);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_import_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let (reconciler, store) = reconciler(&dir, fetcher.clone());

        let first = reconciler.import(&summary("ext-1")).await.unwrap();
        let second = reconciler.import(&summary("ext-1")).await.unwrap();

        assert_eq!(second.status(), ImportStatus::AlreadyExists);
        assert_eq!(second.record().local_id, first.record().local_id);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_fields_get_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _) = reconciler(&dir, Arc::new(CountingFetcher::default()));
        let before = Utc::now();

        let outcome = reconciler
            .import(&AlbumSummary::new("bare", ""))
            .await
            .unwrap();
        let record = outcome.record();
        assert_eq!(record.photo_count, 0);
        assert!(record.source_date >= before);
        assert!(!record.has_cover());
        assert_eq!(record.title, AlbumSummary::new("bare", "").display_title());
    }

    #[tokio::test]
    async fn failed_cover_still_imports() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            fail: true,
            ..Default::default()
        });
        let (reconciler, store) = reconciler(&dir, fetcher);

        let outcome = reconciler.import(&summary("ext-1")).await.unwrap();
        assert_eq!(outcome.status(), ImportStatus::Imported);
        assert!(!outcome.report().cover_attached);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreachable_cover_host_still_imports() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpCoverFetcher::new(Duration::from_secs(2)).unwrap();
        let reconciler = ImportReconciler::new(
            Arc::new(MemoryAlbumStore::new()),
            MediaLibrary::new(dir.path()),
        )
        .with_cover_fetcher(Arc::new(fetcher));

        let album = AlbumSummary::new("ext-1", "Offline")
            .with_cover_url(format!("http://127.0.0.1:{port}/cover.jpg"));
        let outcome = reconciler.import(&album).await.unwrap();
        assert_eq!(outcome.status(), ImportStatus::Imported);
        assert!(!outcome.report().cover_attached);
    }

    /// Memory store whose `attach_cover` always fails.
    struct NoCoverStore(MemoryAlbumStore);

    impl AlbumStore for NoCoverStore {
        fn find_by_external_id<'a>(
            &'a self,
            external_id: &'a str,
        ) -> BoxFuture<'a, StoreResult<Option<ImportedAlbum>>> {
            self.0.find_by_external_id(external_id)
        }

        fn create_if_absent(&self, album: NewAlbum) -> BoxFuture<'_, StoreResult<CreateOutcome>> {
            self.0.create_if_absent(album)
        }

        fn attach_cover<'a>(
            &'a self,
            local_id: u64,
            _cover_ref: &'a str,
        ) -> BoxFuture<'a, StoreResult<ImportedAlbum>> {
            Box::pin(async move { Err(StoreError::UnknownAlbum(local_id)) })
        }

        fn list(&self) -> BoxFuture<'_, StoreResult<Vec<ImportedAlbum>>> {
            self.0.list()
        }

        fn count(&self) -> BoxFuture<'_, StoreResult<u64>> {
            self.0.count()
        }
    }

    #[tokio::test]
    async fn cover_file_removed_when_attach_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher::default());
        let reconciler = ImportReconciler::new(
            Arc::new(NoCoverStore(MemoryAlbumStore::new())),
            MediaLibrary::new(dir.path().join("covers")),
        )
        .with_cover_fetcher(fetcher.clone());

        let outcome = reconciler.import(&summary("ext-1")).await.unwrap();
        assert_eq!(outcome.status(), ImportStatus::Imported);
        assert!(!outcome.report().cover_attached);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("covers")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn covers_disabled_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let reconciler = ImportReconciler::new(
            Arc::new(MemoryAlbumStore::new()),
            MediaLibrary::new(dir.path()),
        );
        let outcome = reconciler.import(&summary("ext-1")).await.unwrap();
        assert!(!outcome.report().cover_attached);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    async fn race(store: Arc<dyn AlbumStore>, dir: &tempfile::TempDir, n: usize) {
        let fetcher = Arc::new(CountingFetcher::default());
        let reconciler = Arc::new(
            ImportReconciler::new(store.clone(), MediaLibrary::new(dir.path()))
                .with_cover_fetcher(fetcher.clone()),
        );

        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let reconciler = Arc::clone(&reconciler);
                tokio::spawn(async move { reconciler.import(&summary("shared")).await.unwrap() })
            })
            .collect();

        let mut imported = 0;
        let mut existing = 0;
        let mut ids = std::collections::BTreeSet::new();
        for task in tasks {
            let outcome = task.await.unwrap();
            ids.insert(outcome.record().local_id);
            match outcome.status() {
                ImportStatus::Imported => imported += 1,
                ImportStatus::AlreadyExists => existing += 1,
            }
        }

        assert_eq!(imported, 1);
        assert_eq!(existing, n - 1);
        assert_eq!(ids.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_imports_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        race(Arc::new(MemoryAlbumStore::new()), &dir, 10).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_imports_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteAlbumStore::open(dir.path().join("albums.db")).await.unwrap();
        race(Arc::new(store), &dir, 10).await;
    }
}
