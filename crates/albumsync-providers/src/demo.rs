//! Offline album source backed by a fixed catalog.
//!
//! The continuation token is the decimal offset of the next album. Output
//! depends only on `(token, page_size)`, so repeated calls always agree.
//!
//! Albums carry no cover URL unless [`DemoSource::with_cover_base`] points
//! them at an image host.

use albumsync_core::{AlbumPage, AlbumSummary, ContinuationToken, SourceMode};
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{ProviderError, ProviderResult};
use crate::source::{AlbumSource, BoxFuture, clamp_page_size};

/// Catalog size when `[demo] catalog_size` is not set.
pub const DEFAULT_CATALOG_SIZE: usize = 48;

const TITLES: &[&str] = &[
    "Summer at the Lake",
    "City Lights",
    "Grandma's 90th",
    "Mountain Trail",
    "Autumn Colors",
    "Street Food Tour",
    "First Snow",
    "Garden Diary",
    "Road Trip",
    "Coastline",
    "Concert Night",
    "Harbor Mornings",
];

/// Deterministic catalog of `demo-album-NN` albums.
#[derive(Debug, Clone)]
pub struct DemoSource {
    catalog: Vec<AlbumSummary>,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_SIZE)
    }
}

impl DemoSource {
    /// Catalog of `size` albums, ids `demo-album-01` onwards.
    pub fn new(size: usize) -> Self {
        Self {
            catalog: (0..size).map(demo_album).collect(),
        }
    }

    /// Gives every album the cover `<base>/<external_id>.jpg`.
    #[must_use]
    pub fn with_cover_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        for album in &mut self.catalog {
            album.cover_url = Some(format!("{base}/{}.jpg", album.external_id));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Synchronous page computation behind [`AlbumSource::list_albums`].
    pub fn page(&self, token: Option<&ContinuationToken>, page_size: u32) -> AlbumPage {
        let page_size = clamp_page_size(page_size) as usize;
        let offset = decode_offset(token).min(self.catalog.len());
        let end = (offset + page_size).min(self.catalog.len());

        let next_token = (end < self.catalog.len())
            .then(|| ContinuationToken::new(end.to_string()))
            .flatten();

        AlbumPage::new(self.catalog[offset..end].to_vec(), next_token)
    }

    /// Exact id match; no trimming.
    pub fn find(&self, external_id: &str) -> Option<&AlbumSummary> {
        self.catalog.iter().find(|a| a.external_id == external_id)
    }
}

/// Empty, non-numeric or negative tokens start from the beginning.
fn decode_offset(token: Option<&ContinuationToken>) -> usize {
    token
        .and_then(|t| t.as_str().trim().parse::<usize>().ok())
        .unwrap_or(0)
}

fn demo_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn demo_album(index: usize) -> AlbumSummary {
    let number = index + 1;
    let id = format!("demo-album-{number:02}");
    let title = format!("{} #{number}", TITLES[index % TITLES.len()]);
    let media_count = ((index * 37) % 190 + 5) as u64;
    let created_at = demo_epoch() + Duration::days((index as i64) * 23);

    AlbumSummary::new(&id, title)
        .with_media_count(media_count)
        .with_created_at(created_at)
}

impl AlbumSource for DemoSource {
    fn name(&self) -> &str {
        "demo"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Demo
    }

    fn list_albums<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ProviderResult<AlbumPage>> {
        let page = self.page(token, page_size);
        tracing::debug!(
            token = token.map(ContinuationToken::as_str),
            returned = page.albums.len(),
            has_more = page.has_more(),
            "demo page"
        );
        Box::pin(async move { Ok(page) })
    }

    fn get_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ProviderResult<AlbumSummary>> {
        let result = self.find(external_id).cloned().ok_or_else(|| {
            ProviderError::not_found(format!("no demo album with id '{external_id}'"))
                .with_provider("demo")
        });
        Box::pin(async move { result })
    }

    fn is_authenticated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn token(raw: &str) -> ContinuationToken {
        ContinuationToken::new(raw).unwrap()
    }

    #[test]
    fn pages_through_whole_catalog() {
        let source = DemoSource::default();
        let mut next: Option<ContinuationToken> = None;
        let mut pages = 0;
        let mut ids = HashSet::new();

        loop {
            let page = source.page(next.as_ref(), 6);
            pages += 1;
            assert_eq!(page.albums.len(), 6);
            ids.extend(page.albums.iter().map(|a| a.external_id.clone()));
            match page.next_token {
                Some(t) => next = Some(t),
                None => break,
            }
        }

        assert_eq!(pages, 8);
        assert_eq!(ids.len(), 48);
    }

    #[test]
    fn same_input_same_output() {
        let a = DemoSource::default();
        let b = DemoSource::default();
        assert_eq!(a.page(Some(&token("12")), 5), b.page(Some(&token("12")), 5));
        assert_eq!(a.page(None, 20), a.page(None, 20));
    }

    #[test]
    fn invalid_token_reads_as_first_page() {
        let source = DemoSource::default();
        let first = source.page(None, 4);
        assert_eq!(source.page(Some(&token("garbage")), 4), first);
        assert_eq!(source.page(Some(&token("-3")), 4), first);
    }

    #[test]
    fn offset_past_end_is_empty_last_page() {
        let source = DemoSource::default();
        let page = source.page(Some(&token("1000")), 10);
        assert!(page.albums.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn short_final_page_has_no_token() {
        let source = DemoSource::new(10);
        let page = source.page(Some(&token("8")), 5);
        assert_eq!(page.albums.len(), 2);
        assert!(!page.has_more());
    }

    #[test]
    fn next_token_is_next_offset() {
        let source = DemoSource::default();
        let page = source.page(Some(&token("6")), 6);
        assert_eq!(page.albums[0].external_id, "demo-album-07");
        assert_eq!(page.next_token.unwrap().as_str(), "12");
    }

    #[test]
    fn page_size_is_clamped() {
        let source = DemoSource::new(120);
        assert_eq!(source.page(None, 0).albums.len(), 1);
        assert_eq!(source.page(None, 999).albums.len(), 50);
    }

    #[test]
    fn albums_carry_metadata() {
        let source = DemoSource::default();
        let album = source.find("demo-album-01").unwrap();
        assert_eq!(album.media_count, Some(5));
        assert_eq!(album.created_at, Some(demo_epoch()));
    }

    #[test]
    fn covers_only_with_a_base() {
        let source = DemoSource::new(3);
        assert!(source.page(None, 10).albums.iter().all(|a| a.cover_url.is_none()));

        let source = DemoSource::new(3).with_cover_base("http://127.0.0.1:8080/covers/");
        let album = source.find("demo-album-02").unwrap();
        assert_eq!(
            album.cover_url.as_deref(),
            Some("http://127.0.0.1:8080/covers/demo-album-02.jpg")
        );
        assert!(album.cover_url_parsed().is_some());
    }

    #[tokio::test]
    async fn get_album_unknown_is_not_found() {
        let source = DemoSource::default();
        let err = source.get_album("demo-album-99").await.unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::NotFound);

        let album = source.get_album("demo-album-48").await.unwrap();
        assert_eq!(album.external_id, "demo-album-48");
    }
}
