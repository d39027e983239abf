//! Album types shared by the fetcher, the reconciler and the driver.
//!
//! - [`AlbumSummary`]: a transient album description as reported upstream
//! - [`ContinuationToken`]: opaque pagination cursor
//! - [`AlbumPage`]: one page of summaries and the cursor for the next one
//! - [`ImportedAlbum`]: a locally-owned album record
//! - [`ImportReport`]: the outcome of a single import as seen by callers

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Which album source the daemon was configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Google Photos, authenticated with OAuth.
    Live,
    /// Built-in deterministic catalog.
    #[default]
    Demo,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "demo" => Ok(Self::Demo),
            other => Err(format!("unknown source mode '{other}' (expected live or demo)")),
        }
    }
}

/// Opaque pagination cursor handed out by an album source.
///
/// Never empty: an empty string on the wire means "first page" and is
/// represented as `None` rather than as a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a raw token, mapping empty or whitespace-only input to `None`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An album as reported by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    /// Stable identifier assigned by the source.
    pub external_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_count: Option<u64>,
    /// Download URL for the cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Link to the album on the provider's own site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AlbumSummary {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            media_count: None,
            cover_url: None,
            product_url: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_media_count(mut self, count: u64) -> Self {
        self.media_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_product_url(mut self, url: impl Into<String>) -> Self {
        self.product_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Returns the cover URL if it parses as an absolute http(s) URL.
    pub fn cover_url_parsed(&self) -> Option<Url> {
        let url = Url::parse(self.cover_url.as_deref()?).ok()?;
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    /// Title for display, falling back to the external id for untitled albums.
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            &self.external_id
        } else {
            title
        }
    }
}

/// One page of albums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPage {
    pub albums: Vec<AlbumSummary>,
    /// Cursor for the following page; `None` when this page is the last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<ContinuationToken>,
}

impl AlbumPage {
    pub fn new(albums: Vec<AlbumSummary>, next_token: Option<ContinuationToken>) -> Self {
        Self { albums, next_token }
    }

    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}

/// A locally-owned album created by an import.
///
/// `local_id` is assigned once by the store and never changes; there is at
/// most one record per `external_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedAlbum {
    pub local_id: u64,
    pub external_id: String,
    pub title: String,
    /// Path of the stored cover image, relative to the media library root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_ref: Option<String>,
    pub photo_count: u64,
    pub source_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default)]
    pub display_order: i64,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    pub imported_at: DateTime<Utc>,
}

impl ImportedAlbum {
    pub fn has_cover(&self) -> bool {
        self.cover_ref.is_some()
    }
}

/// Whether an import created a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Imported,
    #[serde(rename = "exists")]
    AlreadyExists,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imported => "imported",
            Self::AlreadyExists => "exists",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of importing one album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub local_id: u64,
    pub external_id: String,
    pub title: String,
    pub cover_attached: bool,
}

impl ImportReport {
    pub fn from_record(status: ImportStatus, record: &ImportedAlbum) -> Self {
        Self {
            status,
            local_id: record.local_id,
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            cover_attached: record.has_cover(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.status == ImportStatus::Imported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn token_rejects_empty() {
        assert!(ContinuationToken::new("").is_none());
        assert!(ContinuationToken::new("   ").is_none());
        assert_eq!(ContinuationToken::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn token_serializes_as_plain_string() {
        let token = ContinuationToken::new("CAE").unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"CAE\"");
    }

    #[test]
    fn source_mode_parse() {
        assert_eq!("LIVE".parse::<SourceMode>().unwrap(), SourceMode::Live);
        assert_eq!(" demo ".parse::<SourceMode>().unwrap(), SourceMode::Demo);
        assert!("cloud".parse::<SourceMode>().is_err());
    }

    #[test]
    fn cover_url_must_be_http() {
        let album = AlbumSummary::new("a", "A").with_cover_url("https://example.com/c.jpg");
        assert!(album.cover_url_parsed().is_some());

        let album = AlbumSummary::new("a", "A").with_cover_url("file:///etc/passwd");
        assert!(album.cover_url_parsed().is_none());

        let album = AlbumSummary::new("a", "A").with_cover_url("not a url");
        assert!(album.cover_url_parsed().is_none());
    }

    #[test]
    fn display_title_falls_back_to_id() {
        assert_eq!(AlbumSummary::new("id-1", "  ").display_title(), "id-1");
        assert_eq!(AlbumSummary::new("id-1", "Trip").display_title(), "Trip");
    }

    #[test]
    fn summary_json_shape() {
        let album = AlbumSummary::new("demo-album-01", "Beach")
            .with_media_count(12)
            .with_created_at(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        insta::assert_json_snapshot!(album, @r#"
        {
          "external_id": "demo-album-01",
          "title": "Beach",
          "media_count": 12,
          "created_at": "2024-05-01T00:00:00Z"
        }
        "#);
    }

    #[test]
    fn import_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ImportStatus::AlreadyExists).unwrap(),
            "\"exists\""
        );
        assert_eq!(
            serde_json::to_string(&ImportStatus::Imported).unwrap(),
            "\"imported\""
        );
    }

    #[test]
    fn report_reflects_cover() {
        let record = ImportedAlbum {
            local_id: 7,
            external_id: "x".into(),
            title: "X".into(),
            cover_ref: Some("7-cover.jpg".into()),
            photo_count: 3,
            source_date: Utc::now(),
            product_url: None,
            display_order: 0,
            categories: BTreeSet::new(),
            imported_at: Utc::now(),
        };
        let report = ImportReport::from_record(ImportStatus::Imported, &record);
        assert!(report.cover_attached);
        assert!(report.is_new());
        assert_eq!(report.local_id, 7);
    }
}
