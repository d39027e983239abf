//! Album sources and cover downloads.
//!
//! - [`AlbumSource`] - the paging interface both sources implement
//! - [`DemoSource`] - deterministic in-memory catalog; no network use unless given a cover base
//! - [`google::GooglePhotosSource`] - the Photos Library API (feature `google`)
//! - [`CoverFetcher`] - downloads a cover image for the import step
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐
//! │ Photos Library   │    │ built-in catalog │
//! └────────┬─────────┘    └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//! ┌──────────────────┐    ┌──────────────────┐
//! │GooglePhotosSource│    │    DemoSource    │
//! └────────┬─────────┘    └────────┬─────────┘
//!          │      AlbumSource      │
//!          └───────────┬───────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   AlbumPage   │
//!              └───────────────┘
//! ```

pub mod covers;
pub mod demo;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod source;

#[cfg(test)]
pub(crate) mod test_server;

pub use covers::{CoverFetcher, CoverImage, HttpCoverFetcher};
pub use demo::DemoSource;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use source::{AlbumSource, BoxFuture, ErrorSource, MAX_PAGE_SIZE, clamp_page_size, with_auth_retry};
