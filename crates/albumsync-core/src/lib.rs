//! Core types: albums, continuation tokens, import outcomes, activity log

pub mod activity;
pub mod album;
pub mod tracing;

pub use activity::{ActivityLevel, ActivityLog, LogEntry};
pub use album::{
    AlbumPage, AlbumSummary, ContinuationToken, ImportReport, ImportStatus, ImportedAlbum,
    SourceMode,
};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
