//! Directory holding downloaded cover images.

use std::path::{Path, PathBuf};

use albumsync_providers::CoverImage;
use tracing::{debug, warn};

use crate::error::ServerResult;

/// Directory holding downloaded cover images.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name used for an album's cover: `<local_id>-cover.<ext>`.
    pub fn cover_name(local_id: u64, image: &CoverImage) -> String {
        format!("{local_id}-cover.{}", image.extension())
    }

    /// Writes the cover and returns its reference relative to the root.
    ///
    /// The bytes go to a temporary sibling first so a reader never sees a
    /// partial file.
    pub async fn store_cover(&self, local_id: u64, image: &CoverImage) -> ServerResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let name = Self::cover_name(local_id, image);
        let target = self.root.join(&name);
        let partial = self.root.join(format!(".{name}.part"));
        if let Err(e) = write_then_rename(&partial, &target, &image.bytes).await {
            discard(&partial).await;
            return Err(e.into());
        }

        debug!(path = %target.display(), size = image.bytes.len(), "stored cover");
        Ok(name)
    }

    /// Deletes a cover written by [`Self::store_cover`]. A missing file is fine.
    pub async fn remove_cover(&self, cover_ref: &str) {
        discard(&self.resolve(cover_ref)).await;
    }

    /// Path of a stored cover reference under the root.
    pub fn resolve(&self, cover_ref: &str) -> PathBuf {
        self.root.join(cover_ref)
    }
}

async fn write_then_rename(partial: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(partial, bytes).await?;
    tokio::fs::rename(partial, target).await
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed cover file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove cover file"),
    }
}
