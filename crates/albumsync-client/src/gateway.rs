//! The driver's view of whatever serves albums.

use albumsync_core::{AlbumPage, ContinuationToken, ImportReport};
use albumsync_providers::BoxFuture;

use crate::error::ClientResult;

/// Fetch and import calls the pagination driver issues.
///
/// [`SocketClient`](crate::socket::SocketClient) forwards them to the daemon.
pub trait AlbumGateway: Send + Sync {
    /// One page starting at `token`; `None` asks for the first page.
    fn fetch_page<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ClientResult<AlbumPage>>;

    /// Imports one album; an album already stored is reported, not an error.
    fn import_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ClientResult<ImportReport>>;
}

impl<G: AlbumGateway + ?Sized> AlbumGateway for std::sync::Arc<G> {
    fn fetch_page<'a>(
        &'a self,
        token: Option<&'a ContinuationToken>,
        page_size: u32,
    ) -> BoxFuture<'a, ClientResult<AlbumPage>> {
        (**self).fetch_page(token, page_size)
    }

    fn import_album<'a>(&'a self, external_id: &'a str) -> BoxFuture<'a, ClientResult<ImportReport>> {
        (**self).import_album(external_id)
    }
}
