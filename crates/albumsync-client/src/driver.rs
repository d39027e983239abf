//! Pagination driver for one browse/import session.
//!
//! ```text
//!  Idle ──start/load_more──▶ Loading ──page──▶ Idle
//!   │                          │
//!   │                        cancel
//!   │                          ▼
//!   │                      Cancelled ──start──▶ Loading
//!   └──bulk_import──▶ Importing ──done──▶ Idle
//! ```
//!
//! A driver owns the session state: accumulated albums, the tokens it has
//! seen and consumed, the album ids already shown and the pending next
//! token. Pages are only fetched when the caller asks; nothing is chained
//! automatically.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use albumsync_core::{ActivityLog, AlbumPage, AlbumSummary, ContinuationToken, ImportStatus};
use albumsync_providers::clamp_page_size;
use albumsync_server::DEFAULT_PAGE_SIZE;
use serde::Serialize;

use crate::error::{ClientError, ClientResult};
use crate::gateway::AlbumGateway;

/// Page size and pacing for one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Clamped into the sources' accepted range when used.
    pub page_size: u32,
    /// Pause between bulk import attempts.
    pub bulk_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bulk_delay: Duration::from_millis(crate::config::DEFAULT_BULK_DELAY_MS),
        }
    }
}

impl DriverConfig {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    #[must_use]
    pub fn with_bulk_delay(mut self, delay: Duration) -> Self {
        self.bulk_delay = delay;
        self
    }
}

/// Where a driver is in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Ready for `start`, `load_more` or `bulk_import`.
    Idle,
    /// A page request is in flight.
    Loading,
    /// `bulk_import` is running.
    Importing,
    /// The loading session was cancelled; only `start` leaves this state.
    Cancelled,
}

impl DriverState {
    /// Loading or importing; new requests are refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Loading | Self::Importing)
    }
}

/// What a `start` or `load_more` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was merged into the session.
    Applied {
        added: usize,
        /// Albums dropped because an earlier page already listed them.
        skipped: usize,
        has_more: bool,
    },
    /// Another load or import is running; nothing was requested.
    Busy,
    /// The last page has already been applied.
    NoMorePages,
    /// The session was cancelled; a page that arrived afterwards was dropped.
    Cancelled,
    /// The pending token was already used this session; nothing was requested.
    TokenAlreadyConsumed,
    /// The source handed back a token seen earlier; the page was dropped and
    /// paging stopped.
    DuplicatePage,
    /// The gateway returned an error; the session is left as it was.
    Failed(String),
}

/// One album that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub external_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    /// Ids actually sent; lower than the input when cancelled.
    pub attempted: usize,
    pub imported: usize,
    /// Already in the store before this run.
    pub already_present: usize,
    pub failed: usize,
    pub failures: Vec<BulkFailure>,
    /// Stopped early by `cancel`.
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct Session {
    albums: Vec<AlbumSummary>,
    seen_tokens: HashSet<ContinuationToken>,
    consumed_tokens: HashSet<ContinuationToken>,
    seen_ids: HashSet<String>,
    next_token: Option<ContinuationToken>,
    pages: usize,
}

/// Drives paging and bulk import against one [`AlbumGateway`].
///
/// All methods take `&self`, so a driver can be shared with a task that
/// calls [`cancel`](Self::cancel) while a load runs.
pub struct PaginationDriver<G> {
    gateway: G,
    config: DriverConfig,
    state: Mutex<DriverState>,
    session: Mutex<Session>,
    cancel_requested: AtomicBool,
    log: Arc<ActivityLog>,
}

impl<G: AlbumGateway> PaginationDriver<G> {
    pub fn new(gateway: G, config: DriverConfig) -> Self {
        Self {
            gateway,
            config,
            state: Mutex::new(DriverState::Idle),
            session: Mutex::new(Session::default()),
            cancel_requested: AtomicBool::new(false),
            log: Arc::new(ActivityLog::new()),
        }
    }

    /// Records into `log` instead of a private one.
    #[must_use]
    pub fn with_activity_log(mut self, log: Arc<ActivityLog>) -> Self {
        self.log = log;
        self
    }

    pub fn activity_log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    /// Current state; may change as soon as it is read.
    pub fn state(&self) -> DriverState {
        *lock(&self.state)
    }

    /// Albums accumulated so far, in the order pages delivered them.
    pub fn albums(&self) -> Vec<AlbumSummary> {
        lock(&self.session).albums.clone()
    }

    /// A next token is pending.
    pub fn has_more(&self) -> bool {
        lock(&self.session).next_token.is_some()
    }

    pub fn pages_loaded(&self) -> usize {
        lock(&self.session).pages
    }

    /// Resets the session and requests the first page.
    pub async fn start(&self) -> PageOutcome {
        if !self.begin(DriverState::Loading) {
            self.log.debug("start ignored, driver busy");
            return PageOutcome::Busy;
        }
        *lock(&self.session) = Session::default();
        self.log.info("loading first page");
        self.fetch(None).await
    }

    /// Requests the page after the last one applied.
    pub async fn load_more(&self) -> PageOutcome {
        match self.state() {
            DriverState::Loading | DriverState::Importing => {
                self.log.debug("load more ignored, driver busy");
                return PageOutcome::Busy;
            }
            DriverState::Cancelled => return PageOutcome::Cancelled,
            DriverState::Idle => {}
        }

        let token = {
            let session = lock(&self.session);
            let Some(token) = session.next_token.clone() else {
                return PageOutcome::NoMorePages;
            };
            if session.consumed_tokens.contains(&token) {
                self.log.warn(format!(
                    "refusing to reuse continuation token {}",
                    token.as_str()
                ));
                return PageOutcome::TokenAlreadyConsumed;
            }
            token
        };

        if !self.begin(DriverState::Loading) {
            return PageOutcome::Busy;
        }
        self.fetch(Some(token)).await
    }

    /// Asks a running load or import to stop. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let state = self.state();
        if state.is_busy() {
            self.cancel_requested.store(true, Ordering::SeqCst);
            self.log.info("cancel requested");
            true
        } else {
            false
        }
    }

    /// Imports `ids` one after another, pausing `bulk_delay` between
    /// attempts. A failed item is recorded and the next one is tried.
    pub async fn bulk_import(&self, ids: &[String]) -> ClientResult<BulkSummary> {
        if !self.begin(DriverState::Importing) {
            return Err(ClientError::Busy(
                "a page load or import is already running".into(),
            ));
        }
        self.log.info(format!("importing {} album(s)", ids.len()));

        let mut summary = BulkSummary::default();
        for (index, external_id) in ids.iter().enumerate() {
            if index > 0 && !self.config.bulk_delay.is_zero() {
                tokio::time::sleep(self.config.bulk_delay).await;
            }
            if self.cancel_requested.load(Ordering::SeqCst) {
                self.log.info(format!(
                    "import cancelled with {} of {} album(s) left",
                    ids.len() - index,
                    ids.len()
                ));
                summary.cancelled = true;
                break;
            }

            summary.attempted += 1;
            match self.gateway.import_album(external_id).await {
                Ok(report) if report.status == ImportStatus::Imported => {
                    summary.imported += 1;
                    let cover = if report.cover_attached { "" } else { ", no cover" };
                    self.log.info(format!(
                        "imported \"{}\" as #{}{cover}",
                        report.title, report.local_id
                    ));
                }
                Ok(report) => {
                    summary.already_present += 1;
                    self.log.info(format!(
                        "\"{}\" already imported as #{}",
                        report.title, report.local_id
                    ));
                }
                Err(e) => {
                    summary.failed += 1;
                    self.log.error(format!("import of {external_id} failed: {e}"));
                    summary.failures.push(BulkFailure {
                        external_id: external_id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.log.info(format!(
            "import finished: {} imported, {} already present, {} failed",
            summary.imported, summary.already_present, summary.failed
        ));
        self.finish(DriverState::Idle);
        Ok(summary)
    }

    /// Moves from a non-busy state to `next`; false if already busy.
    fn begin(&self, next: DriverState) -> bool {
        let mut state = lock(&self.state);
        if state.is_busy() {
            return false;
        }
        *state = next;
        self.cancel_requested.store(false, Ordering::SeqCst);
        true
    }

    fn finish(&self, next: DriverState) {
        *lock(&self.state) = next;
    }

    async fn fetch(&self, token: Option<ContinuationToken>) -> PageOutcome {
        let result = self
            .gateway
            .fetch_page(token.as_ref(), self.config.page_size)
            .await;

        if self.cancel_requested.load(Ordering::SeqCst) {
            self.log.info("page discarded after cancel");
            self.finish(DriverState::Cancelled);
            return PageOutcome::Cancelled;
        }

        let outcome = match result {
            Ok(page) => self.apply(token, page),
            Err(e) => {
                self.log.error(format!("failed to load albums: {e}"));
                PageOutcome::Failed(e.to_string())
            }
        };
        self.finish(DriverState::Idle);
        outcome
    }

    fn apply(&self, token: Option<ContinuationToken>, page: AlbumPage) -> PageOutcome {
        let mut session = lock(&self.session);
        if let Some(token) = token {
            session.consumed_tokens.insert(token);
        }

        if let Some(next) = &page.next_token {
            if session.seen_tokens.contains(next) {
                self.log.warn(format!(
                    "source repeated continuation token {}, stopping",
                    next.as_str()
                ));
                session.next_token = None;
                return PageOutcome::DuplicatePage;
            }
            session.seen_tokens.insert(next.clone());
        }

        let mut added = 0;
        let mut skipped = 0;
        for album in page.albums {
            if session.seen_ids.insert(album.external_id.clone()) {
                session.albums.push(album);
                added += 1;
            } else {
                self.log.debug(format!(
                    "skipping {} already listed on an earlier page",
                    album.external_id
                ));
                skipped += 1;
            }
        }

        session.next_token = page.next_token;
        session.pages += 1;
        let has_more = session.next_token.is_some();
        self.log.info(format!(
            "loaded {added} album(s), {} total{}",
            session.albums.len(),
            if has_more { ", more available" } else { "" }
        ));

        PageOutcome::Applied {
            added,
            skipped,
            has_more,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
