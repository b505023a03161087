//! Mail fetcher: search a folder, then pull the newest messages in parallel.
//!
//! One session per fetch: connect, select, search, fetch, always log out.
//! Retrieval runs up to [`MAX_FETCH_WORKERS`] blocking tasks at once; they
//! share the session behind a mutex that is held only for the network call,
//! so MIME decoding overlaps with other fetches.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::{StreamExt, future, stream};
use tracing::{debug, error, info, warn};

use crate::error::MailError;
use crate::mail::mime::parse_message;
use crate::mail::session::{FetchReply, MailConnector, MailSession};
use crate::mail::types::{FetchFilter, RawMessage};

/// Upper bound on concurrent message retrievals.
pub const MAX_FETCH_WORKERS: usize = 5;

/// Attempts per message before it is dropped.
pub const MAX_FETCH_ATTEMPTS: u32 = 3;

type SharedSession = Arc<Mutex<Box<dyn MailSession>>>;

/// Fetches and decodes messages from the mail server.
pub struct MailFetcher {
    connector: Arc<dyn MailConnector>,
}

impl MailFetcher {
    pub fn new(connector: Arc<dyn MailConnector>) -> Self {
        Self { connector }
    }

    /// Fetch the `limit` most recent messages matching `filter`, newest first.
    ///
    /// Session-level failures (connect, login, select, search) are returned
    /// as errors. Individual messages that cannot be fetched or decoded are
    /// dropped.
    pub async fn fetch(
        &self,
        limit: usize,
        filter: &FetchFilter,
    ) -> Result<Vec<RawMessage>, MailError> {
        let started = Instant::now();
        let connector = Arc::clone(&self.connector);
        let session: SharedSession =
            Arc::new(Mutex::new(run_blocking(move || connector.connect()).await?));

        let result = fetch_in_session(&session, limit, filter).await;
        close_session(session).await;

        if let Ok(messages) = &result {
            info!(
                count = messages.len(),
                limit,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetched messages"
            );
        }
        result
    }

    /// Like [`fetch`](Self::fetch), but any session-level failure is logged
    /// and yields an empty list.
    pub async fn fetch_or_empty(&self, limit: usize, filter: &FetchFilter) -> Vec<RawMessage> {
        match self.fetch(limit, filter).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Mail fetch failed, continuing with no messages");
                Vec::new()
            }
        }
    }

    /// Check that the mail server is reachable.
    pub async fn probe(&self) -> Result<(), MailError> {
        let connector = Arc::clone(&self.connector);
        run_blocking(move || connector.probe()).await
    }
}

async fn fetch_in_session(
    session: &SharedSession,
    limit: usize,
    filter: &FetchFilter,
) -> Result<Vec<RawMessage>, MailError> {
    let folder = filter.folder().to_string();
    let query = filter.search_query();
    debug!(folder = %folder, query = %query.to_imap(), "Searching mailbox");

    let searching = Arc::clone(session);
    let ids = run_blocking(move || {
        let mut guard = lock(&searching);
        guard.select(&folder)?;
        guard.search(&query)
    })
    .await?;

    let total = ids.len();
    let selected = most_recent(ids, limit);
    if selected.is_empty() {
        debug!(total, "Nothing to fetch");
        return Ok(Vec::new());
    }

    debug!(total, selected = selected.len(), "Fetching messages");
    Ok(fetch_selected(session, selected, Arc::new(fetch_one)).await)
}

/// Run `worker` for each id on the blocking pool, at most
/// [`MAX_FETCH_WORKERS`] at a time, and return the results newest first.
async fn fetch_selected<W>(
    session: &SharedSession,
    selected: Vec<String>,
    worker: Arc<W>,
) -> Vec<RawMessage>
where
    W: Fn(&Mutex<Box<dyn MailSession>>, &str) -> Option<RawMessage> + Send + Sync + 'static,
{
    let workers = selected.len().clamp(1, MAX_FETCH_WORKERS);
    let mut fetched: Vec<(usize, RawMessage)> = stream::iter(selected.into_iter().enumerate())
        .map(|(pos, id)| {
            let session = Arc::clone(session);
            let worker = Arc::clone(&worker);
            async move {
                let log_id = id.clone();
                match tokio::task::spawn_blocking(move || worker(&*session, id.as_str())).await {
                    Ok(message) => message.map(|m| (pos, m)),
                    Err(e) => {
                        error!(id = %log_id, error = %e, "Fetch worker panicked");
                        None
                    }
                }
            }
        })
        .buffer_unordered(workers)
        .filter_map(future::ready)
        .collect()
        .await;

    // Server order is ascending by arrival; report newest first.
    fetched.sort_by(|a, b| b.0.cmp(&a.0));
    fetched.into_iter().map(|(_, m)| m).collect()
}

/// Keep the last `limit` identifiers.
fn most_recent(mut ids: Vec<String>, limit: usize) -> Vec<String> {
    let start = ids.len().saturating_sub(limit);
    ids.split_off(start)
}

fn fetch_one(session: &Mutex<Box<dyn MailSession>>, id: &str) -> Option<RawMessage> {
    fetch_and_decode(session, id, parse_message)
}

/// The session lock is released before `decode` runs.
fn fetch_and_decode<D>(
    session: &Mutex<Box<dyn MailSession>>,
    id: &str,
    decode: D,
) -> Option<RawMessage>
where
    D: FnOnce(&str, &[u8]) -> Result<RawMessage, MailError>,
{
    let raw = fetch_with_retry(session, id, MAX_FETCH_ATTEMPTS)?;
    match decode(id, &raw) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(id, error = %e, "Dropping message that failed to decode");
            None
        }
    }
}

/// Retrieve one message, retrying immediately on rejection or transport
/// error. Returns `None` once attempts are exhausted.
fn fetch_with_retry(
    session: &Mutex<Box<dyn MailSession>>,
    id: &str,
    max_attempts: u32,
) -> Option<Vec<u8>> {
    for attempt in 1..=max_attempts {
        let reply = lock(session).fetch_message(id);
        match reply {
            Ok(FetchReply::Message(raw)) => return Some(raw),
            Ok(FetchReply::Empty) => {
                warn!(id, "Server returned no message body");
                return None;
            }
            Ok(FetchReply::Rejected(reason)) => {
                warn!(id, attempt, reason = %reason, "Fetch rejected");
            }
            Err(e) => {
                warn!(id, attempt, error = %e, "Fetch failed");
            }
        }
    }
    warn!(id, attempts = max_attempts, "Giving up on message");
    None
}

async fn close_session(session: SharedSession) {
    if let Err(e) = run_blocking(move || lock(&session).logout()).await {
        warn!(error = %e, "Mail logout failed");
    }
}

fn lock(session: &Mutex<Box<dyn MailSession>>) -> MutexGuard<'_, Box<dyn MailSession>> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_blocking<T, F>(f: F) -> Result<T, MailError>
where
    F: FnOnce() -> Result<T, MailError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MailError::Worker(e.to_string()))?
}
