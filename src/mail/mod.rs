//! Mail retrieval: IMAP transport, MIME decoding and the parallel fetcher.

pub mod fetcher;
pub mod imap;
pub mod mime;
pub mod session;
pub mod types;

pub use fetcher::{MAX_FETCH_ATTEMPTS, MAX_FETCH_WORKERS, MailFetcher};
pub use imap::ImapConnector;
pub use session::{FetchReply, MailConnector, MailSession};
pub use types::{FetchFilter, RawMessage, SearchQuery};
