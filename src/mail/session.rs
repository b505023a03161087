//! Mail session abstraction.
//!
//! A `MailConnector` opens authenticated `MailSession`s. Sessions are
//! blocking and not thread-safe; callers share one behind a mutex and run
//! calls on the blocking pool.

use crate::error::MailError;
use crate::mail::types::SearchQuery;

/// Outcome of a single FETCH that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReply {
    /// Tagged OK with the raw RFC 822 bytes.
    Message(Vec<u8>),
    /// Tagged OK, but the response carried no message body.
    Empty,
    /// Tagged NO or BAD; the text is the server's reason.
    Rejected(String),
}

/// An authenticated mail session.
pub trait MailSession: Send {
    /// Select a mailbox for subsequent search/fetch calls.
    fn select(&mut self, folder: &str) -> Result<(), MailError>;

    /// Return matching message identifiers in ascending server order.
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<String>, MailError>;

    /// Fetch the full raw content of one message.
    fn fetch_message(&mut self, id: &str) -> Result<FetchReply, MailError>;

    /// End the session.
    fn logout(&mut self) -> Result<(), MailError>;
}

/// Opens sessions against a mail server.
pub trait MailConnector: Send + Sync {
    /// Connect, negotiate TLS and log in.
    fn connect(&self) -> Result<Box<dyn MailSession>, MailError>;

    /// Check that the server is reachable and TLS negotiates, without
    /// logging in.
    fn probe(&self) -> Result<(), MailError>;
}
