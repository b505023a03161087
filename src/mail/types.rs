//! Mail-side data types: decoded messages, fetch filters, IMAP search queries.

use serde::{Deserialize, Serialize};

/// A message retrieved from the server and decoded to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Server-assigned message identifier (IMAP sequence number).
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub date: String,
    /// Plain-text body, or HTML when the message has no plain-text part.
    pub body: String,
    /// Always `true`; flags are not inspected.
    pub unread: bool,
}

/// Optional narrowing of a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FetchFilter {
    /// Mailbox to select; `inbox` when absent.
    #[serde(default)]
    pub folder: Option<String>,
    /// Only unseen messages. Takes precedence over `from` and `subject`.
    #[serde(default)]
    pub unread: bool,
    /// Substring match on the sender. Takes precedence over `subject`.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

impl FetchFilter {
    pub const DEFAULT_FOLDER: &'static str = "inbox";

    pub fn unread_only() -> Self {
        Self {
            unread: true,
            ..Self::default()
        }
    }

    pub fn folder(&self) -> &str {
        self.folder
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(Self::DEFAULT_FOLDER)
    }

    /// Build the search for this filter: unseen, else sender, else subject,
    /// else everything.
    pub fn search_query(&self) -> SearchQuery {
        let non_empty = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if self.unread {
            SearchQuery::Unseen
        } else if let Some(from) = non_empty(&self.from) {
            SearchQuery::From(from)
        } else if let Some(subject) = non_empty(&self.subject) {
            SearchQuery::Subject(subject)
        } else {
            SearchQuery::All
        }
    }
}

/// An IMAP SEARCH expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    All,
    Unseen,
    From(String),
    Subject(String),
}

impl SearchQuery {
    /// Render as the argument of an IMAP `SEARCH` command.
    pub fn to_imap(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Unseen => "UNSEEN".to_string(),
            Self::From(s) => format!("FROM {}", quote(s)),
            Self::Subject(s) => format!("SUBJECT {}", quote(s)),
        }
    }
}

/// Encode `s` as an IMAP quoted string.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            // CR/LF cannot appear in a quoted string
            '\r' | '\n' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
