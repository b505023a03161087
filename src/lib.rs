//! Grey Mail: IMAP fetching with AI summaries and tags, served over HTTP.

pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod llm;
pub mod mail;
pub mod tags;
