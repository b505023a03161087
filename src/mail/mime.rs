//! MIME decoding: encoded-word headers and body extraction.
//!
//! Bodies prefer `text/plain` over `text/html`: every non-attachment plain
//! part is concatenated, and HTML is only returned when no plain text exists.

use std::borrow::Cow;

use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::MailError;
use crate::mail::types::RawMessage;

/// Returned when a message has neither plain-text nor HTML content.
pub const NO_READABLE_CONTENT: &str = "[No readable content]";

/// Placeholder for an absent header.
pub const MISSING_HEADER: &str = "N/A";

const UNKNOWN_SENDER: &str = "Unknown";
const NO_SUBJECT: &str = "No Subject";

/// Decode a raw header value that may contain RFC 2047 encoded-words.
///
/// Each encoded-word is decoded with its declared charset; bytes that do not
/// decode are replaced rather than failing. Empty input yields `"N/A"`.
pub fn decode_header(raw: &str) -> String {
    let unfolded: String = raw.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let unfolded = unfolded.trim();
    if unfolded.is_empty() {
        return MISSING_HEADER.to_string();
    }
    if !unfolded.contains("=?") {
        return unfolded.to_string();
    }

    // Let the message parser handle charset lookup by presenting the value
    // as an unstructured header.
    let synthetic = format!("Subject: {unfolded}\r\n\r\n");
    MessageParser::default()
        .parse(synthetic.as_bytes())
        .and_then(|m| m.subject().map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| unfolded.to_string())
}

/// Parse a raw RFC 822 message into a [`RawMessage`].
pub fn parse_message(id: &str, raw: &[u8]) -> Result<RawMessage, MailError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailError::Decode {
            id: id.to_string(),
            reason: "not a parseable RFC 822 message".into(),
        })?;

    let sender = parsed
        .header_raw("From")
        .map(decode_header)
        .filter(|s| s != MISSING_HEADER)
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let subject = parsed
        .subject()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUBJECT)
        .to_string();

    let date = parsed
        .header_raw("Date")
        .map(decode_header)
        .unwrap_or_else(|| MISSING_HEADER.to_string());

    Ok(RawMessage {
        id: id.to_string(),
        sender,
        subject,
        date,
        body: extract_body(&parsed),
        unread: true,
    })
}

/// Extract the readable body of a parsed message.
pub fn extract_body(message: &Message<'_>) -> String {
    let mut body = BodyParts::default();
    collect_parts(message, &mut body);
    body.finish()
}

#[derive(Default)]
struct BodyParts {
    text: String,
    html: String,
}

impl BodyParts {
    fn add(&mut self, part: &MessagePart<'_>) {
        let target = match body_kind(part) {
            BodyKind::Plain => &mut self.text,
            BodyKind::Html => &mut self.html,
            BodyKind::Other => return,
        };

        if part.is_encoding_problem {
            warn!("Skipping body part that failed to decode");
            return;
        }

        match part_text(part) {
            Some(text) => target.push_str(&text),
            None => debug!("Text part carried no decodable payload"),
        }
    }

    fn finish(self) -> String {
        if !self.text.is_empty() {
            self.text
        } else if !self.html.is_empty() {
            self.html
        } else {
            NO_READABLE_CONTENT.to_string()
        }
    }
}

fn collect_parts(message: &Message<'_>, body: &mut BodyParts) {
    let Some(root) = message.parts.first() else {
        return;
    };

    // Single-part message: branch on the content type directly.
    if !matches!(root.body, PartType::Multipart(_)) {
        body.add(root);
        return;
    }

    for part in &message.parts {
        if is_attachment(part) {
            continue;
        }
        match &part.body {
            PartType::Multipart(_) => {}
            PartType::Message(inner) => collect_parts(inner, body),
            _ => body.add(part),
        }
    }
}

enum BodyKind {
    Plain,
    Html,
    Other,
}

fn body_kind(part: &MessagePart<'_>) -> BodyKind {
    // RFC 2045: no Content-Type means text/plain.
    let Some(ct) = part.content_type() else {
        return BodyKind::Plain;
    };
    if !ct.ctype().eq_ignore_ascii_case("text") {
        return BodyKind::Other;
    }
    match ct.subtype() {
        None => BodyKind::Plain,
        Some(sub) if sub.eq_ignore_ascii_case("plain") => BodyKind::Plain,
        Some(sub) if sub.eq_ignore_ascii_case("html") => BodyKind::Html,
        Some(_) => BodyKind::Other,
    }
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|cd| cd.ctype().eq_ignore_ascii_case("attachment"))
}

fn part_text<'a>(part: &'a MessagePart<'_>) -> Option<Cow<'a, str>> {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => Some(Cow::Borrowed(text.as_ref())),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            Some(String::from_utf8_lossy(bytes.as_ref()))
        }
        PartType::Message(_) | PartType::Multipart(_) => None,
    }
}
