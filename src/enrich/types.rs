//! Enrichment output types.

use serde::{Deserialize, Serialize};

use crate::mail::RawMessage;

/// A topical tag attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Lower-cased, trimmed.
    pub name: String,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    /// Hex color from the tag store; `None` for unknown tags.
    pub color: Option<String>,
}

/// A fetched message with its summary and tags, as served over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEmail {
    pub id: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub subject: String,
    pub summary: String,
    pub date: String,
    /// Most relevant first, at most three.
    pub tags: Vec<Tag>,
    pub unread: bool,
}

impl EnrichedEmail {
    pub fn new(message: RawMessage, summary: String, tags: Vec<Tag>) -> Self {
        Self {
            id: message.id,
            sender: message.sender,
            subject: message.subject,
            summary,
            date: message.date,
            tags,
            unread: message.unread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_sender_as_from() {
        let email = EnrichedEmail {
            id: "7".into(),
            sender: "dean@uni.edu".into(),
            subject: "Exam schedule".into(),
            summary: "Exams start Monday.".into(),
            date: "Tue, 7 Oct 2025 10:00:00 +0000".into(),
            tags: vec![Tag {
                name: "academic".into(),
                confidence: 0.8,
                color: None,
            }],
            unread: true,
        };

        let json = serde_json::to_value(&email).unwrap();
        assert_eq!(json["from"], "dean@uni.edu");
        assert!(json.get("sender").is_none());
        assert_eq!(json["tags"][0]["name"], "academic");
        assert!(json["tags"][0]["color"].is_null());
    }
}
