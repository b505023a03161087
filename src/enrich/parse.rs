//! Helpers for bounding prompts and reading JSON out of model output.

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Locate a JSON array in model output that may be wrapped in a markdown
/// fence or surrounded by prose.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if trimmed.starts_with('[') {
        return Some(trimmed);
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('[') {
                return Some(inner);
            }
        }
    }

    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    (end > start).then(|| &trimmed[start..=end])
}
