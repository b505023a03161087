//! Built-in tags and their colors.

/// Standard tags, grouped by category.
pub const TAG_CATEGORIES: [(&str, [&str; 4]); 4] = [
    ("priority", ["urgent", "important", "normal", "low"]),
    ("academic", ["academic", "deadline", "research", "lecture"]),
    ("activities", ["sports", "event", "club", "cultural"]),
    ("administrative", ["admin", "announcement", "registration", "fees"]),
];

pub const DEFAULT_COLORS: [(&str, &str); 17] = [
    ("urgent", "#e74c3c"),
    ("important", "#e67e22"),
    ("normal", "#3498db"),
    ("low", "#95a5a6"),
    ("academic", "#9b59b6"),
    ("deadline", "#c0392b"),
    ("research", "#8e44ad"),
    ("lecture", "#2980b9"),
    ("sports", "#2ecc71"),
    ("event", "#e67e22"),
    ("club", "#3498db"),
    ("cultural", "#d35400"),
    ("admin", "#7f8c8d"),
    ("announcement", "#34495e"),
    ("registration", "#1abc9c"),
    ("fees", "#f1c40f"),
    ("general", "#34495e"),
];

/// Color given to a newly added tag.
pub const NEW_TAG_COLOR: &str = "#3498db";

/// Color reported for a tag with none assigned.
pub const FALLBACK_COLOR: &str = "#888888";

pub const CUSTOM_CATEGORY: &str = "custom";

pub fn is_standard(name: &str) -> bool {
    category_of(name).is_some()
}

pub fn category_of(name: &str) -> Option<&'static str> {
    TAG_CATEGORIES
        .iter()
        .find(|(_, tags)| tags.contains(&name))
        .map(|(category, _)| *category)
}

pub fn standard_tags() -> impl Iterator<Item = &'static str> {
    TAG_CATEGORIES.iter().flat_map(|(_, tags)| tags.iter().copied())
}

/// `#rgb` or `#rrggbb`.
pub fn is_valid_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => {
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}
