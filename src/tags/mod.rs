//! Tag vocabulary, colors and the file-backed tag store.

pub mod defaults;
pub mod store;

pub use store::{TagDetail, TagStore};

use std::collections::HashMap;

/// Read access to tag colors, by tag name.
pub trait TagColors: Send + Sync {
    fn color_of(&self, name: &str) -> Option<String>;
}

impl TagColors for HashMap<String, String> {
    fn color_of(&self, name: &str) -> Option<String> {
        self.get(&name.trim().to_lowercase()).cloned()
    }
}
