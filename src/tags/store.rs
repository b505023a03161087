//! File-backed tag store.
//!
//! Holds user-defined tags and the tag→color map. The whole file is
//! rewritten on every mutation; mutations are serialized and only become
//! visible once the write succeeded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::TagStoreError;
use crate::tags::TagColors;
use crate::tags::defaults::{
    CUSTOM_CATEGORY, DEFAULT_COLORS, FALLBACK_COLOR, NEW_TAG_COLOR, TAG_CATEGORIES, category_of,
    is_standard, is_valid_color, standard_tags,
};

/// On-disk format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TagFile {
    #[serde(default)]
    user_tags: Vec<String>,
    #[serde(default)]
    tag_colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct TagState {
    user_tags: BTreeSet<String>,
    colors: HashMap<String, String>,
}

impl TagState {
    fn defaults() -> Self {
        Self {
            user_tags: BTreeSet::new(),
            colors: DEFAULT_COLORS
                .iter()
                .map(|(name, color)| (name.to_string(), color.to_string()))
                .collect(),
        }
    }

    fn from_file(file: TagFile) -> Self {
        let mut state = Self::defaults();
        state.user_tags = file
            .user_tags
            .into_iter()
            .filter_map(|t| normalize(&t))
            .collect();
        // Saved colors override defaults.
        state.colors.extend(file.tag_colors);
        state
    }

    fn to_file(&self) -> TagFile {
        TagFile {
            user_tags: self.user_tags.iter().cloned().collect(),
            tag_colors: self
                .colors
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        is_standard(name) || self.user_tags.contains(name)
    }
}

/// One row of the tag listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDetail {
    pub name: String,
    pub color: String,
    pub category: String,
}

pub struct TagStore {
    path: PathBuf,
    state: RwLock<TagState>,
    write_lock: Mutex<()>,
}

impl TagStore {
    /// Load from `path`. A missing file starts from the defaults; an
    /// unreadable or malformed one is logged and ignored.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<TagFile>(&text) {
                Ok(file) => {
                    let state = TagState::from_file(file);
                    info!(
                        path = %path.display(),
                        user_tags = state.user_tags.len(),
                        "Loaded tag store"
                    );
                    state
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed tag file, using defaults");
                    TagState::defaults()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No tag file yet, using defaults");
                TagState::defaults()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read tag file, using defaults");
                TagState::defaults()
            }
        };

        Self {
            path,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
        }
    }

    /// Standard and user tags, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let state = self.read();
        let mut all: BTreeSet<String> = standard_tags().map(str::to_string).collect();
        all.extend(state.user_tags.iter().cloned());
        all.into_iter().collect()
    }

    pub fn user_tags(&self) -> Vec<String> {
        self.read().user_tags.iter().cloned().collect()
    }

    /// Tags grouped by category; user tags under `custom`.
    pub fn by_category(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = TAG_CATEGORIES
            .iter()
            .map(|(category, tags)| {
                (
                    category.to_string(),
                    tags.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        grouped.insert(CUSTOM_CATEGORY.to_string(), self.user_tags());
        grouped
    }

    pub fn details(&self) -> Vec<TagDetail> {
        let names = self.all_tags();
        let state = self.read();
        names
            .into_iter()
            .map(|name| TagDetail {
                color: state
                    .colors
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_COLOR.to_string()),
                category: category_of(&name).unwrap_or(CUSTOM_CATEGORY).to_string(),
                name,
            })
            .collect()
    }

    /// Add a user tag, returning its normalized name. Re-adding an
    /// existing user tag is a no-op success.
    pub async fn add_tag(&self, name: &str) -> Result<String, TagStoreError> {
        let tag = normalize(name).ok_or_else(|| TagStoreError::InvalidName(name.to_string()))?;
        if is_standard(&tag) {
            return Err(TagStoreError::StandardTag(tag));
        }

        self.mutate(|state| {
            state.user_tags.insert(tag.clone());
            state
                .colors
                .entry(tag.clone())
                .or_insert_with(|| NEW_TAG_COLOR.to_string());
            Ok(())
        })
        .await?;

        info!(tag = %tag, "Tag added");
        Ok(tag)
    }

    /// Remove a user tag and its color. Standard tags cannot be removed.
    pub async fn remove_tag(&self, name: &str) -> Result<(), TagStoreError> {
        let tag = normalize(name).ok_or_else(|| TagStoreError::InvalidName(name.to_string()))?;

        self.mutate(|state| {
            if !state.user_tags.remove(&tag) {
                return Err(TagStoreError::UnknownTag(tag.clone()));
            }
            state.colors.remove(&tag);
            Ok(())
        })
        .await?;

        info!(tag = %tag, "Tag removed");
        Ok(())
    }

    pub async fn set_color(&self, name: &str, color: &str) -> Result<(), TagStoreError> {
        let color = color.trim();
        if !is_valid_color(color) {
            return Err(TagStoreError::InvalidColor(color.to_string()));
        }
        let tag = normalize(name).ok_or_else(|| TagStoreError::InvalidName(name.to_string()))?;

        self.mutate(|state| {
            if !state.contains(&tag) {
                return Err(TagStoreError::UnknownTag(tag.clone()));
            }
            state.colors.insert(tag.clone(), color.to_string());
            Ok(())
        })
        .await?;

        info!(tag = %tag, color, "Tag color updated");
        Ok(())
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    async fn mutate<F>(&self, change: F) -> Result<(), TagStoreError>
    where
        F: FnOnce(&mut TagState) -> Result<(), TagStoreError>,
    {
        let _guard = self.write_lock.lock().await;

        let mut next = self.read().clone();
        change(&mut next)?;

        let json = serde_json::to_string_pretty(&next.to_file())?;
        tokio::fs::write(&self.path, json).await?;

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TagState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TagColors for TagStore {
    fn color_of(&self, name: &str) -> Option<String> {
        let tag = normalize(name)?;
        self.read().colors.get(&tag).cloned()
    }
}

fn normalize(name: &str) -> Option<String> {
    let tag = name.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}
