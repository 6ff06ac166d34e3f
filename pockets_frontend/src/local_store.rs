use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::User;

pub const EVENTS_VIEW_MODE_KEY: &str = "events-view-mode";
pub const POCKETS_SORT_KEY: &str = "pockets-sort-filter";
pub const LAST_SELECTED_CARD_KEY: &str = "last-selected-card";
pub const CACHED_USER_KEY: &str = "cached-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Name,
}

/// Small persistent key/value store for UI preferences. Values are JSON
/// encoded strings; anything absent or unreadable reads back as the default.
pub struct LocalStore {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl LocalStore {
    /// Loads from `path`. A missing file is an empty store; a corrupt one is
    /// logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring unreadable local store");
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.values.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored value has unexpected shape");
                None
            }
        }
    }

    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get(key).unwrap_or_default()
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value).with_context(|| format!("failed to encode {key}"))?;
        self.values.insert(key.to_string(), encoded);
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let encoded = serde_json::to_string_pretty(&self.values)?;
        fs::write(path, encoded).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn events_view_mode(&self) -> ViewMode {
        self.get_or_default(EVENTS_VIEW_MODE_KEY)
    }

    pub fn set_events_view_mode(&mut self, mode: ViewMode) -> Result<()> {
        self.set(EVENTS_VIEW_MODE_KEY, &mode)
    }

    pub fn pockets_sort(&self) -> SortOrder {
        self.get_or_default(POCKETS_SORT_KEY)
    }

    pub fn set_pockets_sort(&mut self, order: SortOrder) -> Result<()> {
        self.set(POCKETS_SORT_KEY, &order)
    }

    pub fn last_selected_card(&self) -> Option<String> {
        self.get(LAST_SELECTED_CARD_KEY)
    }

    pub fn set_last_selected_card(&mut self, card_id: Option<&str>) -> Result<()> {
        match card_id {
            Some(id) => self.set(LAST_SELECTED_CARD_KEY, &id),
            None => self.remove(LAST_SELECTED_CARD_KEY),
        }
    }

    pub fn cached_user(&self) -> Option<User> {
        self.get(CACHED_USER_KEY)
    }

    pub fn set_cached_user(&mut self, user: Option<&User>) -> Result<()> {
        match user {
            Some(user) => self.set(CACHED_USER_KEY, user),
            None => self.remove(CACHED_USER_KEY),
        }
    }
}
