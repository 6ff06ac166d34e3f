//! Read-through cache of remote entities keyed by hierarchical query keys.
//!
//! Keys read like paths: `["photos", "event", <event id>, "photos"]`. Marking a
//! key stale marks every key below it too, so invalidating `["events"]`
//! touches every cached event listing. Entries are never edited by callers
//! directly; `set`, `update` and the `invalidate_*` helpers are the only ways
//! in.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn me() -> Self {
        Self::new(["me"])
    }

    pub fn pockets() -> Self {
        Self::new(["pockets"])
    }

    pub fn pockets_list() -> Self {
        Self::new(["pockets", "list"])
    }

    pub fn pocket_detail(pocket_id: &str) -> Self {
        Self::new(["pockets", "detail", pocket_id])
    }

    pub fn events_for_pocket(pocket_id: &str) -> Self {
        Self::new(["events", "pocket", pocket_id])
    }

    pub fn event_detail(event_id: &str) -> Self {
        Self::new(["events", "detail", event_id])
    }

    pub fn event_members(event_id: &str) -> Self {
        Self::new(["events", "detail", event_id, "members"])
    }

    pub fn event_photos(event_id: &str) -> Self {
        Self::new(["photos", "event", event_id, "photos"])
    }

    pub fn contacts() -> Self {
        Self::new(["contacts"])
    }

    pub fn contacts_list() -> Self {
        Self::new(["contacts", "list"])
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    fetched_at: Instant,
    stale: bool,
}

pub struct QueryCache {
    entries: BTreeMap<QueryKey, CacheEntry>,
    stale_after: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl QueryCache {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            stale_after,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.entries.get(key)?;
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%key, error = %err, "cached value has unexpected shape");
                None
            }
        }
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set<T: Serialize>(&mut self, key: QueryKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        value,
                        fetched_at: Instant::now(),
                        stale: false,
                    },
                );
            }
            Err(err) => warn!(%key, error = %err, "refusing to cache unserialisable value"),
        }
    }

    /// Applies `f` to the cached value in place. Returns false when the key
    /// is missing or holds a different shape. Freshness is left untouched.
    pub fn update<T, F>(&mut self, key: &QueryKey, f: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Ok(mut value) = serde_json::from_value::<T>(entry.value.clone()) else {
            return false;
        };
        f(&mut value);
        match serde_json::to_value(&value) {
            Ok(updated) => {
                entry.value = updated;
                true
            }
            Err(_) => false,
        }
    }

    /// Marks `prefix` and every key beneath it stale. Returns how many cached
    /// entries were affected.
    pub fn invalidate(&mut self, prefix: &QueryKey) -> usize {
        let mut touched = 0;
        for (key, entry) in self.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.stale = true;
                touched += 1;
            }
        }
        debug!(%prefix, touched, "invalidated cache keys");
        touched
    }

    pub fn invalidate_exact(&mut self, key: &QueryKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, prefix: &QueryKey) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Missing keys count as stale: they need a fetch either way.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        match self.entries.get(key) {
            Some(entry) => entry.stale || entry.fetched_at.elapsed() >= self.stale_after,
            None => true,
        }
    }

    pub fn stale_keys(&self) -> Vec<QueryKey> {
        self.entries
            .keys()
            .filter(|key| self.is_stale(key))
            .cloned()
            .collect()
    }

    /// Photos were attached to an event: its listing, its detail (photo
    /// count), its pocket and the pocket list (aggregate counts) all change.
    pub fn invalidate_after_claim(&mut self, event_id: &str, pocket_id: Option<&str>) {
        self.invalidate_after_photo_mutation(event_id, pocket_id);
    }

    pub fn invalidate_after_photo_mutation(&mut self, event_id: &str, pocket_id: Option<&str>) {
        self.invalidate(&QueryKey::event_photos(event_id));
        self.invalidate_exact(&QueryKey::event_detail(event_id));
        match pocket_id {
            Some(pocket_id) => {
                self.invalidate_exact(&QueryKey::events_for_pocket(pocket_id));
                self.invalidate_exact(&QueryKey::pocket_detail(pocket_id));
            }
            None => {
                self.invalidate(&QueryKey::new(["events", "pocket"]));
                self.invalidate(&QueryKey::new(["pockets", "detail"]));
            }
        }
        self.invalidate(&QueryKey::pockets_list());
    }

    pub fn invalidate_after_event_change(&mut self, event_id: &str, pocket_id: &str) {
        self.invalidate(&QueryKey::event_detail(event_id));
        self.invalidate_exact(&QueryKey::events_for_pocket(pocket_id));
        self.invalidate_exact(&QueryKey::pocket_detail(pocket_id));
        self.invalidate(&QueryKey::pockets_list());
    }

    pub fn invalidate_after_pocket_change(&mut self, pocket_id: Option<&str>) {
        if let Some(pocket_id) = pocket_id {
            self.invalidate_exact(&QueryKey::pocket_detail(pocket_id));
        }
        self.invalidate(&QueryKey::pockets_list());
    }

    pub fn invalidate_contacts(&mut self) {
        self.invalidate(&QueryKey::contacts());
    }
}
