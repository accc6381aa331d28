// In-memory tier
//
// Not synchronized on its own: it lives inside the cache-wide lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bitmap::IconBitmap;
use crate::constants::INITIAL_ICON_CACHE_CAPACITY;
use crate::model::{ComponentKey, ProfileHandle};

/// A resolved icon/label pair. Entries are immutable once cached; an
/// upgrade replaces the whole `Arc`.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    /// `None` when stored bytes could not be decoded.
    pub icon: Option<IconBitmap>,
    pub title: String,
    /// Title as announced for the entry's profile.
    pub content_description: String,
    pub is_low_res: bool,
}

pub struct MemoryCache {
    entries: HashMap<ComponentKey, Arc<CacheEntry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(INITIAL_ICON_CACHE_CAPACITY),
        }
    }

    pub fn get(&self, key: &ComponentKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: ComponentKey, entry: Arc<CacheEntry>) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &ComponentKey) -> Option<Arc<CacheEntry>> {
        self.entries.remove(key)
    }

    /// Drop every entry of `package` for `profile`, including its
    /// package-level entry. Linear in the cache size.
    pub fn remove_package(&mut self, package: &str, profile: ProfileHandle) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| !(key.profile == profile && key.component.package == package));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentName;

    fn key(flat: &str, profile: u32) -> ComponentKey {
        ComponentKey::new(ComponentName::unflatten(flat).unwrap(), ProfileHandle(profile))
    }

    fn entry(title: &str) -> Arc<CacheEntry> {
        Arc::new(CacheEntry {
            title: title.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_get_returns_same_instance() {
        let mut cache = MemoryCache::new();
        let e = entry("A");
        cache.put(key("com.a/.Main", 0), Arc::clone(&e));
        let got = cache.get(&key("com.a/.Main", 0)).unwrap();
        assert!(Arc::ptr_eq(&got, &e));
        assert!(cache.get(&key("com.a/.Main", 10)).is_none());
    }

    #[test]
    fn test_remove_package_scoped_to_profile() {
        let mut cache = MemoryCache::new();
        cache.put(key("com.a/.Main", 0), entry("A"));
        cache.put(key("com.a/.Settings", 0), entry("A2"));
        cache.put(ComponentKey::for_package("com.a", ProfileHandle(0)), entry("pkg"));
        cache.put(key("com.a/.Main", 10), entry("A work"));
        cache.put(key("com.ab/.Main", 0), entry("AB"));

        assert_eq!(cache.remove_package("com.a", ProfileHandle(0)), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("com.a/.Main", 10)).is_some());
        assert!(cache.get(&key("com.ab/.Main", 0)).is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = MemoryCache::new();
        cache.put(key("com.a/.Main", 0), entry("A"));
        assert!(cache.remove(&key("com.a/.Main", 0)).is_some());
        assert!(cache.is_empty());
        cache.put(key("com.a/.Main", 0), entry("A"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
