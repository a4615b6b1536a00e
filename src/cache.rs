//! Tab resource cache
//!
//! Maps a tab id to the heavyweight live page resource behind it, with
//! virtualize/evict/restore operations:
//! - **ensure_loaded** materializes the resource through the external loader
//! - **virtualize** releases the resource but keeps redisplay metadata
//! - **evict** removes the entry entirely (tab close)
//!
//! Every path that drops a live handle routes through the loader's `release`,
//! which must be idempotent. Eviction candidates are ranked by activation
//! recency, never by plain access; activation events are the only clock
//! updates.

use crate::error::ResourceResult;
use crate::tab::{TabId, TabRecord};
use std::collections::HashMap;

/// Opaque token for a materialized page resource
///
/// Issued by the loader collaborator; the cache stores and forwards it but
/// never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiveHandle(pub u64);

/// External collaborator that materializes and releases page resources
pub trait ResourceLoader {
    /// Create the live resource for a tab
    fn materialize(&mut self, tab: &TabRecord) -> ResourceResult<LiveHandle>;

    /// Release a live resource; must be safe to call twice for one handle
    fn release(&mut self, handle: LiveHandle);
}

/// Metadata retained so a virtualized tab can be redisplayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabMeta {
    pub url: String,
    pub title: String,
    pub thumbnail_path: Option<String>,
}

impl From<&TabRecord> for TabMeta {
    fn from(tab: &TabRecord) -> Self {
        Self {
            url: tab.url.clone(),
            title: tab.title.clone(),
            thumbnail_path: tab.thumbnail_path.clone(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    /// Live resource handle; `None` while virtualized
    handle: Option<LiveHandle>,
    /// Activation stamp used for eviction ranking
    last_activated: u64,
    meta: TabMeta,
}

/// Counters for cache behavior, useful in diagnostics
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub virtualizations: u64,
    pub evictions: u64,
}

/// Bounded store of live page resources keyed by tab id
///
/// An entry may exist only while its tab id is present in the collection;
/// the owning model maintains that invariant by evicting on tab removal.
#[derive(Debug, Default)]
pub struct TabCache {
    entries: HashMap<TabId, CacheEntry>,
    stats: CacheStats,
}

impl TabCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live handle for a tab, materializing it on demand
    ///
    /// The cache is mutated only after the loader succeeds; a failed
    /// materialization leaves the entry (or its absence) untouched.
    pub fn ensure_loaded(
        &mut self,
        tab: &TabRecord,
        loader: &mut dyn ResourceLoader,
    ) -> ResourceResult<LiveHandle> {
        if let Some(entry) = self.entries.get(&tab.id) {
            if let Some(handle) = entry.handle {
                self.stats.hits += 1;
                return Ok(handle);
            }
        }

        self.stats.misses += 1;
        let handle = loader.materialize(tab)?;

        let entry = self.entries.entry(tab.id).or_insert_with(|| CacheEntry {
            handle: None,
            last_activated: 0,
            meta: TabMeta::from(tab),
        });
        entry.handle = Some(handle);
        entry.meta = TabMeta::from(tab);

        tracing::debug!("Materialized page for tab {}", tab.id);
        Ok(handle)
    }

    /// Release a tab's live resource, keeping its redisplay metadata
    ///
    /// Idempotent; virtualizing an already-virtualized or unknown tab is a
    /// no-op.
    pub fn virtualize(&mut self, id: TabId, loader: &mut dyn ResourceLoader) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if let Some(handle) = entry.handle.take() {
                loader.release(handle);
                self.stats.virtualizations += 1;
                tracing::debug!("Virtualized tab {}", id);
            }
        }
    }

    /// Remove a tab's entry entirely, releasing any live resource
    pub fn evict(&mut self, id: TabId, loader: &mut dyn ResourceLoader) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    loader.release(handle);
                }
                self.stats.evictions += 1;
                tracing::debug!("Evicted tab {} from cache", id);
                true
            }
            None => false,
        }
    }

    /// Release all live resources and drop every entry
    pub fn clear(&mut self, loader: &mut dyn ResourceLoader) {
        for (_, entry) in self.entries.drain() {
            if let Some(handle) = entry.handle {
                loader.release(handle);
            }
        }
    }

    /// Record an activation event for eviction ranking
    pub fn touch_activated(&mut self, id: TabId, stamp: u64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_activated = stamp;
        }
    }

    /// Refresh the redisplay metadata for a tab
    pub fn update_meta(&mut self, tab: &TabRecord) {
        if let Some(entry) = self.entries.get_mut(&tab.id) {
            entry.meta = TabMeta::from(tab);
        }
    }

    /// Least-recently-activated live tab outside the exempt set
    ///
    /// The exempt set holds the active tab (and, mid-activation, the incoming
    /// one). Ties at equal activation rank break toward the lowest tab id, so
    /// eviction order is deterministic.
    pub fn eviction_candidate(&self, exempt: &[TabId]) -> Option<TabId> {
        self.entries
            .iter()
            .filter(|(id, entry)| entry.handle.is_some() && !exempt.contains(id))
            .min_by_key(|(id, entry)| (entry.last_activated, **id))
            .map(|(id, _)| *id)
    }

    /// Whether a tab currently holds a live resource
    pub fn is_live(&self, id: TabId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.handle.is_some())
    }

    /// Whether any entry (live or virtualized) exists for a tab
    pub fn contains(&self, id: TabId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Redisplay metadata for a cached tab
    pub fn meta(&self, id: TabId) -> Option<&TabMeta> {
        self.entries.get(&id).map(|entry| &entry.meta)
    }

    /// Number of live (non-virtualized) entries
    pub fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.handle.is_some())
            .count()
    }

    /// Total number of entries, live or virtualized
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of all cached tabs, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = TabId> + '_ {
        self.entries.keys().copied()
    }

    /// Cache behavior counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceError;

    /// Loader that hands out sequential handles and records releases
    #[derive(Default)]
    struct FakeLoader {
        next_handle: u64,
        released: Vec<LiveHandle>,
        fail: bool,
    }

    impl ResourceLoader for FakeLoader {
        fn materialize(&mut self, tab: &TabRecord) -> ResourceResult<LiveHandle> {
            if self.fail {
                return Err(ResourceError::MaterializeFailed {
                    tab: tab.id,
                    reason: "engine down".to_string(),
                });
            }
            self.next_handle += 1;
            Ok(LiveHandle(self.next_handle))
        }

        fn release(&mut self, handle: LiveHandle) {
            self.released.push(handle);
        }
    }

    fn record(id: u32) -> TabRecord {
        TabRecord::new(TabId::new(id), format!("https://{id}.example"), format!("Tab {id}"))
    }

    #[test]
    fn test_ensure_loaded_materializes_once() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        let tab = record(1);

        let first = cache.ensure_loaded(&tab, &mut loader).unwrap();
        let second = cache.ensure_loaded(&tab, &mut loader).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_live(tab.id));
    }

    #[test]
    fn test_failed_materialization_leaves_cache_untouched() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader { fail: true, ..Default::default() };
        let tab = record(1);

        assert!(cache.ensure_loaded(&tab, &mut loader).is_err());
        assert!(!cache.contains(tab.id));
        assert_eq!(cache.live_count(), 0);
    }

    #[test]
    fn test_virtualize_is_idempotent() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        let tab = record(1);
        let handle = cache.ensure_loaded(&tab, &mut loader).unwrap();

        cache.virtualize(tab.id, &mut loader);
        let after_first = (cache.is_live(tab.id), cache.contains(tab.id), loader.released.clone());

        cache.virtualize(tab.id, &mut loader);
        let after_second = (cache.is_live(tab.id), cache.contains(tab.id), loader.released.clone());

        assert_eq!(after_first, after_second);
        assert_eq!(loader.released, vec![handle]);
        assert_eq!(cache.meta(tab.id).unwrap().url, tab.url);
    }

    #[test]
    fn test_reload_after_virtualize() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        let tab = record(1);

        let first = cache.ensure_loaded(&tab, &mut loader).unwrap();
        cache.virtualize(tab.id, &mut loader);
        let second = cache.ensure_loaded(&tab, &mut loader).unwrap();

        assert_ne!(first, second);
        assert!(cache.is_live(tab.id));
    }

    #[test]
    fn test_evict_releases_live_handle() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        let tab = record(1);
        let handle = cache.ensure_loaded(&tab, &mut loader).unwrap();

        assert!(cache.evict(tab.id, &mut loader));
        assert_eq!(loader.released, vec![handle]);
        assert!(!cache.contains(tab.id));
        assert!(!cache.evict(tab.id, &mut loader));
    }

    #[test]
    fn test_eviction_candidate_ranking() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        let (a, b, c) = (record(1), record(2), record(3));

        cache.ensure_loaded(&a, &mut loader).unwrap();
        cache.ensure_loaded(&b, &mut loader).unwrap();
        cache.ensure_loaded(&c, &mut loader).unwrap();
        cache.touch_activated(a.id, 1);
        cache.touch_activated(b.id, 2);
        cache.touch_activated(c.id, 3);

        // Oldest activation wins; the active tab is exempt.
        assert_eq!(cache.eviction_candidate(&[c.id]), Some(a.id));
        assert_eq!(cache.eviction_candidate(&[a.id]), Some(b.id));

        // Equal stamps break toward the lowest id.
        cache.touch_activated(b.id, 1);
        assert_eq!(cache.eviction_candidate(&[c.id]), Some(a.id));

        cache.virtualize(a.id, &mut loader);
        assert_eq!(cache.eviction_candidate(&[c.id]), Some(b.id));
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut cache = TabCache::new();
        let mut loader = FakeLoader::default();
        cache.ensure_loaded(&record(1), &mut loader).unwrap();
        cache.ensure_loaded(&record(2), &mut loader).unwrap();
        cache.virtualize(TabId::new(2), &mut loader);

        cache.clear(&mut loader);
        assert!(cache.is_empty());
        // One release from virtualize, one from clear.
        assert_eq!(loader.released.len(), 2);
    }
}
