//! Ordered tab collection
//!
//! Owns the user-visible tab order, the active-tab pointer, and the id
//! allocation policy. Invariants enforced here:
//! - every id in the sequence is unique
//! - the active id, when set, references a tab present in the sequence
//! - ids are strictly increasing and never reused in-process

use crate::tab::{TabId, TabRecord};

/// First id handed out by a fresh allocator
const FIRST_TAB_ID: u32 = 1;

/// Outcome of removing a tab, reported for cache eviction and UI notification
#[derive(Debug, Clone)]
pub struct RemovedInfo {
    /// The removed record
    pub record: TabRecord,
    /// Index the tab occupied before removal
    pub index: usize,
    /// Whether the removed tab was the active one
    pub was_active: bool,
    /// Active tab selected by the adjacency rule, when the removed tab was active
    pub new_active: Option<TabId>,
}

/// Ordered sequence of tabs plus the active-tab pointer
#[derive(Debug, Clone, Default)]
pub struct TabCollection {
    tabs: Vec<TabRecord>,
    active_id: Option<TabId>,
    next_tab_id: u32,
}

impl TabCollection {
    /// Create an empty collection with a fresh id allocator
    pub fn new() -> Self {
        Self {
            tabs: Vec::new(),
            active_id: None,
            next_tab_id: FIRST_TAB_ID,
        }
    }

    /// Restore a persisted collection
    ///
    /// Duplicate ids are dropped (first occurrence wins), a stale active id is
    /// cleared, and the allocator is advanced past every restored id so
    /// restored tabs can never collide with future allocations.
    pub fn restore(tabs: Vec<TabRecord>, active_id: Option<TabId>, next_tab_id: u32) -> Self {
        let mut unique: Vec<TabRecord> = Vec::with_capacity(tabs.len());
        for tab in tabs {
            if unique.iter().any(|t| t.id == tab.id) {
                tracing::warn!("Dropping duplicate persisted tab id {}", tab.id);
            } else {
                unique.push(tab);
            }
        }

        let max_id = unique.iter().map(|t| t.id.as_u32()).max().unwrap_or(0);
        let active_id = active_id.filter(|id| unique.iter().any(|t| t.id == *id));

        Self {
            tabs: unique,
            active_id,
            next_tab_id: next_tab_id.max(max_id + 1).max(FIRST_TAB_ID),
        }
    }

    /// Add a tab, allocating a fresh id
    ///
    /// Placement: the explicit index when given, otherwise immediately after
    /// the parent tab when `parent_id` is set and present, otherwise the end.
    /// A stale parent reference falls back to appending instead of failing; a
    /// tab is never lost to a dangling parent id.
    pub fn add(
        &mut self,
        url: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<TabId>,
        at: Option<usize>,
    ) -> TabId {
        let id = self.allocate_id();
        let record = TabRecord::new(id, url, title).with_parent(parent_id);

        let index = match at {
            Some(index) => index.min(self.tabs.len()),
            None => match parent_id.and_then(|parent| self.find(parent)) {
                Some(parent_index) => parent_index + 1,
                None => {
                    if let Some(parent) = parent_id {
                        tracing::warn!("Parent tab {} not found, appending tab {}", parent, id);
                    }
                    self.tabs.len()
                }
            },
        };

        self.tabs.insert(index, record);
        tracing::debug!("Added tab {} at index {} (total: {})", id, index, self.tabs.len());
        id
    }

    /// Remove a tab by id
    ///
    /// When the active tab is removed, the adjacency rule picks the successor
    /// in order, else the predecessor, else none.
    pub fn remove(&mut self, id: TabId) -> Option<RemovedInfo> {
        let index = self.find(id)?;
        let record = self.tabs.remove(index);
        let was_active = self.active_id == Some(id);

        let new_active = if was_active {
            self.active_id = if self.tabs.is_empty() {
                None
            } else if index < self.tabs.len() {
                Some(self.tabs[index].id)
            } else {
                Some(self.tabs[index - 1].id)
            };
            self.active_id
        } else {
            None
        };

        tracing::debug!("Removed tab {} (remaining: {})", id, self.tabs.len());
        Some(RemovedInfo {
            record,
            index,
            was_active,
            new_active,
        })
    }

    /// Remove every tab and clear the active pointer
    ///
    /// The id allocator is not reset; ids stay unique for the process lifetime.
    pub fn clear(&mut self) -> Vec<TabRecord> {
        self.active_id = None;
        std::mem::take(&mut self.tabs)
    }

    /// Make a tab the active one
    ///
    /// Returns false when the id is unknown or already active.
    pub fn activate(&mut self, id: TabId) -> bool {
        if self.active_id == Some(id) || self.find(id).is_none() {
            return false;
        }
        self.active_id = Some(id);
        tracing::debug!("Activated tab {}", id);
        true
    }

    /// Reorder a tab so it immediately follows its parent
    ///
    /// No-op when the tab has no parent, the parent is gone, or the tab is
    /// already in place.
    pub fn move_to_follow_parent(&mut self, id: TabId) {
        let Some(index) = self.find(id) else { return };
        let Some(parent_id) = self.tabs[index].parent_id else {
            return;
        };
        let Some(parent_index) = self.find(parent_id) else {
            return;
        };

        let target = if index > parent_index {
            parent_index + 1
        } else {
            parent_index
        };
        if target == index {
            return;
        }

        let record = self.tabs.remove(index);
        self.tabs.insert(target, record);
        tracing::debug!("Moved tab {} to follow parent {}", id, parent_id);
    }

    /// Find a tab's index by id
    pub fn find(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    /// Find the first tab (in order) with the given url
    pub fn find_by_url(&self, url: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.url == url)
    }

    /// Get a tab by id
    pub fn get(&self, id: TabId) -> Option<&TabRecord> {
        self.find(id).map(|index| &self.tabs[index])
    }

    /// Get a mutable tab by id
    pub fn get_mut(&mut self, id: TabId) -> Option<&mut TabRecord> {
        let index = self.find(id)?;
        Some(&mut self.tabs[index])
    }

    /// Get a tab by index
    pub fn get_at(&self, index: usize) -> Option<&TabRecord> {
        self.tabs.get(index)
    }

    /// Parent id of a tab, if it has one
    pub fn parent_of(&self, id: TabId) -> Option<TabId> {
        self.get(id).and_then(|tab| tab.parent_id)
    }

    /// Snapshot of the tabs sorted by a caller-supplied key
    ///
    /// Stable, serialization-only; the live order is never touched.
    pub fn export_sorted<K, F>(&self, key: F) -> Vec<TabRecord>
    where
        K: Ord,
        F: FnMut(&TabRecord) -> K,
    {
        let mut snapshot = self.tabs.clone();
        snapshot.sort_by_key(key);
        snapshot
    }

    /// Currently active tab id
    pub fn active_id(&self) -> Option<TabId> {
        self.active_id
    }

    /// Id of the most recently allocated tab (not necessarily active or alive)
    pub fn last_tab_id(&self) -> Option<TabId> {
        (self.next_tab_id > FIRST_TAB_ID).then(|| TabId::new(self.next_tab_id - 1))
    }

    /// Next id the allocator will hand out
    pub fn next_tab_id(&self) -> u32 {
        self.next_tab_id
    }

    /// Number of tabs
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Iterate over tabs in user-visible order
    pub fn iter(&self) -> impl Iterator<Item = &TabRecord> {
        self.tabs.iter()
    }

    fn allocate_id(&mut self) -> TabId {
        let id = TabId::new(self.next_tab_id);
        self.next_tab_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_strictly_increase() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        tabs.remove(a);
        let c = tabs.add("https://c.com", "C", None, None);

        assert!(a < b && b < c);
        assert_eq!(tabs.last_tab_id(), Some(c));
        assert_eq!(tabs.next_tab_id(), c.as_u32() + 1);
    }

    #[test]
    fn test_child_inserted_after_parent() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        let child = tabs.add("https://c.com", "C", Some(a), None);

        let order: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, child, b]);
    }

    #[test]
    fn test_stale_parent_falls_back_to_append() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let orphan = tabs.add("https://o.com", "O", Some(TabId::new(99)), None);

        let order: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, orphan]);
    }

    #[test]
    fn test_remove_active_prefers_successor() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        let c = tabs.add("https://c.com", "C", None, None);

        tabs.activate(b);
        let info = tabs.remove(b).unwrap();
        assert!(info.was_active);
        assert_eq!(info.new_active, Some(c));
        assert_eq!(tabs.active_id(), Some(c));

        tabs.remove(c);
        assert_eq!(tabs.active_id(), Some(a));

        tabs.remove(a);
        assert_eq!(tabs.active_id(), None);
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_remove_inactive_keeps_active() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        tabs.activate(b);

        let info = tabs.remove(a).unwrap();
        assert!(!info.was_active);
        assert_eq!(info.new_active, None);
        assert_eq!(tabs.active_id(), Some(b));
    }

    #[test]
    fn test_activate_unknown_or_current_is_noop() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);

        assert!(tabs.activate(a));
        assert!(!tabs.activate(a));
        assert!(!tabs.activate(TabId::new(42)));
        assert_eq!(tabs.active_id(), Some(a));
    }

    #[test]
    fn test_move_to_follow_parent() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        // Place the child at the end explicitly, then pull it back.
        let child = tabs.add("https://c.com", "C", Some(a), Some(2));

        let order: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, b, child]);

        tabs.move_to_follow_parent(child);
        let order: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, child, b]);

        // Already in place: stable.
        tabs.move_to_follow_parent(child);
        let order: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![a, child, b]);
    }

    #[test]
    fn test_export_sorted_leaves_live_order() {
        let mut tabs = TabCollection::new();
        let a = tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://b.com", "B", None, None);
        let child = tabs.add("https://c.com", "C", Some(a), None);

        let exported = tabs.export_sorted(|t| t.id);
        let exported_ids: Vec<TabId> = exported.iter().map(|t| t.id).collect();
        assert_eq!(exported_ids, vec![a, b, child]);

        let live: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
        assert_eq!(live, vec![a, child, b]);
    }

    #[test]
    fn test_restore_sanitizes_input() {
        let dup = TabRecord::new(TabId::new(3), "https://a.com", "A");
        let tabs = vec![
            TabRecord::new(TabId::new(3), "https://a.com", "A"),
            dup,
            TabRecord::new(TabId::new(5), "https://b.com", "B"),
        ];
        let restored = TabCollection::restore(tabs, Some(TabId::new(9)), 2);

        assert_eq!(restored.len(), 2);
        // Stale active id cleared, allocator advanced past the highest id.
        assert_eq!(restored.active_id(), None);
        assert_eq!(restored.next_tab_id(), 6);
    }

    #[test]
    fn test_find_by_url_first_match() {
        let mut tabs = TabCollection::new();
        tabs.add("https://a.com", "A", None, None);
        let b = tabs.add("https://dup.com", "First", None, None);
        tabs.add("https://dup.com", "Second", None, None);

        let index = tabs.find_by_url("https://dup.com").unwrap();
        assert_eq!(tabs.get_at(index).unwrap().id, b);
        assert_eq!(tabs.find_by_url("https://missing.com"), None);
    }
}
