//! Tab model orchestrator
//!
//! Drives the (collection, cache, staging) triple behind the operation set the
//! UI adapter and persistence layer consume:
//! - validates and applies commands (add, remove, activate, navigate)
//! - loads/evicts page resources as activation side effects
//! - enforces the live-tab budget by virtualizing stale tabs
//! - notifies the external sink synchronously after each committed mutation
//!
//! All operations run on one logical thread; collaborator callbacks re-enter
//! through plain method calls.

use crate::cache::{ResourceLoader, TabCache};
use crate::collection::TabCollection;
use crate::config::TabModelConfig;
use crate::error::{Result, StorageError, TabError};
use crate::staging::NewTabStaging;
use crate::store::{PersistedTabs, TabStore};
use crate::tab::{TabId, TabRecord, ViewHandle};

/// Change notification delivered to the UI adapter
///
/// Emitted synchronously after the mutation has been committed; the core does
/// no observer registration of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    CountChanged(usize),
    TabAdded(TabId),
    TabClosed(TabId),
    /// The active tab's context is being destroyed; detach before
    /// `ActiveTabChanged` arrives
    ActiveTabInvalidated,
    ActiveTabChanged(TabId),
    CurrentTabIdChanged(Option<TabId>),
    NextTabIdChanged(u32),
    LoadedChanged(bool),
    BrowsingChanged(bool),
    HasNewTabDataChanged(bool),
    NewTabUrlChanged,
    NewTabTitleChanged,
    NewTabPreviousViewChanged,
    /// A staged tab should begin loading
    TriggerLoad { url: String, title: String },
}

/// Receives tab model change notifications
pub trait NotificationSink {
    fn notify(&mut self, event: TabEvent);
}

/// Sink that drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&mut self, _event: TabEvent) {}
}

/// Load state of the model: Unloaded -> Loading -> Loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Initial state; tab list empty, only `initialize` is meaningful
    Unloaded,
    /// Persisted state restore in flight; mutations are rejected
    Loading,
    /// Steady state; the full operation set is valid
    Loaded,
}

/// Read-only row projection for list display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabRow {
    pub tab_id: TabId,
    pub url: String,
    pub title: String,
    pub thumbnail_path: Option<String>,
}

/// Authoritative in-memory state of the open tabs
pub struct TabModel {
    collection: TabCollection,
    cache: TabCache,
    staging: NewTabStaging,
    store: Box<dyn TabStore>,
    loader: Box<dyn ResourceLoader>,
    sink: Box<dyn NotificationSink>,
    config: TabModelConfig,
    phase: LoadPhase,
    browsing: bool,
    back_forward_navigation: bool,
    activation_clock: u64,
}

impl TabModel {
    /// First construction phase: wire up collaborators
    ///
    /// The model starts `Unloaded`; call [`TabModel::initialize`] to restore
    /// persisted state before issuing commands.
    pub fn new(
        config: TabModelConfig,
        store: Box<dyn TabStore>,
        loader: Box<dyn ResourceLoader>,
        sink: Box<dyn NotificationSink>,
    ) -> Self {
        Self {
            collection: TabCollection::new(),
            cache: TabCache::new(),
            staging: NewTabStaging::new(),
            store,
            loader,
            sink,
            config,
            phase: LoadPhase::Unloaded,
            browsing: false,
            back_forward_navigation: false,
            activation_clock: 0,
        }
    }

    /// Second construction phase: restore the persisted tab order
    ///
    /// A missing snapshot means a fresh profile and is not an error. Any other
    /// store failure leaves the model `Unloaded` with its pre-call state
    /// intact so the caller can retry.
    pub fn initialize(&mut self) -> Result<()> {
        match self.phase {
            LoadPhase::Loaded => return Ok(()),
            LoadPhase::Loading => return Err(TabError::NotReady),
            LoadPhase::Unloaded => {}
        }

        self.phase = LoadPhase::Loading;
        match self.store.load_tab_order() {
            Ok(persisted) => {
                self.collection = TabCollection::restore(
                    persisted.tabs,
                    persisted.active_id,
                    persisted.next_tab_id,
                );
                self.phase = LoadPhase::Loaded;
                tracing::info!("Restored {} tabs", self.collection.len());

                self.sink.notify(TabEvent::LoadedChanged(true));
                self.sink.notify(TabEvent::CountChanged(self.collection.len()));
                self.sink
                    .notify(TabEvent::NextTabIdChanged(self.collection.next_tab_id()));
                if let Some(active) = self.collection.active_id() {
                    self.sink.notify(TabEvent::CurrentTabIdChanged(Some(active)));
                    self.sink.notify(TabEvent::ActiveTabChanged(active));
                }
                Ok(())
            }
            Err(StorageError::NotFound { .. }) => {
                self.phase = LoadPhase::Loaded;
                tracing::info!("No persisted tabs, starting fresh");
                self.sink.notify(TabEvent::LoadedChanged(true));
                Ok(())
            }
            Err(err) => {
                self.phase = LoadPhase::Unloaded;
                tracing::warn!("Tab order restore failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Create a tab, activate it, and begin loading its page
    pub fn add_tab(&mut self, url: impl Into<String>, title: impl Into<String>) -> Result<TabId> {
        self.insert_tab(url.into(), title.into(), None)
    }

    /// Create a tab opened from a parent: staging plus immediate commit
    ///
    /// Used when no deferred UI step sits between the request and the tab.
    pub fn new_tab(
        &mut self,
        url: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<TabId>,
    ) -> Result<TabId> {
        self.ensure_ready()?;
        self.new_tab_data(url, title, None, parent_id)?;
        self.commit_new_tab()
    }

    /// Stage pending new-tab data, replacing any existing payload
    pub fn new_tab_data(
        &mut self,
        url: impl Into<String>,
        title: impl Into<String>,
        previous_view: Option<ViewHandle>,
        parent_id: Option<TabId>,
    ) -> Result<()> {
        self.ensure_ready()?;
        let changes = self.staging.stage(url, title, previous_view, parent_id);

        if changes.url_changed {
            self.sink.notify(TabEvent::NewTabUrlChanged);
        }
        if changes.title_changed {
            self.sink.notify(TabEvent::NewTabTitleChanged);
        }
        if changes.previous_view_changed {
            self.sink.notify(TabEvent::NewTabPreviousViewChanged);
        }
        if changes.pending_changed {
            self.sink.notify(TabEvent::HasNewTabDataChanged(true));
        }
        Ok(())
    }

    /// Discard any staged new-tab data
    pub fn reset_new_tab_data(&mut self) {
        if self.staging.discard() {
            self.sink.notify(TabEvent::NewTabUrlChanged);
            self.sink.notify(TabEvent::NewTabTitleChanged);
            self.sink.notify(TabEvent::NewTabPreviousViewChanged);
            self.sink.notify(TabEvent::HasNewTabDataChanged(false));
        }
    }

    /// Consume the staged payload and create its tab
    ///
    /// Fails with `NoStagedTab` when nothing is staged; the payload is
    /// consumed exactly once.
    pub fn commit_new_tab(&mut self) -> Result<TabId> {
        self.ensure_ready()?;
        let payload = self.staging.commit()?;
        self.sink.notify(TabEvent::TriggerLoad {
            url: payload.url.clone(),
            title: payload.title.clone(),
        });
        self.sink.notify(TabEvent::HasNewTabDataChanged(false));
        self.insert_tab(payload.url, payload.title, payload.parent_id)
    }

    /// Remove the tab at a list index
    pub fn remove(&mut self, index: usize) -> Result<bool> {
        self.ensure_ready()?;
        match self.collection.get_at(index).map(|tab| tab.id) {
            Some(id) => self.remove_tab_by_id(id),
            None => Ok(false),
        }
    }

    /// Remove a tab by id
    ///
    /// Evicts its cache entry and, when the active tab is removed, activates
    /// the adjacency-selected successor. `ActiveTabInvalidated` is emitted
    /// before `ActiveTabChanged` so the rendering surface can detach from the
    /// destroyed context first.
    pub fn remove_tab_by_id(&mut self, id: TabId) -> Result<bool> {
        self.ensure_ready()?;
        let Some(info) = self.collection.remove(id) else {
            return Ok(false);
        };

        self.cache.evict(id, self.loader.as_mut());
        self.sink.notify(TabEvent::TabClosed(id));
        self.sink.notify(TabEvent::CountChanged(self.collection.len()));

        if info.was_active {
            self.sink.notify(TabEvent::ActiveTabInvalidated);
            match info.new_active {
                Some(next) => {
                    // The removal is already committed; a failed page load for
                    // the successor leaves it virtualized rather than undoing
                    // the close.
                    if let Err(err) = self.apply_activation(next) {
                        tracing::warn!("Successor tab {} failed to load: {}", next, err);
                    }
                    self.sink.notify(TabEvent::CurrentTabIdChanged(Some(next)));
                    self.sink.notify(TabEvent::ActiveTabChanged(next));
                }
                None => {
                    self.sink.notify(TabEvent::CurrentTabIdChanged(None));
                }
            }
        }

        self.persist();
        Ok(true)
    }

    /// Remove the active tab; no-op when none is active
    pub fn close_active_tab(&mut self) -> Result<bool> {
        self.ensure_ready()?;
        match self.collection.active_id() {
            Some(id) => self.remove_tab_by_id(id),
            None => Ok(false),
        }
    }

    /// Remove every tab and release every cached resource
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_ready()?;
        let had_active = self.collection.active_id().is_some();
        self.cache.clear(self.loader.as_mut());
        let removed = self.collection.clear();

        for record in &removed {
            self.sink.notify(TabEvent::TabClosed(record.id));
        }
        self.sink.notify(TabEvent::CountChanged(0));
        if had_active {
            self.sink.notify(TabEvent::ActiveTabInvalidated);
            self.sink.notify(TabEvent::CurrentTabIdChanged(None));
        }

        self.persist();
        Ok(())
    }

    /// Activate the first tab matching a url
    pub fn activate_tab(&mut self, url: &str) -> Result<bool> {
        self.ensure_ready()?;
        match self
            .collection
            .find_by_url(url)
            .and_then(|index| self.collection.get_at(index))
            .map(|tab| tab.id)
        {
            Some(id) => self.activate_page(id, false),
            None => Ok(false),
        }
    }

    /// Activate the tab at a list index
    pub fn activate_tab_at(&mut self, index: usize) -> Result<bool> {
        self.ensure_ready()?;
        match self.collection.get_at(index).map(|tab| tab.id) {
            Some(id) => self.activate_page(id, false),
            None => Ok(false),
        }
    }

    /// Activate a tab by id
    ///
    /// Activating the already-active tab is a no-op unless `force` is set;
    /// `force` re-runs the activation side effects to recover an inconsistent
    /// rendering surface. Unknown ids degrade to `Ok(false)`.
    pub fn activate_page(&mut self, id: TabId, force: bool) -> Result<bool> {
        self.ensure_ready()?;
        if self.collection.find(id).is_none() {
            return Ok(false);
        }

        let already_active = self.collection.active_id() == Some(id);
        if already_active && !force {
            return Ok(false);
        }

        // Materialize before moving the pointer so a failed load leaves both
        // collection and cache in their pre-call state.
        self.apply_activation(id)?;
        let pointer_changed = self.collection.activate(id);
        self.manage_max_tab_count(0, None);

        if pointer_changed {
            self.sink.notify(TabEvent::CurrentTabIdChanged(Some(id)));
        }
        self.sink.notify(TabEvent::ActiveTabChanged(id));

        if pointer_changed {
            self.persist();
        }
        Ok(true)
    }

    /// Reclaim a tab's page resource without closing the tab
    ///
    /// `virtualize = true` keeps redisplay metadata for a later reload;
    /// `virtualize = false` drops the cache entry entirely.
    pub fn release_tab(&mut self, id: TabId, virtualize: bool) -> Result<bool> {
        self.ensure_ready()?;
        if self.collection.find(id).is_none() {
            return Ok(false);
        }

        if virtualize {
            self.cache.virtualize(id, self.loader.as_mut());
        } else {
            self.cache.evict(id, self.loader.as_mut());
        }
        Ok(true)
    }

    /// Update a tab's url after navigation
    ///
    /// A child tab navigating outside back/forward history is reordered to
    /// follow its parent. Unknown ids are stale-callback no-ops.
    pub fn update_url(&mut self, id: TabId, url: impl Into<String>) -> Result<bool> {
        self.ensure_ready()?;
        let url = url.into();
        let Some(record) = self.collection.get_mut(id) else {
            return Ok(false);
        };

        record.set_url(url);
        let record = record.clone();
        self.cache.update_meta(&record);

        if record.parent_id.is_some() && !self.back_forward_navigation {
            self.collection.move_to_follow_parent(id);
        }

        self.persist();
        Ok(true)
    }

    /// Update a tab's title; unknown ids are stale-callback no-ops
    pub fn update_title(&mut self, id: TabId, title: impl Into<String>) -> Result<bool> {
        self.ensure_ready()?;
        let Some(record) = self.collection.get_mut(id) else {
            return Ok(false);
        };

        record.set_title(title);
        let record = record.clone();
        self.cache.update_meta(&record);
        self.persist();
        Ok(true)
    }

    /// Record a captured thumbnail for a tab
    ///
    /// The url must still match the record; a mismatch means the thumbnail
    /// raced a navigation or close and is dropped.
    pub fn update_thumb_path(&mut self, url: &str, path: impl Into<String>, id: TabId) -> Result<bool> {
        self.ensure_ready()?;
        let Some(record) = self.collection.get_mut(id) else {
            return Ok(false);
        };
        if record.url != url {
            tracing::debug!("Dropping stale thumbnail for tab {}", id);
            return Ok(false);
        }

        record.set_thumbnail_path(Some(path.into()));
        let record = record.clone();
        self.cache.update_meta(&record);
        self.persist();
        Ok(true)
    }

    /// Id of the most recently added tab (not necessarily active)
    pub fn last_tab_id(&self) -> Option<TabId> {
        self.collection.last_tab_id()
    }

    /// Number of open tabs
    pub fn count(&self) -> usize {
        self.collection.len()
    }

    /// Currently active tab id
    pub fn current_tab_id(&self) -> Option<TabId> {
        self.collection.active_id()
    }

    /// Next id the allocator will hand out
    pub fn next_tab_id(&self) -> u32 {
        self.collection.next_tab_id()
    }

    /// Parent of a tab, if known
    pub fn parent_tab_id(&self, id: TabId) -> Option<TabId> {
        self.collection.parent_of(id)
    }

    /// Whether persisted state has been restored
    pub fn loaded(&self) -> bool {
        self.phase == LoadPhase::Loaded
    }

    /// Current load phase
    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    /// UI browsing-mode flag, stored and exposed but opaque to the core
    pub fn browsing(&self) -> bool {
        self.browsing
    }

    /// Set the browsing-mode flag
    pub fn set_browsing(&mut self, browsing: bool) {
        if self.browsing != browsing {
            self.browsing = browsing;
            self.sink.notify(TabEvent::BrowsingChanged(browsing));
        }
    }

    /// Whether the current navigation is back/forward history traversal
    pub fn back_forward_navigation(&self) -> bool {
        self.back_forward_navigation
    }

    /// Mark or clear back/forward history traversal
    pub fn set_back_forward_navigation(&mut self, value: bool) {
        self.back_forward_navigation = value;
    }

    /// Whether new-tab data is staged
    pub fn has_new_tab_data(&self) -> bool {
        self.staging.has_pending()
    }

    /// Staged new-tab url, empty when nothing is staged
    pub fn new_tab_url(&self) -> &str {
        self.staging.url()
    }

    /// Staged new-tab title, empty when nothing is staged
    pub fn new_tab_title(&self) -> &str {
        self.staging.title()
    }

    /// Staged previous view, if any
    pub fn new_tab_previous_view(&self) -> Option<ViewHandle> {
        self.staging.previous_view()
    }

    /// Staged parent id, if any
    pub fn new_tab_parent_id(&self) -> Option<TabId> {
        self.staging.parent_id()
    }

    /// Number of rows for list display
    pub fn row_count(&self) -> usize {
        self.collection.len()
    }

    /// Display fields for one row
    pub fn row(&self, index: usize) -> Option<TabRow> {
        self.collection.get_at(index).map(|tab| TabRow {
            tab_id: tab.id,
            url: tab.url.clone(),
            title: tab.title.clone(),
            thumbnail_path: tab.thumbnail_path.clone(),
        })
    }

    /// Whether a tab currently holds a live page resource
    pub fn is_tab_live(&self, id: TabId) -> bool {
        self.cache.is_live(id)
    }

    /// Log the tab list in id order; diagnostic only, no state effect
    pub fn dump_tabs(&self) {
        for tab in self.collection.export_sorted(|t| t.id) {
            tracing::debug!(
                "tab {} url={:?} title={:?} parent={:?} live={}",
                tab.id,
                tab.url,
                tab.title,
                tab.parent_id,
                self.cache.is_live(tab.id),
            );
        }
    }

    /// Direct read access for invariant checks in tests
    pub fn collection(&self) -> &TabCollection {
        &self.collection
    }

    /// Direct read access for invariant checks in tests
    pub fn cache(&self) -> &TabCache {
        &self.cache
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.phase {
            LoadPhase::Loaded => Ok(()),
            _ => Err(TabError::NotReady),
        }
    }

    fn insert_tab(&mut self, url: String, title: String, parent_id: Option<TabId>) -> Result<TabId> {
        self.ensure_ready()?;
        let id = self.collection.add(url, title, parent_id, None);

        self.sink.notify(TabEvent::TabAdded(id));
        self.sink.notify(TabEvent::CountChanged(self.collection.len()));
        self.sink
            .notify(TabEvent::NextTabIdChanged(self.collection.next_tab_id()));

        let pointer_changed = self.collection.activate(id);
        // The record exists before its content loads; a failed materialization
        // leaves the new tab virtualized and recoverable via
        // `activate_page(id, true)`.
        if let Err(err) = self.apply_activation(id) {
            tracing::warn!("Page load for new tab {} failed: {}", id, err);
        }
        if pointer_changed {
            self.sink.notify(TabEvent::CurrentTabIdChanged(Some(id)));
        }
        self.sink.notify(TabEvent::ActiveTabChanged(id));

        self.persist();
        Ok(id)
    }

    /// Activation side effects: budget enforcement, then materialization
    ///
    /// The cache stays untouched when materialization fails; the caller can
    /// retry with `activate_page(id, true)`.
    fn apply_activation(&mut self, id: TabId) -> Result<()> {
        self.activation_clock += 1;
        let stamp = self.activation_clock;

        self.manage_max_tab_count(1, Some(id));

        let record = self
            .collection
            .get(id)
            .cloned()
            .ok_or(TabError::NotFound(id))?;
        self.cache.ensure_loaded(&record, self.loader.as_mut())?;
        self.cache.touch_activated(id, stamp);
        Ok(())
    }

    /// Virtualize least-recently-activated tabs until the live count plus the
    /// expected incoming loads fits the budget; the active tab (and the tab
    /// being activated) is never chosen
    fn manage_max_tab_count(&mut self, incoming: usize, keep: Option<TabId>) {
        let budget = self.config.max_live_tabs;
        if budget == 0 {
            return;
        }

        let mut exempt: Vec<TabId> = Vec::with_capacity(2);
        if let Some(active) = self.collection.active_id() {
            exempt.push(active);
        }
        if let Some(keep) = keep {
            if !exempt.contains(&keep) {
                exempt.push(keep);
            }
        }

        while self.cache.live_count() + incoming > budget {
            let Some(victim) = self.cache.eviction_candidate(&exempt) else {
                break;
            };
            tracing::debug!("Live-tab budget {} exceeded, virtualizing tab {}", budget, victim);
            self.cache.virtualize(victim, self.loader.as_mut());
        }
    }

    /// Persist the live tab order; the in-memory state stays authoritative,
    /// so a failed save is logged rather than rolled back
    fn persist(&mut self) {
        if !self.config.persist_tab_order {
            return;
        }

        let snapshot = PersistedTabs::new(
            self.collection.iter().cloned().collect(),
            self.collection.active_id(),
            self.collection.next_tab_id(),
        );
        if let Err(err) = self.store.save_tab_order(&snapshot) {
            tracing::warn!("Failed to save tab order: {}", err);
        }
    }
}
