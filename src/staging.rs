//! New-tab staging
//!
//! Holds at most one pending "about-to-be-created tab" payload until it is
//! committed or discarded. Staging a new payload replaces the previous one;
//! per-field change flags are reported so downstream notification fan-out can
//! skip fields that did not change.

use crate::error::{Result, TabError};
use crate::tab::{TabId, ViewHandle};

/// Pending tab-creation payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTabData {
    /// URL the new tab should load
    pub url: String,
    /// Initial title
    pub title: String,
    /// View the UI was showing before the new tab was requested
    pub previous_view: Option<ViewHandle>,
    /// Tab the new one is opened from, if any
    pub parent_id: Option<TabId>,
}

/// Which staged fields differ from the previously staged payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedChanges {
    pub url_changed: bool,
    pub title_changed: bool,
    pub previous_view_changed: bool,
    /// Whether `has_pending` flipped from false to true
    pub pending_changed: bool,
}

/// Single-slot holder for staged new-tab data
#[derive(Debug, Clone, Default)]
pub struct NewTabStaging {
    pending: Option<NewTabData>,
}

impl NewTabStaging {
    /// Create an empty staging slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a payload, replacing any existing one
    pub fn stage(
        &mut self,
        url: impl Into<String>,
        title: impl Into<String>,
        previous_view: Option<ViewHandle>,
        parent_id: Option<TabId>,
    ) -> StagedChanges {
        let data = NewTabData {
            url: url.into(),
            title: title.into(),
            previous_view,
            parent_id,
        };

        let changes = match &self.pending {
            Some(previous) => StagedChanges {
                url_changed: previous.url != data.url,
                title_changed: previous.title != data.title,
                previous_view_changed: previous.previous_view != data.previous_view,
                pending_changed: false,
            },
            None => StagedChanges {
                url_changed: !data.url.is_empty(),
                title_changed: !data.title.is_empty(),
                previous_view_changed: data.previous_view.is_some(),
                pending_changed: true,
            },
        };

        tracing::debug!("Staged new tab data for url {:?}", data.url);
        self.pending = Some(data);
        changes
    }

    /// Consume the staged payload exactly once
    pub fn commit(&mut self) -> Result<NewTabData> {
        self.pending.take().ok_or(TabError::NoStagedTab)
    }

    /// Drop the staged payload without returning it
    ///
    /// Returns whether there was anything to discard.
    pub fn discard(&mut self) -> bool {
        let had_pending = self.pending.is_some();
        if had_pending {
            tracing::debug!("Discarded staged new tab data");
        }
        self.pending = None;
        had_pending
    }

    /// Whether a payload is staged
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Staged url, empty when nothing is staged
    pub fn url(&self) -> &str {
        self.pending.as_ref().map_or("", |data| data.url.as_str())
    }

    /// Staged title, empty when nothing is staged
    pub fn title(&self) -> &str {
        self.pending.as_ref().map_or("", |data| data.title.as_str())
    }

    /// Staged previous view, if any
    pub fn previous_view(&self) -> Option<ViewHandle> {
        self.pending.as_ref().and_then(|data| data.previous_view)
    }

    /// Staged parent id, if any
    pub fn parent_id(&self) -> Option<TabId> {
        self.pending.as_ref().and_then(|data| data.parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_then_commit() {
        let mut staging = NewTabStaging::new();
        let changes = staging.stage("https://a.com", "A", Some(ViewHandle(1)), None);
        assert!(changes.pending_changed);
        assert!(changes.url_changed);
        assert!(staging.has_pending());

        let data = staging.commit().unwrap();
        assert_eq!(data.url, "https://a.com");
        assert_eq!(data.previous_view, Some(ViewHandle(1)));
        assert!(!staging.has_pending());
    }

    #[test]
    fn test_commit_is_exactly_once() {
        let mut staging = NewTabStaging::new();
        staging.stage("https://a.com", "A", None, None);
        staging.commit().unwrap();
        assert!(matches!(staging.commit(), Err(TabError::NoStagedTab)));
    }

    #[test]
    fn test_restage_replaces_and_flags_changes() {
        let mut staging = NewTabStaging::new();
        staging.stage("https://a.com", "A", Some(ViewHandle(1)), None);

        let changes = staging.stage("https://b.com", "A", Some(ViewHandle(1)), None);
        assert!(changes.url_changed);
        assert!(!changes.title_changed);
        assert!(!changes.previous_view_changed);
        assert!(!changes.pending_changed);

        let data = staging.commit().unwrap();
        assert_eq!(data.url, "https://b.com");
        assert_eq!(data.title, "A");
    }

    #[test]
    fn test_discard() {
        let mut staging = NewTabStaging::new();
        assert!(!staging.discard());

        staging.stage("https://a.com", "A", None, Some(TabId::new(4)));
        assert_eq!(staging.parent_id(), Some(TabId::new(4)));
        assert!(staging.discard());
        assert!(matches!(staging.commit(), Err(TabError::NoStagedTab)));
    }

    #[test]
    fn test_accessors_when_empty() {
        let staging = NewTabStaging::new();
        assert_eq!(staging.url(), "");
        assert_eq!(staging.title(), "");
        assert_eq!(staging.previous_view(), None);
        assert_eq!(staging.parent_id(), None);
    }
}
