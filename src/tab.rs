//! Tab value types
//!
//! `TabId` identity, the `TabRecord` value type describing one open tab, and
//! the opaque `ViewHandle` token for caller-owned UI views.

use serde::{Deserialize, Serialize};

/// Unique identifier for tabs
///
/// Allocated by `TabCollection` as a strictly increasing integer starting at
/// 1; never reused within a process lifetime. Absence of a tab or parent is
/// expressed as `Option<TabId>`, not a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(u32);

impl TabId {
    /// Wrap a raw id value
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the underlying integer
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a caller-owned UI view
///
/// Stored and forwarded by the core, never dereferenced; the caller is
/// responsible for the lifetime of whatever it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewHandle(pub u64);

/// A single browser tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRecord {
    /// Unique identifier for this tab (immutable once assigned)
    pub id: TabId,
    /// Current URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Path to the rendered thumbnail, if one has been captured
    pub thumbnail_path: Option<String>,
    /// Tab this one was opened from, if any
    pub parent_id: Option<TabId>,
}

impl TabRecord {
    /// Create a new tab record
    pub fn new(id: TabId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            thumbnail_path: None,
            parent_id: None,
        }
    }

    /// Set the parent tab id
    pub fn with_parent(mut self, parent_id: Option<TabId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    /// Update the URL in place
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Update the title in place
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Update the thumbnail path in place
    pub fn set_thumbnail_path(&mut self, path: Option<String>) {
        self.thumbnail_path = path;
    }
}
