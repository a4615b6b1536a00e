//! `WebTabs` Error Types
//!
//! Centralized error handling using thiserror for type-safe errors.

use crate::tab::TabId;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tab model operations
#[derive(Error, Debug)]
pub enum TabError {
    #[error("Parent tab {parent} not found for new tab")]
    InvalidParent { parent: TabId },

    #[error("Tab not found: {0}")]
    NotFound(TabId),

    #[error("No staged new-tab data to commit")]
    NoStagedTab,

    #[error("Tab model is still loading persisted state")]
    NotReady,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Persistence errors for the tab-order store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Tab order file is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("No persisted tab order found at {path}")]
    NotFound { path: PathBuf },
}

/// Page-resource materialization errors from the loader collaborator
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to materialize page for tab {tab}: {reason}")]
    MaterializeFailed { tab: TabId, reason: String },
}

/// Result type alias for tab model operations
pub type Result<T> = std::result::Result<T, TabError>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for resource operations
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
