//! WebTabs Library
//!
//! Authoritative in-memory state of a browser's open tabs:
//! - ordered tab collection with unique monotonic ids and an active-tab pointer
//! - bounded cache of heavyweight live page resources with virtualize/evict
//! - single-slot staging for pending "about-to-be-created" tabs
//! - orchestrating model that drives persistence, eviction, and notifications
//!
//! Rendering, thumbnail capture, and UI display are external collaborators
//! reached through the [`cache::ResourceLoader`], [`store::TabStore`], and
//! [`model::NotificationSink`] traits.

pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod staging;
pub mod store;
pub mod tab;

pub use cache::{LiveHandle, ResourceLoader, TabCache};
pub use collection::{RemovedInfo, TabCollection};
pub use config::TabModelConfig;
pub use error::{ResourceError, Result, StorageError, TabError};
pub use model::{LoadPhase, NotificationSink, NullSink, TabEvent, TabModel, TabRow};
pub use staging::{NewTabData, NewTabStaging, StagedChanges};
pub use store::{JsonTabStore, MemoryTabStore, PersistedTabs, TabStore};
pub use tab::{TabId, TabRecord, ViewHandle};
