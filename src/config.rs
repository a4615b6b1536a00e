//! Configuration for the tab model
//!
//! Defaults are embedded; an optional TOML file under the per-user config
//! directory can override them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_max_live_tabs() -> usize {
    5
}

/// Configuration for the tab model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabModelConfig {
    /// Maximum number of tabs holding a live page resource (0 = unlimited)
    #[serde(default = "default_max_live_tabs")]
    pub max_live_tabs: usize,

    /// Whether the tab order is persisted after structural mutations
    #[serde(default = "default_true")]
    pub persist_tab_order: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TabModelConfig {
    fn default() -> Self {
        Self {
            max_live_tabs: default_max_live_tabs(),
            persist_tab_order: true,
        }
    }
}

impl TabModelConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the live-tab budget (0 = unlimited)
    pub fn with_max_live_tabs(mut self, max_live_tabs: usize) -> Self {
        self.max_live_tabs = max_live_tabs;
        self
    }

    /// Enable or disable tab-order persistence
    pub fn with_persist_tab_order(mut self, enabled: bool) -> Self {
        self.persist_tab_order = enabled;
        self
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webtabs")
            .join("webtabs.toml")
    }

    /// Load configuration from the default location, falling back to defaults
    ///
    /// A missing file is not an error; a malformed one is logged and ignored.
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path, falling back to defaults
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Configuration loaded from {:?}", path);
                    config
                }
                Err(err) => {
                    tracing::warn!("Ignoring malformed config {:?}: {}", path, err);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
