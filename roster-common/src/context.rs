//! Reconciliation context
//!
//! Created once at startup from configuration and passed by reference into
//! every reconciliation call. Nothing in the crate keeps module-level state.

use serde::{Deserialize, Serialize};

use crate::config::TomlConfig;
use crate::overrides::OVERRIDES_STORAGE_KEY;

/// Where base records come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Live feed first, snapshot as fallback
    #[default]
    Live,
    /// Snapshot only; the live feed is never consulted
    Demo,
}

/// Per-session settings for reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterContext {
    pub mode: SourceMode,
    /// Storage key of the persisted override blob
    pub overrides_key: String,
}

impl RosterContext {
    pub fn new(mode: SourceMode) -> Self {
        Self {
            mode,
            overrides_key: OVERRIDES_STORAGE_KEY.to_string(),
        }
    }

    pub fn from_config(config: &TomlConfig) -> Self {
        let mode = if config.demo_mode {
            SourceMode::Demo
        } else {
            SourceMode::Live
        };
        Self::new(mode)
    }

    pub fn is_demo(&self) -> bool {
        self.mode == SourceMode::Demo
    }
}

impl Default for RosterContext {
    fn default() -> Self {
        Self::new(SourceMode::Live)
    }
}
