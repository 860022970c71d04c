//! Runtime settings
//!
//! One TOML document with a table per service. Every field has a default, so
//! an empty file (or no file) is a valid configuration:
//!
//! ```toml
//! [warehouse]
//! default_ttl_ms = 10000
//!
//! [state]
//! debounce_ms = 25
//! cycle_threshold = 5
//!
//! [polling]
//! min_interval_ms = 1000
//! ```

use crate::error::Result;
use crate::interaction::InteractionSettings;
use crate::polling::PollingSettings;
use dashflow_config::{GeneratorOptions, StateSettings};
use dashflow_pipeline::FetcherConfig;
use dashflow_warehouse::WarehouseConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for every service in a [`DashboardRuntime`](crate::DashboardRuntime)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub warehouse: WarehouseConfig,
    pub state: StateSettings,
    pub polling: PollingSettings,
    pub interaction: InteractionSettings,
    pub fetch: FetcherConfig,
    pub generator: GeneratorOptions,
}

impl RuntimeSettings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// [`RuntimeError::Settings`](crate::RuntimeError::Settings) on invalid TOML
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// I/O or parse errors
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    #[inline]
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: WarehouseConfig) -> Self {
        self.warehouse = warehouse;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: StateSettings) -> Self {
        self.state = state;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_polling(mut self, polling: PollingSettings) -> Self {
        self.polling = polling;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionSettings) -> Self {
        self.interaction = interaction;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fetch(mut self, fetch: FetcherConfig) -> Self {
        self.fetch = fetch;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_generator(mut self, generator: GeneratorOptions) -> Self {
        self.generator = generator;
        self
    }
}
