//! Dashflow Config - configuration generation and state
//!
//! - [`ConfigGenerator`]: requirement + user inputs -> runnable
//!   [`DataSourceConfig`](dashflow_types::DataSourceConfig)
//! - [`ConfigurationStateManager`]: versioned per-widget configuration with
//!   content-hash dedup, update-cycle suppression and debounced section
//!   notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use dashflow_config::{ConfigSection, ConfigurationStateManager, StateSettings, WriteOptions};
//! use serde_json::json;
//!
//! let manager = ConfigurationStateManager::new(StateSettings::default());
//! manager.initialize("gauge");
//! manager.update_section("gauge", ConfigSection::Component, json!({"title": "CPU"}), WriteOptions::user())?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod generator;
pub mod state;

pub use error::ConfigError;
pub use generator::{ConfigGenerator, GeneratorOptions, MappingPreview};
pub use state::{
    ConfigSection, ConfigVersion, ConfigurationStateManager, ConfigurationUpdateEvent,
    SectionPhase, StateSettings, VersionSnapshot, WidgetConfiguration, WriteOptions, WriteOutcome,
    Writer, validate_shape,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for configuring widgets
    pub use crate::{
        ConfigError, ConfigGenerator, ConfigSection, ConfigurationStateManager, WriteOptions,
        WriteOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
