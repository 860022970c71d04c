//! Configuration errors
//!
//! Raised synchronously to callers of the generator and the state manager;
//! nothing here is swallowed.

use crate::state::ConfigSection;
use dashflow_types::{ComponentId, SourceId};

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required source has no user input
    #[error("missing required data source '{source_id}' ({name})")]
    MissingRequiredSource { source_id: SourceId, name: String },

    /// Section value has the wrong shape; state was not touched
    #[error("invalid {section} section: {reason}")]
    InvalidSectionShape {
        section: ConfigSection,
        reason: String,
    },

    /// Write or read against a widget that was never initialized
    #[error("unknown component '{0}'")]
    UnknownComponent(ComponentId),

    /// No user inputs were supplied at all
    #[error("no data source inputs supplied for '{0}'")]
    EmptyInputs(ComponentId),

    /// Requirement has a blank component id
    #[error("requirement has no component id")]
    MissingComponentId,

    /// User input cannot be turned into a fetch spec
    #[error("invalid config for data source '{source_id}': {reason}")]
    InvalidSourceConfig { source_id: SourceId, reason: String },

    /// History holds no version with this sequence number
    #[error("component '{component}' has no version {sequence}")]
    UnknownVersion {
        component: ComponentId,
        sequence: u64,
    },

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    /// Errors caused by what the user supplied rather than by state
    #[inline]
    #[must_use]
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredSource { .. }
                | Self::InvalidSectionShape { .. }
                | Self::EmptyInputs(_)
                | Self::MissingComponentId
                | Self::InvalidSourceConfig { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
