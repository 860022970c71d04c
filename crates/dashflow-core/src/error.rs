//! Error types for the dashboard runtime
//!
//! Configuration errors from the generator and state manager pass through
//! unchanged; pipeline failures never surface here because the pipeline
//! degrades to default values instead of failing.

use dashflow_config::ConfigError;
use dashflow_pipeline::FetchError;
use dashflow_types::{ComponentId, TaskId};

/// Polling scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    /// No task with this id
    #[error("unknown polling task {0}")]
    UnknownTask(TaskId),
}

/// Runtime error type
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Generator or state manager rejected a request
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scheduler rejected a request
    #[error("polling error: {0}")]
    Polling(#[from] PollingError),

    /// Widget was never added or has been removed
    #[error("unknown component '{0}'")]
    UnknownComponent(ComponentId),

    /// Widget exists but has no data source configured
    #[error("component '{0}' has no data source configured")]
    NotConfigured(ComponentId),

    /// Fetch transport could not be built
    #[error("fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),

    /// Settings file is not valid TOML for [`RuntimeSettings`](crate::RuntimeSettings)
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// Widget definition file is not valid JSON
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime was disposed
    #[error("runtime has been disposed")]
    Disposed,
}

impl RuntimeError {
    /// True for errors caused by configuration input
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(err) => err.is_user_input(),
            Self::Settings(_) | Self::Json(_) | Self::NotConfigured(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
