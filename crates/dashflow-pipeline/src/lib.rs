//! Dashflow Pipeline - widget data execution
//!
//! Four composable stages turn a [`DataSourceConfig`](dashflow_types::DataSourceConfig)
//! into one payload per widget:
//! - [`fetcher`]: raw value per item (static, HTTP, socket, script)
//! - [`processor`]: filter path projection and type coercion
//! - [`merger`]: per-source folding (object, array, select, script)
//! - [`integrator`]: per-widget payload keyed by source id
//!
//! [`PipelineExecutor`] chains them; every stage except fetching is a pure
//! function and can be used on its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashflow_pipeline::{FetcherConfig, PipelineExecutor, SourceFetcher};
//! use std::sync::Arc;
//!
//! # async fn example(config: dashflow_types::DataSourceConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SourceFetcher::new(FetcherConfig::default())?;
//! let executor = PipelineExecutor::new(Arc::new(fetcher));
//! let result = executor.execute(&config).await;
//! println!("{}", result.payload.into_value());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chain;
pub mod error;
pub mod expr;
pub mod fetcher;
pub mod integrator;
pub mod merger;
pub mod path;
pub mod processor;
pub mod script;

pub use chain::{
    ExecutionResult, ExecutionTrace, ItemFailure, ItemTrace, PipelineCapabilities,
    PipelineExecutor, SourceTrace,
};
pub use error::{ExprError, FetchError, PathError, TransformError};
pub use expr::{Expression, Scope};
pub use fetcher::{DataFetcher, FetcherConfig, SourceFetcher};
pub use integrator::integrate;
pub use merger::{merge, ProcessedItem};
pub use path::JsonPath;
pub use processor::{apply_transform, process};
pub use script::{ExpressionEngine, ScriptEngine};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running pipelines
    pub use crate::{
        DataFetcher, ExecutionResult, FetcherConfig, JsonPath, PipelineExecutor, Scope,
        SourceFetcher,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
