//! Dashflow Types - shared data model
//!
//! Everything the pipeline, warehouse, configuration store and runtime pass
//! between each other:
//! - Data source configuration ([`DataSourceConfig`] and friends)
//! - Widget requirement declarations and user source inputs
//! - Interaction declarations and capabilities
//! - Canonical content hashing ([`ContentHash`])
//! - The integrated output [`Payload`]

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod hash;
pub mod ids;
pub mod interaction;
pub mod payload;
pub mod requirement;
pub mod source;
pub mod validation;

pub use hash::{canonicalize, ContentHash, HashError};
pub use ids::{ComponentId, SessionId, SourceId, TaskId};
pub use interaction::{
    Action, ComparisonOperator, Condition, EventKind, InteractionCapability, InteractionEvent,
    InteractionSection, NavigationTarget, PropertySpec, UpdateMode,
};
pub use payload::Payload;
pub use requirement::{
    DataRequirement, FieldRequirement, SourceRequirement, StructureType, UserSourceInput,
};
pub use source::{
    DataItem, DataSourceConfig, DataSourceDefinition, FetchSpec, HttpMethod, HttpSpec,
    MergeStrategy, ProcessingConfig, ScriptSpec, SocketSpec, SourceType, Transform, TriggerConfig,
};
pub use validation::ValidationReport;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Dashflow types
    pub use crate::{
        Action, ComponentId, ContentHash, DataItem, DataRequirement, DataSourceConfig,
        DataSourceDefinition, FetchSpec, InteractionEvent, MergeStrategy, Payload, SourceId,
        SourceType, TriggerConfig, UserSourceInput,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
