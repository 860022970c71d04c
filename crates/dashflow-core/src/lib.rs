//! Dashflow Core - dashboard runtime
//!
//! The live half of the widget data pipeline:
//! - [`PollingScheduler`]: timer tasks behind a global switch
//! - [`InteractionEngine`]: watches payloads and configuration, runs
//!   navigate and cross-widget write actions
//! - [`DashboardRuntime`]: service container wiring the state manager,
//!   pipeline, warehouse, scheduler and interactions together
//! - [`RuntimeSettings`]: TOML settings for every service
//!
//! # Example
//!
//! ```rust,ignore
//! use dashflow_core::{DashboardRuntime, RuntimeSettings, WidgetDefinition};
//!
//! # async fn example(widget: WidgetDefinition) -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = DashboardRuntime::create(RuntimeSettings::default())?;
//! runtime.initialize()?;
//!
//! let component = widget.component_id().clone();
//! runtime.add_widget(widget)?;
//! let payload = runtime.execute(component.as_str()).await?;
//! println!("{}", payload.into_value());
//!
//! runtime.dispose();
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod interaction;
pub mod polling;
pub mod runtime;
pub mod settings;
pub mod telemetry;

pub use error::{PollingError, RuntimeError};
pub use interaction::{
    apply_property_write, evaluate_condition, ActionOutcome, InteractionEngine,
    InteractionSettings, InteractionStats, LoggingNavigator, NavigationSink, PropertyWrite,
};
pub use polling::{
    PollCallback, PollingScheduler, PollingSettings, PollingStatistics, PollingTaskInfo,
    PollingTaskSpec,
};
pub use runtime::{DashboardRuntime, RuntimeStats, WidgetDefinition};
pub use settings::RuntimeSettings;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running dashboards
    pub use crate::{
        DashboardRuntime, InteractionEngine, PollingScheduler, PollingTaskSpec, RuntimeError,
        RuntimeSettings, WidgetDefinition,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
