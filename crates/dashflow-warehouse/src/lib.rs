//! Dashflow Warehouse - per-widget TTL cache
//!
//! Caches the integrated pipeline output of every widget under
//! `(component, source)` keys:
//! - TTL expiry, lazy on read and swept by an optional maintenance task
//! - Least-accessed eviction at the entry and memory ceilings
//! - Hit/miss counters with a moving response-time average
//!
//! The warehouse is a staleness guard in front of the polling scheduler,
//! so the default TTL is short.
//!
//! # Example
//!
//! ```rust,ignore
//! use dashflow_warehouse::{DataWarehouse, WarehouseConfig};
//! use dashflow_types::SourceType;
//! use serde_json::json;
//!
//! let warehouse = DataWarehouse::new(WarehouseConfig::default());
//! warehouse.store(&"widget".into(), &"sensor".into(), json!(25.6), SourceType::Static);
//! assert!(warehouse.get("widget").is_some());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod metrics;
pub mod warehouse;

pub use config::WarehouseConfig;
pub use metrics::{ComponentStats, PerformanceMetrics, StorageStats};
pub use warehouse::{CacheEntry, DataWarehouse};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for caching pipeline output
    pub use crate::{DataWarehouse, PerformanceMetrics, StorageStats, WarehouseConfig};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
