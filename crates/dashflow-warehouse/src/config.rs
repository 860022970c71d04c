//! Warehouse configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and timings for [`DataWarehouse`](crate::DataWarehouse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// TTL applied by [`store`](crate::DataWarehouse::store)
    pub default_ttl_ms: u64,
    /// Entry ceiling across all components
    pub max_entries: usize,
    /// Approximate memory ceiling in bytes
    pub max_memory_bytes: usize,
    /// Fraction of `max_memory_bytes` that triggers pressure eviction
    pub pressure_ratio: f64,
    /// Entries evicted per pressure pass
    pub pressure_evictions: usize,
    /// Period of the background sweep
    pub cleanup_interval_ms: u64,
    /// Number of response time samples kept for the moving average
    pub metrics_window: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 30_000,
            max_entries: 1000,
            max_memory_bytes: 50 * 1024 * 1024,
            pressure_ratio: 0.8,
            pressure_evictions: 10,
            cleanup_interval_ms: 60_000,
            metrics_window: 100,
        }
    }
}

impl WarehouseConfig {
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl_ms = duration_ms(ttl);
        self
    }

    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    #[must_use]
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_ms = duration_ms(interval);
        self
    }

    #[must_use]
    pub fn with_metrics_window(mut self, window: usize) -> Self {
        self.metrics_window = window.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    #[inline]
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }

    /// Byte count above which pressure eviction runs
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn pressure_threshold(&self) -> usize {
        (self.max_memory_bytes as f64 * self.pressure_ratio.clamp(0.0, 1.0)) as usize
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WarehouseConfig::default();
        assert_eq!(config.default_ttl(), Duration::from_secs(30));
        assert_eq!(config.max_entries, 1000);

        let halved = WarehouseConfig {
            pressure_ratio: 0.5,
            ..WarehouseConfig::default().with_max_memory(1000)
        };
        assert_eq!(halved.pressure_threshold(), 500);
    }

    #[test]
    fn partial_settings_fill_defaults() {
        let config: WarehouseConfig =
            serde_json::from_str(r#"{"default_ttl_ms": 500, "max_entries": 3}"#).unwrap();
        assert_eq!(config.default_ttl(), Duration::from_millis(500));
        assert_eq!(config.max_entries, 3);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(60));
    }
}
