//! Hit/miss counters and storage statistics

use chrono::{DateTime, Utc};
use dashflow_types::ComponentId;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Snapshot of read performance since the last reset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `cache_hits / total_requests`, 0 when nothing was requested
    pub hit_rate: f64,
    /// Moving average over the configured sample window
    pub average_response_us: f64,
    /// Entries dropped because their TTL elapsed
    pub expired_evictions: u64,
    /// Entries dropped to respect entry or memory limits
    pub capacity_evictions: u64,
}

/// Live storage of one component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStats {
    pub source_count: usize,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live storage across the warehouse
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_components: usize,
    pub total_sources: usize,
    pub total_size_bytes: usize,
    pub component_stats: IndexMap<ComponentId, ComponentStats>,
}

#[derive(Debug)]
pub(crate) struct MetricsRecorder {
    hits: u64,
    misses: u64,
    expired: u64,
    evicted: u64,
    samples: VecDeque<Duration>,
    window: usize,
}

impl MetricsRecorder {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            hits: 0,
            misses: 0,
            expired: 0,
            evicted: 0,
            samples: VecDeque::with_capacity(window.max(1)),
            window: window.max(1),
        }
    }

    pub(crate) fn record_read(&mut self, hit: bool, elapsed: Duration) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    pub(crate) fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    pub(crate) fn record_evicted(&mut self, count: usize) {
        self.evicted += count as u64;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.window);
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot(&self) -> PerformanceMetrics {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        let average_response_us = if self.samples.is_empty() {
            0.0
        } else {
            let sum: f64 = self.samples.iter().map(|d| d.as_secs_f64() * 1e6).sum();
            sum / self.samples.len() as f64
        };
        PerformanceMetrics {
            total_requests: total,
            cache_hits: self.hits,
            cache_misses: self.misses,
            hit_rate,
            average_response_us,
            expired_evictions: self.expired,
            capacity_evictions: self.evicted,
        }
    }
}
