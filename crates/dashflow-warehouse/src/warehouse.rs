//! Per-widget TTL cache
//!
//! Entries live under the compound key `(component, source)`. Expired entries
//! are never returned: reads evict them lazily and the optional maintenance
//! task sweeps whatever nobody reads.

use crate::config::WarehouseConfig;
use crate::metrics::{ComponentStats, MetricsRecorder, PerformanceMetrics, StorageStats};
use chrono::{DateTime, Utc};
use dashflow_types::{ComponentId, Payload, SourceId, SourceType};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One cached source value
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Value,
    pub source_type: SourceType,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
    pub last_access: Instant,
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Live iff `now - stored_at < ttl`
    #[inline]
    #[must_use]
    pub fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    /// Time left before expiry
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.ttl
            .saturating_sub(now.saturating_duration_since(self.stored_at))
    }
}

#[derive(Debug)]
struct ComponentStorage {
    entries: IndexMap<SourceId, CacheEntry>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ComponentStorage {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            entries: IndexMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Drop expired entries, returning how many were dropped
    fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

struct Candidate {
    component: ComponentId,
    source: SourceId,
    access_count: u64,
    last_access: Instant,
}

/// Keyed cache of per-widget, per-source payloads
///
/// Thread-safe; share it behind an [`Arc`]. Storing never fails: when a
/// limit would be exceeded the least-accessed entries make room.
#[derive(Debug)]
pub struct DataWarehouse {
    config: RwLock<WarehouseConfig>,
    components: DashMap<ComponentId, ComponentStorage>,
    metrics: Mutex<MetricsRecorder>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl Default for DataWarehouse {
    fn default() -> Self {
        Self::new(WarehouseConfig::default())
    }
}

impl DataWarehouse {
    #[must_use]
    pub fn new(config: WarehouseConfig) -> Self {
        let metrics = MetricsRecorder::new(config.metrics_window);
        Self {
            config: RwLock::new(config),
            components: DashMap::new(),
            metrics: Mutex::new(metrics),
            maintenance: Mutex::new(None),
        }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> WarehouseConfig {
        self.config.read().clone()
    }

    /// Change the TTL used by later [`store`](Self::store) calls
    pub fn set_default_ttl(&self, ttl: Duration) {
        let mut config = self.config.write();
        *config = config.clone().with_default_ttl(ttl);
    }

    /// Store `data` under `(component, source)` with the default TTL
    pub fn store(
        &self,
        component: &ComponentId,
        source: &SourceId,
        data: Value,
        source_type: SourceType,
    ) {
        let ttl = self.config.read().default_ttl();
        self.store_with_ttl(component, source, data, source_type, ttl);
    }

    /// Store with an explicit TTL, overwriting any previous entry for the key
    pub fn store_with_ttl(
        &self,
        component: &ComponentId,
        source: &SourceId,
        data: Value,
        source_type: SourceType,
        ttl: Duration,
    ) {
        let size_bytes = serde_json::to_vec(&data).map_or(0, |bytes| bytes.len());
        let exists = self
            .components
            .get(component.as_str())
            .is_some_and(|storage| storage.entries.contains_key(source.as_str()));
        if !exists {
            self.make_room((component, source));
        }

        let now = Instant::now();
        {
            let mut storage = self
                .components
                .entry(component.clone())
                .or_insert_with(ComponentStorage::new);
            let access_count = storage
                .entries
                .get(source.as_str())
                .map_or(0, |previous| previous.access_count);
            storage.entries.insert(
                source.clone(),
                CacheEntry {
                    data,
                    source_type,
                    stored_at: now,
                    ttl,
                    access_count,
                    last_access: now,
                    size_bytes,
                },
            );
            storage.updated_at = Utc::now();
        }

        debug!(
            component_id = %component,
            source_id = %source,
            size_bytes,
            ttl_ms = ttl.as_millis(),
            "Stored cache entry"
        );
        self.relieve_pressure(Some((component, source)));
    }

    /// All live entries of `component` as `{ source: data }`, or `None`
    pub fn get(&self, component: &str) -> Option<Payload> {
        let started = std::time::Instant::now();
        let now = Instant::now();
        let mut expired = 0;

        let payload = self.components.get_mut(component).and_then(|mut storage| {
            expired = storage.expire(now);
            if storage.entries.is_empty() {
                return None;
            }
            let mut payload = Payload::new();
            for (source, entry) in &mut storage.entries {
                entry.access_count += 1;
                entry.last_access = now;
                payload.insert(source, entry.data.clone());
            }
            Some(payload)
        });
        self.components
            .remove_if(component, |_, storage| storage.entries.is_empty());

        self.record_read(payload.is_some(), expired, started.elapsed());
        payload
    }

    /// Live value of one source
    pub fn get_source(&self, component: &str, source: &str) -> Option<Value> {
        let started = std::time::Instant::now();
        let now = Instant::now();
        let mut expired = 0;

        let value = self.components.get_mut(component).and_then(|mut storage| {
            let live = storage.entries.get(source).map(|entry| entry.is_live(now))?;
            if !live {
                storage.entries.shift_remove(source);
                expired = 1;
                return None;
            }
            let entry = storage.entries.get_mut(source)?;
            entry.access_count += 1;
            entry.last_access = now;
            Some(entry.data.clone())
        });
        self.components
            .remove_if(component, |_, storage| storage.entries.is_empty());

        self.record_read(value.is_some(), expired, started.elapsed());
        value
    }

    /// Remaining TTL of one live entry
    #[must_use]
    pub fn time_to_live(&self, component: &str, source: &str) -> Option<Duration> {
        let now = Instant::now();
        let storage = self.components.get(component)?;
        let entry = storage.entries.get(source)?;
        entry.is_live(now).then(|| entry.remaining(now))
    }

    /// Drop every entry of `component`; true if anything was stored
    pub fn clear(&self, component: &str) -> bool {
        let removed = self.components.remove(component).is_some();
        if removed {
            debug!(component_id = %component, "Cleared component cache");
        }
        removed
    }

    /// Drop one source of `component`
    pub fn clear_source(&self, component: &str, source: &str) -> bool {
        let removed = self
            .components
            .get_mut(component)
            .is_some_and(|mut storage| storage.entries.shift_remove(source).is_some());
        self.components
            .remove_if(component, |_, storage| storage.entries.is_empty());
        removed
    }

    /// Drop everything
    pub fn clear_all(&self) {
        let count = self.components.len();
        self.components.clear();
        info!(components = count, "Cleared warehouse");
    }

    /// Remove expired entries everywhere, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut swept = 0;
        self.components.retain(|_, storage| {
            swept += storage.expire(now);
            !storage.entries.is_empty()
        });
        if swept > 0 {
            self.metrics.lock().record_expired(swept);
            debug!(swept, "Swept expired cache entries");
        }
        swept
    }

    /// Number of stored entries, live or not yet swept
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.components
            .iter()
            .map(|storage| storage.entries.len())
            .sum()
    }

    #[must_use]
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.lock().snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.lock().reset();
    }

    /// Live entries per component
    #[must_use]
    pub fn storage_stats(&self) -> StorageStats {
        let now = Instant::now();
        let mut stats = StorageStats::default();
        for storage in self.components.iter() {
            let live: Vec<&CacheEntry> = storage
                .entries
                .values()
                .filter(|entry| entry.is_live(now))
                .collect();
            if live.is_empty() {
                continue;
            }
            let size_bytes = live.iter().map(|entry| entry.size_bytes).sum();
            stats.total_components += 1;
            stats.total_sources += live.len();
            stats.total_size_bytes += size_bytes;
            stats.component_stats.insert(
                storage.key().clone(),
                ComponentStats {
                    source_count: live.len(),
                    size_bytes,
                    created_at: storage.created_at,
                    updated_at: storage.updated_at,
                },
            );
        }
        stats
            .component_stats
            .sort_by(|a, _, b, _| a.cmp(b));
        stats
    }

    /// Start the periodic sweep; false if one is already running
    ///
    /// Must be called within a Tokio runtime. The task holds a weak
    /// reference and ends once the warehouse is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>) -> bool {
        let mut slot = self.maintenance.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let period = self.config.read().cleanup_interval();
        let warehouse = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(warehouse) = warehouse.upgrade() else {
                    break;
                };
                warehouse.sweep_expired();
                warehouse.relieve_pressure(None);
            }
        }));
        info!(interval_ms = period.as_millis(), "Warehouse maintenance started");
        true
    }

    pub fn stop_maintenance(&self) {
        if let Some(handle) = self.maintenance.lock().take() {
            handle.abort();
            debug!("Warehouse maintenance stopped");
        }
    }

    /// Stop maintenance and drop all entries and counters
    pub fn dispose(&self) {
        self.stop_maintenance();
        self.clear_all();
        self.reset_metrics();
    }

    fn record_read(&self, hit: bool, expired: usize, elapsed: Duration) {
        let mut metrics = self.metrics.lock();
        metrics.record_read(hit, elapsed);
        if expired > 0 {
            metrics.record_expired(expired);
        }
    }

    fn make_room(&self, keep: (&ComponentId, &SourceId)) {
        let max_entries = self.config.read().max_entries;
        if max_entries == 0 || self.entry_count() < max_entries {
            return;
        }
        self.sweep_expired();
        let excess = (self.entry_count() + 1).saturating_sub(max_entries);
        if excess > 0 {
            let evicted = self.evict_least_accessed(excess, Some(keep), None);
            debug!(evicted, max_entries, "Evicted entries at capacity");
        }
    }

    fn relieve_pressure(&self, keep: Option<(&ComponentId, &SourceId)>) {
        let (threshold, budget) = {
            let config = self.config.read();
            (config.pressure_threshold(), config.pressure_evictions)
        };
        let total = self.total_size();
        if total <= threshold {
            return;
        }
        let evicted = self.evict_least_accessed(budget, keep, Some(total - threshold));
        warn!(
            total_bytes = total,
            threshold_bytes = threshold,
            evicted,
            "Warehouse memory pressure"
        );
    }

    fn total_size(&self) -> usize {
        self.components
            .iter()
            .map(|storage| {
                storage
                    .entries
                    .values()
                    .map(|entry| entry.size_bytes)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Evict up to `limit` entries, least accessed first; with `bytes`
    /// set, stop as soon as that many bytes were released
    fn evict_least_accessed(
        &self,
        limit: usize,
        keep: Option<(&ComponentId, &SourceId)>,
        bytes: Option<usize>,
    ) -> usize {
        let mut candidates: Vec<Candidate> = Vec::new();
        for storage in self.components.iter() {
            for (source, entry) in &storage.entries {
                if keep.is_some_and(|(c, s)| c == storage.key() && s == source) {
                    continue;
                }
                candidates.push(Candidate {
                    component: storage.key().clone(),
                    source: source.clone(),
                    access_count: entry.access_count,
                    last_access: entry.last_access,
                });
            }
        }
        candidates.sort_by_key(|c| (c.access_count, c.last_access));

        let mut evicted = 0;
        let mut released = 0;
        for candidate in candidates.into_iter().take(limit) {
            if bytes.is_some_and(|target| released >= target) {
                break;
            }
            let removed = self
                .components
                .get_mut(candidate.component.as_str())
                .and_then(|mut storage| storage.entries.shift_remove(candidate.source.as_str()));
            if let Some(entry) = removed {
                evicted += 1;
                released += entry.size_bytes;
                debug!(
                    component_id = %candidate.component,
                    source_id = %candidate.source,
                    "Evicted cache entry"
                );
            }
            self.components
                .remove_if(candidate.component.as_str(), |_, storage| storage.entries.is_empty());
        }
        if evicted > 0 {
            self.metrics.lock().record_evicted(evicted);
        }
        evicted
    }
}

impl Drop for DataWarehouse {
    fn drop(&mut self) {
        if let Some(handle) = self.maintenance.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn ids(component: &str, source: &str) -> (ComponentId, SourceId) {
        (ComponentId::from(component), SourceId::from(source))
    }

    #[tokio::test(start_paused = true)]
    async fn store_and_get() {
        let warehouse = DataWarehouse::default();
        let (widget, sensor) = ids("widget", "sensor");
        warehouse.store(&widget, &sensor, json!({"temperature": 25.6}), SourceType::Static);

        let payload = warehouse.get("widget").unwrap();
        assert_eq!(payload.into_value(), json!({"sensor": {"temperature": 25.6}}));
        assert!(warehouse.get("other").is_none());

        let metrics = warehouse.performance_metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert!((metrics.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let warehouse = DataWarehouse::default();
        let (widget, sensor) = ids("widget", "sensor");
        warehouse.store_with_ttl(&widget, &sensor, json!(1), SourceType::Static, Duration::from_secs(1));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(warehouse.get_source("widget", "sensor"), Some(json!(1)));
        assert_eq!(
            warehouse.time_to_live("widget", "sensor"),
            Some(Duration::from_millis(1))
        );

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(warehouse.get("widget").is_none());
        assert_eq!(warehouse.entry_count(), 0);
        assert_eq!(warehouse.performance_metrics().expired_evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_sources_are_dropped_individually() {
        let warehouse = DataWarehouse::default();
        let widget = ComponentId::from("widget");
        warehouse.store_with_ttl(&widget, &"fast".into(), json!(1), SourceType::Http, Duration::from_secs(1));
        warehouse.store_with_ttl(&widget, &"slow".into(), json!(2), SourceType::Http, Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(warehouse.get("widget").unwrap().into_value(), json!({"slow": 2}));
    }

    #[tokio::test(start_paused = true)]
    async fn set_default_ttl_applies_to_later_stores() {
        let warehouse = DataWarehouse::default();
        warehouse.set_default_ttl(Duration::from_millis(100));
        let (widget, sensor) = ids("widget", "sensor");
        warehouse.store(&widget, &sensor, json!(1), SourceType::Static);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(warehouse.get("widget").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_removes_from_stats() {
        let warehouse = DataWarehouse::default();
        let (a, x) = ids("a", "x");
        let b = ComponentId::from("b");
        warehouse.store(&a, &x, json!(1), SourceType::Static);
        warehouse.store(&b, &x, json!(2), SourceType::Static);
        assert_eq!(warehouse.storage_stats().total_components, 2);

        assert!(warehouse.clear("a"));
        assert!(!warehouse.clear("a"));
        assert!(warehouse.get("a").is_none());

        let stats = warehouse.storage_stats();
        assert_eq!(stats.total_components, 1);
        assert_eq!(stats.total_sources, 1);
        assert!(!stats.component_stats.contains_key("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_source_keeps_siblings() {
        let warehouse = DataWarehouse::default();
        let widget = ComponentId::from("widget");
        warehouse.store(&widget, &"x".into(), json!(1), SourceType::Static);
        warehouse.store(&widget, &"y".into(), json!(2), SourceType::Static);

        assert!(warehouse.clear_source("widget", "x"));
        assert_eq!(warehouse.get("widget").unwrap().into_value(), json!({"y": 2}));
        assert!(warehouse.clear_source("widget", "y"));
        assert_eq!(warehouse.storage_stats().total_components, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_least_accessed() {
        let warehouse = DataWarehouse::new(WarehouseConfig::default().with_max_entries(2));
        let widget = ComponentId::from("widget");
        warehouse.store(&widget, &"a".into(), json!(1), SourceType::Static);
        warehouse.store(&widget, &"b".into(), json!(2), SourceType::Static);
        warehouse.get_source("widget", "a");

        warehouse.store(&widget, &"c".into(), json!(3), SourceType::Static);
        assert_eq!(warehouse.entry_count(), 2);
        assert_eq!(warehouse.get("widget").unwrap().into_value(), json!({"a": 1, "c": 3}));
        assert_eq!(warehouse.performance_metrics().capacity_evictions, 1);

        // overwrite does not evict
        warehouse.store(&widget, &"c".into(), json!(4), SourceType::Static);
        assert_eq!(warehouse.entry_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_pressure_keeps_newest_entry() {
        let config = WarehouseConfig {
            pressure_ratio: 0.8,
            ..WarehouseConfig::default().with_max_memory(100)
        };
        let warehouse = DataWarehouse::new(config);
        let widget = ComponentId::from("widget");
        let blob = json!("x".repeat(30));
        for source in ["a", "b", "c"] {
            warehouse.store(&widget, &source.into(), blob.clone(), SourceType::Static);
        }

        let payload = warehouse.get("widget").unwrap();
        assert!(payload.get("a").is_none());
        assert!(payload.get("b").is_some());
        assert!(payload.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn maintenance_sweeps_in_background() {
        let warehouse = Arc::new(DataWarehouse::new(
            WarehouseConfig::default().with_cleanup_interval(Duration::from_secs(1)),
        ));
        assert!(warehouse.spawn_maintenance());
        assert!(!warehouse.spawn_maintenance());

        let (widget, sensor) = ids("widget", "sensor");
        warehouse.store_with_ttl(&widget, &sensor, json!(1), SourceType::Static, Duration::from_millis(100));
        assert_eq!(warehouse.entry_count(), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(warehouse.entry_count(), 0);
        assert_eq!(warehouse.performance_metrics().expired_evictions, 1);

        warehouse.dispose();
        assert!(warehouse.spawn_maintenance());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_metrics_zeroes_counters() {
        let warehouse = DataWarehouse::default();
        warehouse.get("missing");
        warehouse.reset_metrics();
        assert_eq!(warehouse.performance_metrics(), PerformanceMetrics::default());
    }

    proptest! {
        #[test]
        fn keys_are_isolated(
            writes in proptest::collection::vec((0u8..3, 0u8..3, any::<i32>()), 1..30)
        ) {
            let warehouse = DataWarehouse::default();
            let mut expected = std::collections::HashMap::new();
            for (component, source, value) in writes {
                let (c, s) = ids(&format!("w{component}"), &format!("s{source}"));
                warehouse.store(&c, &s, json!(value), SourceType::Static);
                expected.insert((c, s), value);
            }
            for ((c, s), value) in expected {
                prop_assert_eq!(warehouse.get_source(c.as_str(), s.as_str()), Some(json!(value)));
            }
        }
    }
}
