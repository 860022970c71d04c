//! Configuration state manager
//!
//! Owns the canonical configuration of every widget, split into four
//! sections. Each write goes through the same gate:
//! 1. shape check (rejected writes never mutate state)
//! 2. cycle check: a streak of identical writes inside the cycle window is
//!    suppressed once it reaches the threshold
//! 3. content-hash dedup (skipped for forced writes)
//! 4. version bump, history snapshot, debounced section notification
//!
//! Notifications are trailing-debounced per `(widget, section)`: a burst of
//! writes produces one [`ConfigurationUpdateEvent`] carrying the latest value.

use crate::error::{ConfigError, Result};
use crate::generator::ConfigGenerator;
use chrono::{DateTime, Utc};
use dashflow_types::{
    Action, ComponentId, ContentHash, DataSourceConfig, InteractionSection, SessionId, ValidationReport,
};
use moka::future::Cache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Independently versioned part of a widget configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSection {
    Base,
    Component,
    DataSource,
    Interaction,
}

impl ConfigSection {
    pub const ALL: [Self; 4] = [Self::Base, Self::Component, Self::DataSource, Self::Interaction];

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Component => "component",
            Self::DataSource => "dataSource",
            Self::Interaction => "interaction",
        }
    }
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionPhase {
    Uninitialized,
    Initialized,
    /// Written, notification pending
    Updating,
    /// Notification delivered
    Stable,
}

/// Who made a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Writer {
    User,
    System,
    /// Cross-widget write caused by an interaction edit session
    Interaction { session: SessionId },
    /// Rollback to an earlier version
    Restore { sequence: u64 },
}

/// Version stamp of a widget or one of its sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersion {
    pub content_hash: ContentHash,
    pub sequence: u64,
    pub last_writer: Writer,
    pub timestamp: DateTime<Utc>,
}

/// Full configuration of one widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfiguration {
    pub base: Value,
    pub component: Value,
    /// Serialized [`DataSourceConfig`], `null` when unset
    pub data_source: Value,
    /// Serialized [`InteractionSection`]
    pub interaction: Value,
}

impl Default for WidgetConfiguration {
    fn default() -> Self {
        Self {
            base: json!({}),
            component: json!({}),
            data_source: Value::Null,
            interaction: json!({ "events": [] }),
        }
    }
}

impl WidgetConfiguration {
    #[must_use]
    pub fn section(&self, section: ConfigSection) -> &Value {
        match section {
            ConfigSection::Base => &self.base,
            ConfigSection::Component => &self.component,
            ConfigSection::DataSource => &self.data_source,
            ConfigSection::Interaction => &self.interaction,
        }
    }

    fn section_mut(&mut self, section: ConfigSection) -> &mut Value {
        match section {
            ConfigSection::Base => &mut self.base,
            ConfigSection::Component => &mut self.component,
            ConfigSection::DataSource => &mut self.data_source,
            ConfigSection::Interaction => &mut self.interaction,
        }
    }

    /// Combined hash of all sections
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        let parts: Vec<ContentHash> = ConfigSection::ALL
            .iter()
            .map(|section| ContentHash::of_value(self.section(*section)))
            .collect();
        ContentHash::combine(&parts)
    }
}

/// Options for one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub writer: Writer,
    /// Apply and notify even if the content hash is unchanged
    pub force: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::user()
    }
}

impl WriteOptions {
    #[must_use]
    pub fn user() -> Self {
        Self {
            writer: Writer::User,
            force: false,
        }
    }

    #[must_use]
    pub fn system() -> Self {
        Self {
            writer: Writer::System,
            force: false,
        }
    }

    /// Forced write on behalf of an interaction edit session
    #[must_use]
    pub fn interaction(session: SessionId) -> Self {
        Self {
            writer: Writer::Interaction { session },
            force: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Result of a write that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New version recorded, notification scheduled
    Applied(ConfigVersion),
    /// Same content as stored
    Unchanged,
    /// Dropped as part of an update cycle
    Suppressed,
}

impl WriteOutcome {
    #[inline]
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Debounced notification for one section
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdateEvent {
    pub component_id: ComponentId,
    pub section: ConfigSection,
    /// Section version before the coalesced burst
    pub old_version: Option<ConfigVersion>,
    pub new_version: ConfigVersion,
    pub value: Value,
    /// Data source changes require a pipeline run
    pub should_execute: bool,
    pub writer: Writer,
}

/// One entry of a widget's version history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    pub version: ConfigVersion,
    pub configuration: WidgetConfiguration,
}

/// State manager tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Trailing debounce per section; 0 notifies synchronously
    pub debounce_ms: u64,
    pub cycle_window_ms: u64,
    /// Identical writes inside the window at which further ones are dropped
    pub cycle_threshold: usize,
    pub history_limit: usize,
    pub validation_cache_ttl_ms: u64,
    pub channel_capacity: usize,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            cycle_window_ms: 1000,
            cycle_threshold: 5,
            history_limit: 50,
            validation_cache_ttl_ms: 5000,
            channel_capacity: 256,
        }
    }
}

impl StateSettings {
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = millis(debounce);
        self
    }

    #[must_use]
    pub fn with_cycle_detection(mut self, window: Duration, threshold: usize) -> Self {
        self.cycle_window_ms = millis(window);
        self.cycle_threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug)]
struct SectionState {
    phase: SectionPhase,
    version: ConfigVersion,
    /// Current streak of identical write attempts
    attempts: VecDeque<(Instant, ContentHash)>,
}

#[derive(Debug)]
struct WidgetState {
    configuration: WidgetConfiguration,
    version: ConfigVersion,
    sections: HashMap<ConfigSection, SectionState>,
    history: VecDeque<VersionSnapshot>,
}

#[derive(Debug)]
struct PendingNotification {
    generation: u64,
    event: ConfigurationUpdateEvent,
}

type PendingKey = (ComponentId, ConfigSection);

#[derive(Debug)]
struct Inner {
    settings: StateSettings,
    widgets: Mutex<HashMap<ComponentId, WidgetState>>,
    pending: Mutex<HashMap<PendingKey, PendingNotification>>,
    events: broadcast::Sender<ConfigurationUpdateEvent>,
}

impl Inner {
    fn flush(&self, key: &PendingKey, generation: u64) {
        let event = {
            let mut pending = self.pending.lock();
            match pending.get(key) {
                Some(p) if p.generation == generation => pending.remove(key).map(|p| p.event),
                _ => None,
            }
        };
        let Some(event) = event else {
            return;
        };

        if let Some(state) = self
            .widgets
            .lock()
            .get_mut(&key.0)
            .and_then(|widget| widget.sections.get_mut(&key.1))
        {
            state.phase = SectionPhase::Stable;
        }
        debug!(
            component_id = %event.component_id,
            section = %event.section,
            sequence = event.new_version.sequence,
            "Configuration update delivered"
        );
        // no subscribers is not an error
        let _ = self.events.send(event);
    }
}

/// Versioned, deduplicating store of widget configurations
#[derive(Debug, Clone)]
pub struct ConfigurationStateManager {
    inner: Arc<Inner>,
    validation: Cache<ContentHash, ValidationReport>,
    generator: ConfigGenerator,
}

impl Default for ConfigurationStateManager {
    fn default() -> Self {
        Self::new(StateSettings::default())
    }
}

impl ConfigurationStateManager {
    #[must_use]
    pub fn new(settings: StateSettings) -> Self {
        let (events, _) = broadcast::channel(settings.channel_capacity.max(1));
        let validation = Cache::builder()
            .max_capacity(1024)
            .time_to_live(Duration::from_millis(settings.validation_cache_ttl_ms.max(1)))
            .build();
        Self {
            inner: Arc::new(Inner {
                settings,
                widgets: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                events,
            }),
            validation,
            generator: ConfigGenerator::default(),
        }
    }

    /// Use `generator` for data source validation
    #[must_use]
    pub fn with_generator(mut self, generator: ConfigGenerator) -> Self {
        self.generator = generator;
        self
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &StateSettings {
        &self.inner.settings
    }

    /// Receive debounced section notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigurationUpdateEvent> {
        self.inner.events.subscribe()
    }

    /// Create the default configuration for `component`; returns the
    /// existing version if it is already initialized
    pub fn initialize(&self, component: &str) -> ConfigVersion {
        let mut widgets = self.inner.widgets.lock();
        if let Some(existing) = widgets.get(component) {
            return existing.version.clone();
        }

        let configuration = WidgetConfiguration::default();
        let now = Utc::now();
        let version = ConfigVersion {
            content_hash: configuration.content_hash(),
            sequence: 0,
            last_writer: Writer::System,
            timestamp: now,
        };
        let sections = ConfigSection::ALL
            .iter()
            .map(|section| {
                let state = SectionState {
                    phase: SectionPhase::Initialized,
                    version: ConfigVersion {
                        content_hash: ContentHash::of_value(configuration.section(*section)),
                        ..version.clone()
                    },
                    attempts: VecDeque::new(),
                };
                (*section, state)
            })
            .collect();
        let mut history = VecDeque::new();
        history.push_back(VersionSnapshot {
            version: version.clone(),
            configuration: configuration.clone(),
        });

        widgets.insert(
            ComponentId::from(component),
            WidgetState {
                configuration,
                version: version.clone(),
                sections,
                history,
            },
        );
        info!(component_id = %component, "Configuration initialized");
        version
    }

    /// Write one section
    ///
    /// # Errors
    /// - [`ConfigError::InvalidSectionShape`] if `value` does not fit the section
    /// - [`ConfigError::UnknownComponent`] if `component` was never initialized
    pub fn update_section(
        &self,
        component: &str,
        section: ConfigSection,
        value: Value,
        options: WriteOptions,
    ) -> Result<WriteOutcome> {
        validate_shape(section, &value)?;
        let hash = ContentHash::of_value(&value);
        let now = Instant::now();
        let settings = &self.inner.settings;

        let (key, event) = {
            let mut widgets = self.inner.widgets.lock();
            let widget = widgets
                .get_mut(component)
                .ok_or_else(|| ConfigError::UnknownComponent(ComponentId::from(component)))?;
            let Some(state) = widget.sections.get_mut(&section) else {
                return Err(ConfigError::UnknownComponent(ComponentId::from(component)));
            };

            let window = Duration::from_millis(settings.cycle_window_ms);
            while state
                .attempts
                .front()
                .is_some_and(|(at, _)| now.saturating_duration_since(*at) >= window)
            {
                state.attempts.pop_front();
            }
            if state.attempts.back().is_some_and(|(_, last)| *last != hash) {
                state.attempts.clear();
            }
            state.attempts.push_back((now, hash));
            if state.attempts.len() >= settings.cycle_threshold.max(1) {
                warn!(
                    component_id = %component,
                    section = %section,
                    attempts = state.attempts.len(),
                    hash = %hash.short(),
                    "Update cycle detected, dropping write"
                );
                return Ok(WriteOutcome::Suppressed);
            }

            if !options.force && state.version.content_hash == hash {
                debug!(component_id = %component, section = %section, "Unchanged write ignored");
                return Ok(WriteOutcome::Unchanged);
            }

            let old_version = state.version.clone();
            *widget.configuration.section_mut(section) = value.clone();
            let sequence = widget.version.sequence + 1;
            let timestamp = Utc::now();
            let new_version = ConfigVersion {
                content_hash: hash,
                sequence,
                last_writer: options.writer.clone(),
                timestamp,
            };
            state.version = new_version.clone();
            state.phase = SectionPhase::Updating;
            widget.version = ConfigVersion {
                content_hash: widget.configuration.content_hash(),
                sequence,
                last_writer: options.writer.clone(),
                timestamp,
            };
            widget.history.push_back(VersionSnapshot {
                version: widget.version.clone(),
                configuration: widget.configuration.clone(),
            });
            while widget.history.len() > settings.history_limit.max(1) {
                widget.history.pop_front();
            }

            let component_id = ComponentId::from(component);
            let event = ConfigurationUpdateEvent {
                component_id: component_id.clone(),
                section,
                old_version: Some(old_version),
                new_version,
                value,
                should_execute: section == ConfigSection::DataSource,
                writer: options.writer,
            };
            ((component_id, section), event)
        };

        debug!(
            component_id = %component,
            section = %section,
            sequence = event.new_version.sequence,
            "Configuration section updated"
        );
        let applied = event.new_version.clone();
        self.schedule(key, event);
        Ok(WriteOutcome::Applied(applied))
    }

    fn schedule(&self, key: PendingKey, event: ConfigurationUpdateEvent) {
        let generation = {
            let mut pending = self.inner.pending.lock();
            match pending.get_mut(&key) {
                Some(existing) => {
                    let old_version = existing.event.old_version.take();
                    existing.generation += 1;
                    existing.event = ConfigurationUpdateEvent {
                        old_version,
                        ..event
                    };
                    existing.generation
                }
                None => {
                    pending.insert(
                        key.clone(),
                        PendingNotification {
                            generation: 0,
                            event,
                        },
                    );
                    0
                }
            }
        };

        let debounce = Duration::from_millis(self.inner.settings.debounce_ms);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !debounce.is_zero() => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    inner.flush(&key, generation);
                });
            }
            _ => self.inner.flush(&key, generation),
        }
    }

    /// Write every section of `configuration`
    ///
    /// Sections are written in [`ConfigSection::ALL`] order; unchanged
    /// sections are skipped by dedup. Shapes are checked up front so a bad
    /// section leaves the whole configuration untouched.
    ///
    /// # Errors
    /// Same as [`update_section`](Self::update_section)
    pub fn set_configuration(
        &self,
        component: &str,
        configuration: WidgetConfiguration,
        options: WriteOptions,
    ) -> Result<Vec<(ConfigSection, WriteOutcome)>> {
        for section in ConfigSection::ALL {
            validate_shape(section, configuration.section(section))?;
        }
        if !self.contains(component) {
            return Err(ConfigError::UnknownComponent(ComponentId::from(component)));
        }
        let WidgetConfiguration {
            base,
            component: component_section,
            data_source,
            interaction,
        } = configuration;
        let values = [base, component_section, data_source, interaction];
        ConfigSection::ALL
            .into_iter()
            .zip(values)
            .map(|(section, value)| {
                self.update_section(component, section, value, options.clone())
                    .map(|outcome| (section, outcome))
            })
            .collect()
    }

    #[must_use]
    pub fn contains(&self, component: &str) -> bool {
        self.inner.widgets.lock().contains_key(component)
    }

    #[must_use]
    pub fn component_ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.inner.widgets.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn configuration(&self, component: &str) -> Option<WidgetConfiguration> {
        self.inner
            .widgets
            .lock()
            .get(component)
            .map(|widget| widget.configuration.clone())
    }

    #[must_use]
    pub fn section(&self, component: &str, section: ConfigSection) -> Option<Value> {
        self.inner
            .widgets
            .lock()
            .get(component)
            .map(|widget| widget.configuration.section(section).clone())
    }

    /// Parsed data source section, `None` while unset
    #[must_use]
    pub fn data_source(&self, component: &str) -> Option<DataSourceConfig> {
        let value = self.section(component, ConfigSection::DataSource)?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Parsed interaction section
    #[must_use]
    pub fn interaction(&self, component: &str) -> Option<InteractionSection> {
        self.section(component, ConfigSection::Interaction)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    #[must_use]
    pub fn version(&self, component: &str) -> Option<ConfigVersion> {
        self.inner
            .widgets
            .lock()
            .get(component)
            .map(|widget| widget.version.clone())
    }

    #[must_use]
    pub fn section_version(&self, component: &str, section: ConfigSection) -> Option<ConfigVersion> {
        self.inner
            .widgets
            .lock()
            .get(component)
            .and_then(|widget| widget.sections.get(&section))
            .map(|state| state.version.clone())
    }

    #[must_use]
    pub fn phase(&self, component: &str, section: ConfigSection) -> SectionPhase {
        self.inner
            .widgets
            .lock()
            .get(component)
            .and_then(|widget| widget.sections.get(&section))
            .map_or(SectionPhase::Uninitialized, |state| state.phase)
    }

    /// True if the stored configuration hashes to `expected`
    #[must_use]
    pub fn is_up_to_date(&self, component: &str, expected: &ContentHash) -> bool {
        self.version(component)
            .is_some_and(|version| version.content_hash == *expected)
    }

    /// Oldest first
    #[must_use]
    pub fn version_history(&self, component: &str) -> Vec<VersionSnapshot> {
        self.inner
            .widgets
            .lock()
            .get(component)
            .map(|widget| widget.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn snapshot(&self, component: &str, sequence: u64) -> Result<WidgetConfiguration> {
        let widgets = self.inner.widgets.lock();
        let widget = widgets
            .get(component)
            .ok_or_else(|| ConfigError::UnknownComponent(ComponentId::from(component)))?;
        widget
            .history
            .iter()
            .find(|snapshot| snapshot.version.sequence == sequence)
            .map(|snapshot| snapshot.configuration.clone())
            .ok_or_else(|| ConfigError::UnknownVersion {
                component: ComponentId::from(component),
                sequence,
            })
    }

    /// Write back the configuration recorded at `sequence`
    ///
    /// Only sections that differ from the current state are applied.
    ///
    /// # Errors
    /// [`ConfigError::UnknownComponent`] or [`ConfigError::UnknownVersion`]
    pub fn restore_to_version(&self, component: &str, sequence: u64) -> Result<ConfigVersion> {
        let configuration = self.snapshot(component, sequence)?;
        let options = WriteOptions {
            writer: Writer::Restore { sequence },
            force: false,
        };
        self.set_configuration(component, configuration, options)?;
        info!(component_id = %component, sequence, "Configuration restored");
        self.version(component)
            .ok_or_else(|| ConfigError::UnknownComponent(ComponentId::from(component)))
    }

    /// Sections that differ between two recorded versions
    ///
    /// # Errors
    /// [`ConfigError::UnknownComponent`] or [`ConfigError::UnknownVersion`]
    pub fn compare_versions(&self, component: &str, a: u64, b: u64) -> Result<Vec<ConfigSection>> {
        let left = self.snapshot(component, a)?;
        let right = self.snapshot(component, b)?;
        Ok(ConfigSection::ALL
            .into_iter()
            .filter(|section| {
                ContentHash::of_value(left.section(*section))
                    != ContentHash::of_value(right.section(*section))
            })
            .collect())
    }

    /// Forget `component` and drop its pending notifications
    pub fn remove_configuration(&self, component: &str) -> bool {
        let removed = self.inner.widgets.lock().remove(component).is_some();
        self.inner
            .pending
            .lock()
            .retain(|(id, _), _| id.as_str() != component);
        if removed {
            info!(component_id = %component, "Configuration removed");
        }
        removed
    }

    /// Structural validation of the whole configuration, cached by content hash
    ///
    /// # Errors
    /// [`ConfigError::UnknownComponent`]
    pub async fn validate_configuration(&self, component: &str) -> Result<ValidationReport> {
        let (hash, configuration) = {
            let widgets = self.inner.widgets.lock();
            let widget = widgets
                .get(component)
                .ok_or_else(|| ConfigError::UnknownComponent(ComponentId::from(component)))?;
            (widget.version.content_hash, widget.configuration.clone())
        };
        let generator = self.generator.clone();
        let report = self
            .validation
            .get_with(hash, async move { check_configuration(&generator, &configuration) })
            .await;
        Ok(report)
    }
}

fn check_configuration(generator: &ConfigGenerator, configuration: &WidgetConfiguration) -> ValidationReport {
    let mut report = ValidationReport::new();
    for section in ConfigSection::ALL {
        if let Err(e) = validate_shape(section, configuration.section(section)) {
            report.error(e.to_string());
        }
    }
    if let Ok(config) = serde_json::from_value::<DataSourceConfig>(configuration.data_source.clone()) {
        report.absorb("dataSource", generator.validate_config(&config));
    } else if configuration.data_source.is_null() {
        report.warn("no data source configured");
    }
    if let Ok(section) = serde_json::from_value::<InteractionSection>(configuration.interaction.clone()) {
        for event in &section.events {
            for action in &event.responses {
                if let Action::Unknown { kind, .. } = action {
                    report.warn(format!("interaction: unknown action '{kind}'"));
                }
            }
        }
    }
    report
}

/// Check that `value` fits `section` without touching any state
///
/// # Errors
/// [`ConfigError::InvalidSectionShape`] naming the section and the mismatch
pub fn validate_shape(section: ConfigSection, value: &Value) -> Result<()> {
    let invalid = |reason: String| ConfigError::InvalidSectionShape { section, reason };
    match section {
        ConfigSection::Base | ConfigSection::Component => {
            if !value.is_object() {
                return Err(invalid(format!("expected an object, got {}", kind_of(value))));
            }
        }
        ConfigSection::DataSource => {
            if !value.is_null() {
                serde_json::from_value::<DataSourceConfig>(value.clone())
                    .map_err(|e| invalid(e.to_string()))?;
            }
        }
        ConfigSection::Interaction => {
            serde_json::from_value::<InteractionSection>(value.clone())
                .map_err(|e| invalid(e.to_string()))?;
        }
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
