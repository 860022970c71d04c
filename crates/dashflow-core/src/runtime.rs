//! Dashboard runtime
//!
//! Owns one instance of every service and wires them together:
//! - `dataSource` notifications reschedule the widget's triggers and re-run
//!   its pipeline
//! - `component` notifications feed `config.*` interaction watchers
//! - `interaction` notifications re-register the widget's declarations
//! - queued interaction writes are applied to the target's component section
//!
//! Lifecycle is explicit: [`DashboardRuntime::create`] builds the services,
//! [`initialize`](DashboardRuntime::initialize) starts the background tasks
//! and [`dispose`](DashboardRuntime::dispose) tears everything down.

use crate::error::{Result, RuntimeError};
use crate::interaction::{
    apply_property_write, ActionOutcome, InteractionEngine, InteractionStats, LoggingNavigator,
    NavigationSink, PropertyWrite,
};
use crate::polling::{PollingScheduler, PollingStatistics, PollingTaskSpec};
use crate::settings::RuntimeSettings;
use chrono::{DateTime, Utc};
use dashflow_config::{
    validate_shape, ConfigGenerator, ConfigSection, ConfigurationStateManager,
    ConfigurationUpdateEvent, WriteOptions, WriteOutcome, Writer,
};
use dashflow_pipeline::{DataFetcher, PipelineExecutor, SourceFetcher};
use dashflow_types::{
    ComponentId, ContentHash, DataRequirement, DataSourceConfig, EventKind, InteractionSection, Payload,
    SessionId, TriggerConfig, UserSourceInput, ValidationReport,
};
use dashflow_warehouse::{DataWarehouse, PerformanceMetrics, StorageStats};
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Everything needed to put one widget on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDefinition {
    pub requirement: DataRequirement,
    #[serde(default)]
    pub inputs: Vec<UserSourceInput>,
    /// Initial component section
    #[serde(default = "empty_object")]
    pub component: Value,
    #[serde(default)]
    pub interaction: InteractionSection,
}

impl WidgetDefinition {
    #[must_use]
    pub fn new(requirement: DataRequirement, inputs: Vec<UserSourceInput>) -> Self {
        Self {
            requirement,
            inputs,
            component: empty_object(),
            interaction: InteractionSection::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_component(mut self, component: Value) -> Self {
        self.component = component;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionSection) -> Self {
        self.interaction = interaction;
        self
    }

    #[inline]
    #[must_use]
    pub fn component_id(&self) -> &ComponentId {
        &self.requirement.component_id
    }

    /// Parse a widget file: one definition, a list, or `{ "widgets": [...] }`
    ///
    /// # Errors
    /// [`RuntimeError::Json`] if the text matches none of the shapes
    pub fn parse_many(text: &str) -> Result<Vec<Self>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Many(Vec<WidgetDefinition>),
            Dashboard { widgets: Vec<WidgetDefinition> },
            One(Box<WidgetDefinition>),
        }
        Ok(match serde_json::from_str(text)? {
            Shape::Many(widgets) | Shape::Dashboard { widgets } => widgets,
            Shape::One(widget) => vec![*widget],
        })
    }
}

/// Aggregate counters across services
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub widgets: usize,
    pub executions: u64,
    pub discarded_results: u64,
    pub polling: PollingStatistics,
    pub cache: PerformanceMetrics,
    pub storage: StorageStats,
    pub interactions: InteractionStats,
}

#[derive(Debug, Clone)]
struct WidgetRecord {
    requirement: DataRequirement,
    added_at: DateTime<Utc>,
}

struct RuntimeInner {
    settings: RuntimeSettings,
    generator: ConfigGenerator,
    state: ConfigurationStateManager,
    warehouse: Arc<DataWarehouse>,
    scheduler: PollingScheduler,
    interactions: InteractionEngine,
    executor: PipelineExecutor,
    widgets: DashMap<ComponentId, WidgetRecord>,
    sockets: DashMap<ComponentId, Vec<JoinHandle<()>>>,
    write_queue: Mutex<Option<mpsc::Receiver<PropertyWrite>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
    executions: AtomicU64,
    discarded: AtomicU64,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
        for mut sockets in self.sockets.iter_mut() {
            for handle in sockets.drain(..) {
                handle.abort();
            }
        }
    }
}

/// Service container for one dashboard
#[derive(Clone)]
pub struct DashboardRuntime {
    inner: Arc<RuntimeInner>,
}

impl std::fmt::Debug for DashboardRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardRuntime")
            .field("widgets", &self.inner.widgets.len())
            .field("initialized", &self.inner.initialized.load(Ordering::SeqCst))
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DashboardRuntime {
    /// Build every service with the production fetcher
    ///
    /// # Errors
    /// [`RuntimeError::Fetcher`] if the HTTP client cannot be built
    pub fn create(settings: RuntimeSettings) -> Result<Self> {
        let fetcher = SourceFetcher::new(settings.fetch.clone())?;
        Ok(Self::create_with_fetcher(settings, Arc::new(fetcher)))
    }

    /// Build every service around `fetcher`
    #[must_use]
    pub fn create_with_fetcher(settings: RuntimeSettings, fetcher: Arc<dyn DataFetcher>) -> Self {
        Self::create_with_services(settings, fetcher, Arc::new(LoggingNavigator))
    }

    /// Build every service around `fetcher` and `navigator`
    #[must_use]
    pub fn create_with_services(
        settings: RuntimeSettings,
        fetcher: Arc<dyn DataFetcher>,
        navigator: Arc<dyn NavigationSink>,
    ) -> Self {
        let generator = ConfigGenerator::new(settings.generator.clone());
        let state = ConfigurationStateManager::new(settings.state.clone()).with_generator(generator.clone());
        let (interactions, writes) = InteractionEngine::new(&settings.interaction, navigator);
        let inner = RuntimeInner {
            generator,
            state,
            warehouse: Arc::new(DataWarehouse::new(settings.warehouse.clone())),
            scheduler: PollingScheduler::new(settings.polling.clone()),
            interactions,
            executor: PipelineExecutor::new(fetcher),
            widgets: DashMap::new(),
            sockets: DashMap::new(),
            write_queue: Mutex::new(Some(writes)),
            background: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            executions: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            settings,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start the configuration listener, the interaction write consumer and
    /// warehouse maintenance. Idempotent. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// [`RuntimeError::Disposed`] after [`dispose`](Self::dispose)
    pub fn initialize(&self) -> Result<()> {
        self.ensure_active()?;
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut background = self.inner.background.lock();
        background.push(tokio::spawn(listen_configuration(
            Arc::downgrade(&self.inner),
            self.inner.state.subscribe(),
        )));
        if let Some(writes) = self.inner.write_queue.lock().take() {
            background.push(tokio::spawn(consume_writes(Arc::downgrade(&self.inner), writes)));
        }
        drop(background);

        self.inner.warehouse.spawn_maintenance();
        info!(
            global_polling = self.inner.scheduler.is_global_enabled(),
            "Dashboard runtime initialized"
        );
        Ok(())
    }

    /// Stop everything and drop all widgets
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for handle in self.inner.background.lock().drain(..) {
            handle.abort();
        }
        self.abort_all_sockets();
        self.inner.scheduler.clear_all_tasks();
        for component in self.widget_ids() {
            self.inner.state.remove_configuration(component.as_str());
            self.inner.interactions.unregister(component.as_str());
        }
        self.inner.widgets.clear();
        self.inner.warehouse.dispose();
        info!("Dashboard runtime disposed");
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            Err(RuntimeError::Disposed)
        } else {
            Ok(())
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RuntimeSettings {
        &self.inner.settings
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &ConfigurationStateManager {
        &self.inner.state
    }

    #[inline]
    #[must_use]
    pub fn warehouse(&self) -> &Arc<DataWarehouse> {
        &self.inner.warehouse
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &PollingScheduler {
        &self.inner.scheduler
    }

    #[inline]
    #[must_use]
    pub fn interactions(&self) -> &InteractionEngine {
        &self.inner.interactions
    }

    #[inline]
    #[must_use]
    pub fn generator(&self) -> &ConfigGenerator {
        &self.inner.generator
    }

    /// Add or reconfigure a widget
    ///
    /// Generates the data source config, writes the widget's sections and
    /// registers its interactions. Triggers are installed and the pipeline
    /// runs once the `dataSource` notification arrives.
    ///
    /// # Errors
    /// Generator errors (e.g. `MissingRequiredSource`) and section shape
    /// errors (`InvalidSectionShape`) leave the runtime untouched.
    pub fn add_widget(&self, definition: WidgetDefinition) -> Result<DataSourceConfig> {
        self.ensure_active()?;
        let config = self
            .inner
            .generator
            .generate_config(&definition.requirement, &definition.inputs)?;
        let component = definition.component_id().clone();
        let interaction = serde_json::to_value(&definition.interaction)?;
        let data_source = serde_json::to_value(&config)?;
        validate_shape(ConfigSection::Component, &definition.component)?;
        validate_shape(ConfigSection::Interaction, &interaction)?;
        validate_shape(ConfigSection::DataSource, &data_source)?;

        self.inner.state.initialize(component.as_str());
        self.inner
            .interactions
            .register(component.clone(), definition.interaction);
        self.inner.widgets.insert(
            component.clone(),
            WidgetRecord {
                requirement: definition.requirement,
                added_at: Utc::now(),
            },
        );

        let sections = [
            (ConfigSection::Component, definition.component),
            (ConfigSection::Interaction, interaction),
            (ConfigSection::DataSource, data_source),
        ];
        for (section, value) in sections {
            if let Err(err) = self
                .inner
                .state
                .update_section(component.as_str(), section, value, WriteOptions::user())
            {
                self.remove_widget(component.as_str());
                return Err(err.into());
            }
        }

        info!(
            component_id = %component,
            summary = %self.inner.generator.summarize(&config),
            "Widget added"
        );
        Ok(config)
    }

    /// Replace a widget's source inputs, keeping its requirement
    ///
    /// # Errors
    /// [`RuntimeError::UnknownComponent`] or generator errors
    pub fn update_inputs(&self, component: &str, inputs: &[UserSourceInput]) -> Result<WriteOutcome> {
        self.ensure_active()?;
        let requirement = self
            .inner
            .widgets
            .get(component)
            .map(|record| record.requirement.clone())
            .ok_or_else(|| RuntimeError::UnknownComponent(component.into()))?;
        let config = self.inner.generator.generate_config(&requirement, inputs)?;
        Ok(self.inner.state.update_section(
            component,
            ConfigSection::DataSource,
            serde_json::to_value(&config)?,
            WriteOptions::user(),
        )?)
    }

    /// Remove a widget with its tasks, sockets, cache entries and configuration
    pub fn remove_widget(&self, component: &str) -> bool {
        let Some((component_id, _)) = self.inner.widgets.remove(component) else {
            return false;
        };
        let tasks = self.inner.scheduler.remove_component_tasks(component);
        self.abort_sockets(component);
        self.inner.warehouse.clear(component);
        self.inner.state.remove_configuration(component);
        self.inner.interactions.unregister(component);
        info!(component_id = %component_id, tasks, "Widget removed");
        true
    }

    #[must_use]
    pub fn widget_ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.inner.widgets.iter().map(|w| w.key().clone()).collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn contains_widget(&self, component: &str) -> bool {
        self.inner.widgets.contains_key(component)
    }

    /// When the widget was (last) added
    #[must_use]
    pub fn added_at(&self, component: &str) -> Option<DateTime<Utc>> {
        self.inner.widgets.get(component).map(|record| record.added_at)
    }

    /// Run the widget's pipeline now and cache the result
    ///
    /// The widget's cache is invalidated before fetching. A result whose
    /// widget was removed, or whose configuration changed while it was in
    /// flight, is returned but not cached.
    ///
    /// # Errors
    /// - [`RuntimeError::UnknownComponent`] if the widget does not exist or
    ///   was removed during the run
    /// - [`RuntimeError::NotConfigured`] if it has no data source
    pub async fn execute(&self, component: &str) -> Result<Payload> {
        self.ensure_active()?;
        let Some(component_id) = self.inner.widgets.get(component).map(|w| w.key().clone()) else {
            return Err(RuntimeError::UnknownComponent(component.into()));
        };
        let config = self
            .inner
            .state
            .data_source(component)
            .ok_or_else(|| RuntimeError::NotConfigured(component_id.clone()))?;
        let snapshot = self.data_source_hash(component);

        self.inner.warehouse.clear(component);
        let result = self.inner.executor.execute(&config).await;
        self.inner.executions.fetch_add(1, Ordering::Relaxed);

        if self.is_disposed() || !self.inner.widgets.contains_key(component) {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(component_id = component, "Discarding result for removed widget");
            return Err(RuntimeError::UnknownComponent(component_id));
        }
        if self.data_source_hash(component) != snapshot {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(component_id = component, "Discarding result for superseded configuration");
            return Ok(result.payload);
        }

        for definition in &config.data_sources {
            if let Some(value) = result.payload.get(definition.id.as_str()) {
                self.inner
                    .warehouse
                    .store(&component_id, &definition.id, value.clone(), definition.source_type);
            }
        }
        debug!(
            component_id = component,
            success = result.success,
            failures = result.failures.len(),
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Pipeline executed"
        );

        self.inner
            .interactions
            .observe_payload(component, &result.payload, SessionId::new());
        Ok(result.payload)
    }

    fn data_source_hash(&self, component: &str) -> Option<ContentHash> {
        self.inner
            .state
            .section_version(component, ConfigSection::DataSource)
            .map(|version| version.content_hash)
    }

    /// Cached payload, if any source of the widget is still live
    #[must_use]
    pub fn payload(&self, component: &str) -> Option<Payload> {
        self.inner.warehouse.get(component)
    }

    /// Fire the widget's `click` or `hover` handlers
    pub fn trigger(&self, component: &str, event: EventKind, data: &Value) -> Vec<ActionOutcome> {
        self.inner
            .interactions
            .trigger(component, event, data, SessionId::new())
    }

    /// Validate the widget's stored configuration
    ///
    /// # Errors
    /// `UnknownComponent` from the state manager
    pub async fn validate(&self, component: &str) -> Result<ValidationReport> {
        Ok(self.inner.state.validate_configuration(component).await?)
    }

    /// Drop every polling task and socket listener and rebuild them from the
    /// current widgets; returns the number of polling tasks installed
    pub fn reinitialize_polling(&self) -> usize {
        self.inner.scheduler.clear_all_tasks();
        self.abort_all_sockets();
        for component in self.widget_ids() {
            if let Some(config) = self.inner.state.data_source(component.as_str()) {
                self.install_triggers(&component, &config);
            }
        }
        let tasks = self.inner.scheduler.statistics().total_tasks;
        info!(tasks, "Polling reinitialized");
        tasks
    }

    pub fn enable_global_polling(&self) {
        self.inner.scheduler.enable_global_polling();
    }

    pub fn disable_global_polling(&self) {
        self.inner.scheduler.disable_global_polling();
    }

    /// Replace the widget's triggers; true if a timer will fire right away
    fn install_triggers(&self, component: &ComponentId, config: &DataSourceConfig) -> bool {
        self.inner.scheduler.remove_component_tasks(component.as_str());
        self.abort_sockets(component.as_str());

        let mut fires_now = false;
        for trigger in &config.triggers {
            match trigger {
                TriggerConfig::Timer { interval_ms, immediate } => {
                    let weak = Arc::downgrade(&self.inner);
                    let target = component.clone();
                    let spec = PollingTaskSpec::new(
                        component.clone(),
                        Duration::from_millis(*interval_ms),
                        move || run_detached(weak.clone(), target.clone()),
                    )
                    .with_immediate(*immediate);
                    let id = self.inner.scheduler.add_task(spec);
                    if let Err(err) = self.inner.scheduler.start_task(id) {
                        warn!(component_id = %component, error = %err, "Polling task did not start");
                        continue;
                    }
                    fires_now |= *immediate && self.inner.scheduler.is_global_enabled();
                }
                TriggerConfig::Socket { url, protocols } => {
                    let retry = Duration::from_millis(self.inner.settings.polling.socket_retry_ms.max(1));
                    let handle = tokio::spawn(listen_socket(
                        Arc::downgrade(&self.inner),
                        component.clone(),
                        url.clone(),
                        protocols.clone(),
                        retry,
                    ));
                    self.inner.sockets.entry(component.clone()).or_default().push(handle);
                }
                TriggerConfig::Manual => {}
            }
        }
        debug!(component_id = %component, triggers = config.triggers.len(), "Triggers installed");
        fires_now
    }

    fn abort_sockets(&self, component: &str) {
        if let Some((_, handles)) = self.inner.sockets.remove(component) {
            for handle in handles {
                handle.abort();
            }
        }
    }

    fn abort_all_sockets(&self) {
        for mut sockets in self.inner.sockets.iter_mut() {
            for handle in sockets.drain(..) {
                handle.abort();
            }
        }
        self.inner.sockets.clear();
    }

    fn on_configuration_event(&self, event: ConfigurationUpdateEvent) {
        let component = event.component_id.as_str();
        if !self.contains_widget(component) {
            return;
        }
        match event.section {
            ConfigSection::DataSource => {
                let Some(config) = self.inner.state.data_source(component) else {
                    self.inner.scheduler.remove_component_tasks(component);
                    self.abort_sockets(component);
                    return;
                };
                let fires_now = self.install_triggers(&event.component_id, &config);
                if event.should_execute && !fires_now {
                    tokio::spawn(run_detached(Arc::downgrade(&self.inner), event.component_id));
                }
            }
            ConfigSection::Component => {
                let session = match event.writer {
                    Writer::Interaction { session } => session,
                    _ => SessionId::new(),
                };
                self.inner
                    .interactions
                    .observe_config(component, &event.value, session);
            }
            ConfigSection::Interaction => match serde_json::from_value::<InteractionSection>(event.value) {
                Ok(section) => self.inner.interactions.register(event.component_id, section),
                Err(err) => warn!(component_id = component, error = %err, "Ignoring interaction section"),
            },
            ConfigSection::Base => {}
        }
    }

    fn apply_write(&self, write: PropertyWrite) -> Result<WriteOutcome> {
        let target = write.target_component.as_str();
        let mut section = self
            .inner
            .state
            .section(target, ConfigSection::Component)
            .ok_or_else(|| RuntimeError::UnknownComponent(write.target_component.clone()))?;
        apply_property_write(&mut section, &write.property, write.value, write.mode);
        Ok(self.inner.state.update_section(
            target,
            ConfigSection::Component,
            section,
            WriteOptions::interaction(write.session),
        )?)
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            widgets: self.inner.widgets.len(),
            executions: self.inner.executions.load(Ordering::Relaxed),
            discarded_results: self.inner.discarded.load(Ordering::Relaxed),
            polling: self.inner.scheduler.statistics(),
            cache: self.inner.warehouse.performance_metrics(),
            storage: self.inner.warehouse.storage_stats(),
            interactions: self.inner.interactions.stats(),
        }
    }
}

async fn run_detached(weak: Weak<RuntimeInner>, component: ComponentId) {
    let Some(inner) = weak.upgrade() else { return };
    let runtime = DashboardRuntime { inner };
    if let Err(err) = runtime.execute(component.as_str()).await {
        debug!(component_id = %component, error = %err, "Triggered execution skipped");
    }
}

async fn listen_configuration(
    weak: Weak<RuntimeInner>,
    mut events: broadcast::Receiver<ConfigurationUpdateEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(inner) = weak.upgrade() else { return };
                DashboardRuntime { inner }.on_configuration_event(event);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "Configuration listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn consume_writes(weak: Weak<RuntimeInner>, mut writes: mpsc::Receiver<PropertyWrite>) {
    while let Some(write) = writes.recv().await {
        let Some(inner) = weak.upgrade() else { return };
        let target = write.target_component.clone();
        let property = write.property.clone();
        match (DashboardRuntime { inner }).apply_write(write) {
            Ok(outcome) => debug!(component_id = %target, %property, ?outcome, "Interaction write applied"),
            Err(err) => warn!(component_id = %target, %property, error = %err, "Interaction write failed"),
        }
    }
}

async fn listen_socket(
    weak: Weak<RuntimeInner>,
    component: ComponentId,
    url: String,
    protocols: Vec<String>,
    retry: Duration,
) {
    loop {
        match connect(&url, &protocols).await {
            Ok(mut stream) => {
                info!(component_id = %component, %url, "Socket trigger connected");
                while let Some(frame) = stream.next().await {
                    match frame {
                        Ok(Message::Text(_) | Message::Binary(_)) => {
                            run_detached(weak.clone(), component.clone()).await;
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(err) => {
                            warn!(component_id = %component, %url, error = %err, "Socket trigger failed");
                            break;
                        }
                    }
                }
            }
            Err(err) => warn!(component_id = %component, %url, error = %err, "Socket trigger could not connect"),
        }
        if weak.strong_count() == 0 {
            return;
        }
        tokio::time::sleep(retry).await;
    }
}

type SocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(url: &str, protocols: &[String]) -> std::result::Result<SocketStream, String> {
    let mut request = url.into_client_request().map_err(|e| e.to_string())?;
    if !protocols.is_empty() {
        let header = HeaderValue::from_str(&protocols.join(", ")).map_err(|e| e.to_string())?;
        request.headers_mut().insert("Sec-WebSocket-Protocol", header);
    }
    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| e.to_string())?;
    Ok(stream)
}
