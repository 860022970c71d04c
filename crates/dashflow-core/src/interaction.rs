//! Interaction engine
//!
//! Watches widget payloads and component configuration, evaluates declared
//! conditions and runs actions:
//! - `navigate` goes to a [`NavigationSink`]
//! - `modifyProperty` becomes a [`PropertyWrite`] on a bounded queue that the
//!   runtime drains into the configuration state manager
//!
//! Every write belongs to an edit session. A session may touch the same
//! `(widget, property, value)` once and has a write budget, so a chain of
//! interactions that keeps feeding itself dies out instead of looping.

use chrono::{DateTime, Utc};
use dashflow_pipeline::expr::{display, loose_equals, truthy};
use dashflow_pipeline::{Expression, JsonPath, Scope};
use dashflow_types::{
    Action, ComparisonOperator, ComponentId, Condition, ContentHash, EventKind,
    InteractionCapability, InteractionEvent, InteractionSection, NavigationTarget, Payload,
    SessionId, UpdateMode,
};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Prefix marking a watched property as living in the component configuration
pub const CONFIG_PREFIX: &str = "config.";

/// Receives navigation requests
#[cfg_attr(test, mockall::automock)]
pub trait NavigationSink: Send + Sync {
    fn navigate(&self, target: &NavigationTarget, new_context: bool);
}

/// Navigator that only logs; used when no UI layer is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl NavigationSink for LoggingNavigator {
    fn navigate(&self, target: &NavigationTarget, new_context: bool) {
        match target {
            NavigationTarget::External { url } => info!(%url, new_context, "Navigate external"),
            NavigationTarget::Internal { path } => info!(%path, new_context, "Navigate internal"),
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Capacity of the cross-widget write queue
    pub queue_capacity: usize,
    /// Writes one edit session may enqueue
    pub max_writes_per_session: usize,
    /// Edit sessions remembered before the oldest is forgotten
    pub session_history: usize,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_writes_per_session: 32,
            session_history: 128,
        }
    }
}

/// Cross-widget write waiting to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyWrite {
    pub source_component: ComponentId,
    pub target_component: ComponentId,
    /// Dotted path inside the target's component section
    pub property: String,
    pub value: Value,
    pub mode: UpdateMode,
    pub session: SessionId,
}

/// Result of one action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Navigated(NavigationTarget),
    Queued {
        target_component: ComponentId,
        property: String,
    },
    /// Known action that was not carried out
    Rejected { kind: String, reason: String },
    /// Action kind the engine does not implement
    Unknown { kind: String },
}

/// Engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionStats {
    pub registered_components: usize,
    pub registered_events: usize,
    pub events_fired: u64,
    pub actions_executed: u64,
    pub navigations: u64,
    pub writes_queued: u64,
    pub writes_rejected: u64,
    pub writes_dropped: u64,
    pub unknown_actions: u64,
    pub last_fired: Option<DateTime<Utc>>,
}

struct Registration {
    events: Vec<InteractionEvent>,
    capability: Option<InteractionCapability>,
    last_values: HashMap<String, Value>,
}

#[derive(Default)]
struct SessionState {
    visited: HashSet<(ComponentId, String, ContentHash)>,
    writes: usize,
}

/// Visited sets and write budgets per edit session
struct EditSessions {
    sessions: IndexMap<SessionId, SessionState>,
    capacity: usize,
    budget: usize,
}

impl EditSessions {
    fn new(capacity: usize, budget: usize) -> Self {
        Self {
            sessions: IndexMap::new(),
            capacity: capacity.max(1),
            budget,
        }
    }

    fn admit(&mut self, write: &PropertyWrite) -> Result<(), String> {
        if !self.sessions.contains_key(&write.session) {
            while self.sessions.len() >= self.capacity {
                self.sessions.shift_remove_index(0);
            }
        }
        let state = self.sessions.entry(write.session).or_default();
        if state.writes >= self.budget {
            return Err(format!("edit session {} exhausted its write budget", write.session));
        }
        let key = (
            write.target_component.clone(),
            write.property.clone(),
            ContentHash::of_value(&write.value),
        );
        if !state.visited.insert(key) {
            return Err(format!(
                "edit session {} already wrote this value to {}.{}",
                write.session, write.target_component, write.property
            ));
        }
        state.writes += 1;
        Ok(())
    }
}

/// Evaluates interaction declarations for every registered widget
pub struct InteractionEngine {
    navigator: Arc<dyn NavigationSink>,
    registrations: DashMap<ComponentId, Registration>,
    writes: mpsc::Sender<PropertyWrite>,
    sessions: Mutex<EditSessions>,
    stats: Mutex<InteractionStats>,
}

impl std::fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("components", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

impl InteractionEngine {
    /// Create the engine and the receiving end of its write queue
    #[must_use]
    pub fn new(
        settings: &InteractionSettings,
        navigator: Arc<dyn NavigationSink>,
    ) -> (Self, mpsc::Receiver<PropertyWrite>) {
        let (writes, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let engine = Self {
            navigator,
            registrations: DashMap::new(),
            writes,
            sessions: Mutex::new(EditSessions::new(
                settings.session_history,
                settings.max_writes_per_session,
            )),
            stats: Mutex::new(InteractionStats::default()),
        };
        (engine, receiver)
    }

    /// Register or replace a widget's declarations
    ///
    /// Previously observed values are kept so re-registering does not
    /// re-fire every watcher.
    pub fn register(&self, component: impl Into<ComponentId>, section: InteractionSection) {
        let component = component.into();
        let mut events = section.events;
        events.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!(component_id = %component, events = events.len(), "Interactions registered");

        let mut registration = self.registrations.entry(component).or_insert_with(|| Registration {
            events: Vec::new(),
            capability: None,
            last_values: HashMap::new(),
        });
        registration.events = events;
        registration.capability = section.capability;
    }

    pub fn unregister(&self, component: &str) -> bool {
        self.registrations.remove(component).is_some()
    }

    #[must_use]
    pub fn is_registered(&self, component: &str) -> bool {
        self.registrations.contains_key(component)
    }

    /// Fire `dataChange` watchers on the widget's pipeline output
    pub fn observe_payload(&self, component: &str, payload: &Payload, session: SessionId) -> Vec<ActionOutcome> {
        let root = Value::Object(payload.as_map().clone());
        self.observe(component, &root, session, false)
    }

    /// Fire `dataChange` watchers declared as `config.<property>`
    pub fn observe_config(&self, component: &str, section: &Value, session: SessionId) -> Vec<ActionOutcome> {
        self.observe(component, section, session, true)
    }

    /// Fire `click` or `hover` handlers with `data` as the condition value
    pub fn trigger(&self, component: &str, event: EventKind, data: &Value, session: SessionId) -> Vec<ActionOutcome> {
        let fired: Vec<InteractionEvent> = match self.registrations.get(component) {
            Some(registration) => registration
                .events
                .iter()
                .filter(|e| e.enabled && e.event == event)
                .cloned()
                .collect(),
            None => return Vec::new(),
        };

        fired
            .iter()
            .filter(|e| e.condition.as_ref().map_or(true, |c| evaluate_condition(c, data)))
            .flat_map(|e| self.run_actions(component, e, session))
            .collect()
    }

    fn observe(&self, component: &str, root: &Value, session: SessionId, config: bool) -> Vec<ActionOutcome> {
        let mut fired = Vec::new();
        {
            let Some(mut registration) = self.registrations.get_mut(component) else {
                return Vec::new();
            };
            let registration = &mut *registration;
            let mut observed: HashMap<String, Value> = HashMap::new();
            for event in &registration.events {
                if !event.enabled || event.event != EventKind::DataChange {
                    continue;
                }
                let Some(watched) = event.watched_property.as_deref() else {
                    continue;
                };
                let path = match (config, watched.strip_prefix(CONFIG_PREFIX)) {
                    (true, Some(property)) => property,
                    (false, None) => watched,
                    _ => continue,
                };
                let current = resolve(root, path);
                let changed = match registration.last_values.get(watched) {
                    Some(previous) => *previous != current,
                    None => !current.is_null(),
                };
                if !changed {
                    continue;
                }
                if event.condition.as_ref().map_or(true, |c| evaluate_condition(c, &current)) {
                    fired.push(event.clone());
                }
                observed.insert(watched.to_string(), current);
            }
            // Recorded after the loop so every handler on a property sees the same change
            registration.last_values.extend(observed);
        }

        fired
            .iter()
            .flat_map(|e| self.run_actions(component, e, session))
            .collect()
    }

    fn run_actions(&self, component: &str, event: &InteractionEvent, session: SessionId) -> Vec<ActionOutcome> {
        {
            let mut stats = self.stats.lock();
            stats.events_fired += 1;
            stats.last_fired = Some(Utc::now());
        }
        debug!(component_id = component, event = ?event.event, "Interaction fired");
        event
            .responses
            .iter()
            .map(|action| self.execute_action(component, action, session))
            .collect()
    }

    fn execute_action(&self, component: &str, action: &Action, session: SessionId) -> ActionOutcome {
        self.stats.lock().actions_executed += 1;
        match action {
            Action::Navigate { target, new_context } => {
                self.navigator.navigate(target, *new_context);
                self.stats.lock().navigations += 1;
                ActionOutcome::Navigated(target.clone())
            }
            Action::ModifyProperty {
                target_component,
                target_property,
                value,
                update_mode,
            } => {
                let write = PropertyWrite {
                    source_component: ComponentId::from(component),
                    target_component: target_component.clone(),
                    property: target_property.clone(),
                    value: value.clone(),
                    mode: *update_mode,
                    session,
                };
                match self.enqueue(write) {
                    Ok(()) => ActionOutcome::Queued {
                        target_component: target_component.clone(),
                        property: target_property.clone(),
                    },
                    Err(reason) => {
                        warn!(component_id = component, %target_component, property = %target_property, %reason, "Property write rejected");
                        ActionOutcome::Rejected {
                            kind: action.kind().to_string(),
                            reason,
                        }
                    }
                }
            }
            Action::Unknown { kind, .. } => {
                warn!(component_id = component, action = %kind, "Unknown interaction action");
                self.stats.lock().unknown_actions += 1;
                ActionOutcome::Unknown { kind: kind.clone() }
            }
        }
    }

    fn enqueue(&self, write: PropertyWrite) -> Result<(), String> {
        let permitted = match self.registrations.get(write.target_component.as_str()) {
            None => Err(format!("unknown target component '{}'", write.target_component)),
            Some(target) => match &target.capability {
                Some(capability) if !capability.exposes(&write.property) => Err(format!(
                    "'{}' does not expose property '{}'",
                    write.target_component, write.property
                )),
                _ => Ok(()),
            },
        };
        if let Err(reason) = permitted.and_then(|()| self.sessions.lock().admit(&write)) {
            self.stats.lock().writes_rejected += 1;
            return Err(reason);
        }

        match self.writes.try_send(write) {
            Ok(()) => {
                self.stats.lock().writes_queued += 1;
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.lock().writes_dropped += 1;
                Err("write queue is full".to_string())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.lock().writes_dropped += 1;
                Err("write queue is closed".to_string())
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> InteractionStats {
        let mut stats = self.stats.lock().clone();
        stats.registered_components = self.registrations.len();
        stats.registered_events = self.registrations.iter().map(|r| r.events.len()).sum();
        stats
    }
}

fn resolve(root: &Value, path: &str) -> Value {
    match JsonPath::parse(path) {
        Ok(path) => path.select(root).unwrap_or(Value::Null),
        Err(err) => {
            debug!(%path, error = %err, "Unparseable watched property");
            Value::Null
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// True when `value` satisfies `condition`
#[must_use]
pub fn evaluate_condition(condition: &Condition, value: &Value) -> bool {
    match condition {
        Condition::Comparison { operator, value: expected } => compare(*operator, value, expected),
        Condition::Range { min, max } => as_number(value).is_some_and(|n| {
            min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
        }),
        Condition::Expression { expr } => {
            let scope = Scope::new().with("value", value.clone());
            match Expression::parse(expr).and_then(|e| e.evaluate(&scope)) {
                Ok(result) => truthy(&result),
                Err(err) => {
                    warn!(%expr, error = %err, "Condition expression failed");
                    false
                }
            }
        }
    }
}

fn compare(operator: ComparisonOperator, actual: &Value, expected: &Value) -> bool {
    use ComparisonOperator as Op;
    let ordered = |accept: fn(std::cmp::Ordering) -> bool| match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).is_some_and(accept),
        _ => match (actual, expected) {
            (Value::String(a), Value::String(b)) => accept(a.cmp(b)),
            _ => false,
        },
    };
    match operator {
        Op::Equals => loose_equals(actual, expected),
        Op::NotEquals => !loose_equals(actual, expected),
        Op::GreaterThan => ordered(std::cmp::Ordering::is_gt),
        Op::LessThan => ordered(std::cmp::Ordering::is_lt),
        Op::GreaterThanOrEqual => ordered(std::cmp::Ordering::is_ge),
        Op::LessThanOrEqual => ordered(std::cmp::Ordering::is_le),
        Op::Contains => match actual {
            Value::Array(items) => items.iter().any(|item| loose_equals(item, expected)),
            Value::String(s) => s.contains(&display(expected)),
            _ => false,
        },
        Op::StartsWith => actual.as_str().is_some_and(|s| s.starts_with(&display(expected))),
        Op::EndsWith => actual.as_str().is_some_and(|s| s.ends_with(&display(expected))),
    }
}

/// Apply a property write to a component section, creating objects along `property`
pub fn apply_property_write(section: &mut Value, property: &str, value: Value, mode: UpdateMode) {
    let mut slot = section;
    for key in property.split('.').filter(|k| !k.is_empty()) {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        slot = match slot {
            Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
            _ => return,
        };
    }
    let current = std::mem::take(slot);
    *slot = combine(current, value, mode);
}

fn combine(current: Value, value: Value, mode: UpdateMode) -> Value {
    match (mode, current) {
        (UpdateMode::Replace, _) | (_, Value::Null) => value,
        (UpdateMode::Append, Value::Array(mut items)) => {
            items.push(value);
            Value::Array(items)
        }
        (UpdateMode::Prepend, Value::Array(mut items)) => {
            items.insert(0, value);
            Value::Array(items)
        }
        (UpdateMode::Append, Value::String(s)) => Value::String(s + &display(&value)),
        (UpdateMode::Prepend, Value::String(s)) => Value::String(display(&value) + &s),
        (UpdateMode::Append, other) => Value::Array(vec![other, value]),
        (UpdateMode::Prepend, other) => Value::Array(vec![value, other]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashflow_types::{PropertySpec, SourceId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine() -> (InteractionEngine, mpsc::Receiver<PropertyWrite>) {
        InteractionEngine::new(&InteractionSettings::default(), Arc::new(LoggingNavigator))
    }

    fn modify(target: &str, property: &str, value: Value) -> Action {
        Action::ModifyProperty {
            target_component: target.into(),
            target_property: property.into(),
            value,
            update_mode: UpdateMode::Replace,
        }
    }

    fn payload(value: Value) -> Payload {
        let mut payload = Payload::new();
        payload.insert(&SourceId::from("sensor"), value);
        payload
    }

    #[test]
    fn comparison_operators() {
        let cmp = |operator, actual: Value, expected: Value| {
            evaluate_condition(&Condition::Comparison { operator, value: expected }, &actual)
        };
        assert!(cmp(ComparisonOperator::Equals, json!(1), json!(1.0)));
        assert!(cmp(ComparisonOperator::NotEquals, json!("a"), json!("b")));
        assert!(cmp(ComparisonOperator::GreaterThan, json!(30), json!(25)));
        assert!(cmp(ComparisonOperator::GreaterThan, json!("30"), json!(25)));
        assert!(!cmp(ComparisonOperator::LessThan, json!(30), json!(25)));
        assert!(cmp(ComparisonOperator::GreaterThanOrEqual, json!(25), json!(25)));
        assert!(cmp(ComparisonOperator::LessThanOrEqual, json!(24.9), json!(25)));
        assert!(cmp(ComparisonOperator::Contains, json!("overheat"), json!("heat")));
        assert!(cmp(ComparisonOperator::Contains, json!([1, 2, 3]), json!(2)));
        assert!(cmp(ComparisonOperator::StartsWith, json!("alert:high"), json!("alert")));
        assert!(cmp(ComparisonOperator::EndsWith, json!("alert:high"), json!("high")));
        assert!(!cmp(ComparisonOperator::GreaterThan, json!(true), json!(1)));
    }

    #[test]
    fn range_is_inclusive_and_open_ended() {
        let range = Condition::Range {
            min: Some(10.0),
            max: Some(20.0),
        };
        assert!(evaluate_condition(&range, &json!(10)));
        assert!(evaluate_condition(&range, &json!(20)));
        assert!(!evaluate_condition(&range, &json!(20.5)));
        assert!(!evaluate_condition(&range, &json!("n/a")));

        let open = Condition::Range { min: Some(0.0), max: None };
        assert!(evaluate_condition(&open, &json!(1e9)));
    }

    #[test]
    fn expression_condition_binds_value() {
        let condition = Condition::Expression {
            expr: "value > 20 && value < 30".into(),
        };
        assert!(evaluate_condition(&condition, &json!(25.6)));
        assert!(!evaluate_condition(&condition, &json!(31)));

        let broken = Condition::Expression { expr: "value >".into() };
        assert!(!evaluate_condition(&broken, &json!(1)));
    }

    #[test]
    fn data_change_fires_once_per_distinct_value() {
        let (engine, mut rx) = engine();
        engine.register("label", InteractionSection::default());
        engine.register(
            "gauge",
            InteractionSection {
                events: vec![InteractionEvent::on_change("sensor.temperature")
                    .when(Condition::Comparison {
                        operator: ComparisonOperator::GreaterThan,
                        value: json!(25),
                    })
                    .then(modify("label", "text", json!("hot")))],
                capability: None,
            },
        );

        let session = SessionId::new();
        let hot = payload(json!({"temperature": 25.6}));
        let outcomes = engine.observe_payload("gauge", &hot, session);
        assert_eq!(outcomes, vec![ActionOutcome::Queued {
            target_component: "label".into(),
            property: "text".into(),
        }]);
        assert!(engine.observe_payload("gauge", &hot, SessionId::new()).is_empty());

        let write = rx.try_recv().unwrap();
        assert_eq!(write.target_component.as_str(), "label");
        assert_eq!(write.value, json!("hot"));
        assert_eq!(write.session, session);

        let cold = payload(json!({"temperature": 20}));
        assert!(engine.observe_payload("gauge", &cold, session).is_empty());
        assert_eq!(engine.stats().events_fired, 1);
    }

    #[test]
    fn every_handler_on_a_property_sees_the_change() {
        let (engine, _rx) = engine();
        engine.register("a", InteractionSection::default());
        engine.register("b", InteractionSection::default());
        engine.register(
            "gauge",
            InteractionSection {
                events: vec![
                    InteractionEvent::on_change("sensor.temperature").then(modify("a", "text", json!("warm"))),
                    InteractionEvent::on_change("sensor.temperature").then(modify("b", "text", json!("warm"))),
                ],
                capability: None,
            },
        );

        let warm = payload(json!({"temperature": 30}));
        let outcomes = engine.observe_payload("gauge", &warm, SessionId::new());
        assert_eq!(outcomes, vec![
            ActionOutcome::Queued {
                target_component: "a".into(),
                property: "text".into(),
            },
            ActionOutcome::Queued {
                target_component: "b".into(),
                property: "text".into(),
            },
        ]);
        assert!(engine.observe_payload("gauge", &warm, SessionId::new()).is_empty());
        assert_eq!(engine.stats().events_fired, 2);
    }

    #[test]
    fn null_first_observation_does_not_fire() {
        let mut navigator = MockNavigationSink::new();
        navigator.expect_navigate().times(1).return_const(());
        let (engine, _rx) = InteractionEngine::new(&InteractionSettings::default(), Arc::new(navigator));

        let section = InteractionSection {
            events: vec![InteractionEvent::on_change("sensor.status").then(Action::Navigate {
                target: NavigationTarget::Internal { path: "/alerts".into() },
                new_context: false,
            })],
            capability: None,
        };
        engine.register("w", section);
        assert!(engine.observe_payload("w", &payload(json!({})), SessionId::new()).is_empty());
        let outcomes = engine.observe_payload("w", &payload(json!({"status": "down"})), SessionId::new());
        assert!(matches!(outcomes.as_slice(), [ActionOutcome::Navigated(_)]));
    }

    #[test]
    fn config_watchers_only_see_component_section() {
        let (engine, mut rx) = engine();
        engine.register("label", InteractionSection::default());
        engine.register(
            "switch",
            InteractionSection {
                events: vec![InteractionEvent::on_change("config.enabled").then(modify("label", "visible", json!(true)))],
                capability: None,
            },
        );
        assert!(engine
            .observe_payload("switch", &payload(json!({"enabled": true})), SessionId::new())
            .is_empty());
        let outcomes = engine.observe_config("switch", &json!({"enabled": true}), SessionId::new());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(rx.try_recv().unwrap().property, "visible");
    }

    #[test]
    fn priority_orders_handlers_and_disabled_are_skipped() {
        let (engine, mut rx) = engine();
        engine.register("t", InteractionSection::default());
        let mut disabled = InteractionEvent::new(EventKind::Click).then(modify("t", "c", json!(3)));
        disabled.enabled = false;
        engine.register(
            "button",
            InteractionSection {
                events: vec![
                    InteractionEvent::new(EventKind::Click).then(modify("t", "a", json!(1))),
                    InteractionEvent::new(EventKind::Click)
                        .with_priority(10)
                        .then(modify("t", "b", json!(2))),
                    disabled,
                    InteractionEvent::new(EventKind::Hover).then(modify("t", "d", json!(4))),
                ],
                capability: None,
            },
        );

        let outcomes = engine.trigger("button", EventKind::Click, &Value::Null, SessionId::new());
        assert_eq!(outcomes.len(), 2);
        assert_eq!(rx.try_recv().unwrap().property, "b");
        assert_eq!(rx.try_recv().unwrap().property, "a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn capability_and_unknown_targets_reject() {
        let (engine, mut rx) = engine();
        let mut capability = InteractionCapability::default();
        capability.watchable_properties.insert("title".into(), PropertySpec::default());
        engine.register(
            "card",
            InteractionSection {
                events: Vec::new(),
                capability: Some(capability),
            },
        );
        engine.register(
            "button",
            InteractionSection {
                events: vec![InteractionEvent::new(EventKind::Click)
                    .then(modify("card", "color", json!("red")))
                    .then(modify("card", "title", json!("Hi")))
                    .then(modify("ghost", "title", json!("Boo")))
                    .then(Action::Unknown {
                        kind: "playSound".into(),
                        raw: json!({"action": "playSound"}),
                    })],
                capability: None,
            },
        );

        let outcomes = engine.trigger("button", EventKind::Click, &Value::Null, SessionId::new());
        assert!(matches!(&outcomes[0], ActionOutcome::Rejected { kind, .. } if kind == "modifyProperty"));
        assert!(matches!(&outcomes[1], ActionOutcome::Queued { .. }));
        assert!(matches!(&outcomes[2], ActionOutcome::Rejected { .. }));
        assert_eq!(outcomes[3], ActionOutcome::Unknown { kind: "playSound".into() });
        assert_eq!(rx.try_recv().unwrap().property, "title");

        let stats = engine.stats();
        assert_eq!(stats.writes_rejected, 2);
        assert_eq!(stats.unknown_actions, 1);
        assert_eq!(stats.actions_executed, 4);
    }

    #[test]
    fn session_visits_each_write_once_and_has_budget() {
        let settings = InteractionSettings {
            max_writes_per_session: 2,
            ..InteractionSettings::default()
        };
        let (engine, _rx) = InteractionEngine::new(&settings, Arc::new(LoggingNavigator));
        engine.register("t", InteractionSection::default());
        let session = SessionId::new();
        let write = |value: Value| PropertyWrite {
            source_component: "s".into(),
            target_component: "t".into(),
            property: "p".into(),
            value,
            mode: UpdateMode::Replace,
            session,
        };
        assert!(engine.enqueue(write(json!(1))).is_ok());
        assert!(engine.enqueue(write(json!(1))).is_err());
        assert!(engine.enqueue(write(json!(2))).is_ok());
        assert!(engine.enqueue(write(json!(3))).is_err());
    }

    #[test]
    fn full_queue_drops_writes() {
        let settings = InteractionSettings {
            queue_capacity: 1,
            ..InteractionSettings::default()
        };
        let (engine, _rx) = InteractionEngine::new(&settings, Arc::new(LoggingNavigator));
        engine.register("t", InteractionSection::default());
        let button = InteractionSection {
            events: vec![InteractionEvent::new(EventKind::Click)
                .then(modify("t", "a", json!(1)))
                .then(modify("t", "b", json!(2)))],
            capability: None,
        };
        engine.register("b", button);
        let outcomes = engine.trigger("b", EventKind::Click, &Value::Null, SessionId::new());
        assert!(matches!(&outcomes[1], ActionOutcome::Rejected { reason, .. } if reason.contains("full")));
        assert_eq!(engine.stats().writes_dropped, 1);
    }

    #[test]
    fn update_modes() {
        let mut section = json!({"tags": ["a"], "title": "Temp"});
        apply_property_write(&mut section, "tags", json!("b"), UpdateMode::Append);
        apply_property_write(&mut section, "tags", json!("z"), UpdateMode::Prepend);
        apply_property_write(&mut section, "title", json!(" (C)"), UpdateMode::Append);
        apply_property_write(&mut section, "style.color", json!("red"), UpdateMode::Replace);
        apply_property_write(&mut section, "count", json!(1), UpdateMode::Append);
        assert_eq!(
            section,
            json!({
                "tags": ["z", "a", "b"],
                "title": "Temp (C)",
                "style": {"color": "red"},
                "count": 1
            })
        );
    }

    proptest::proptest! {
        #[test]
        fn replace_always_lands_at_path(
            keys in proptest::collection::vec("[a-z]{1,6}", 1..4),
            value in proptest::num::i64::ANY,
        ) {
            let mut section = json!({"title": "x"});
            let path = keys.join(".");
            apply_property_write(&mut section, &path, json!(value), UpdateMode::Replace);
            let pointer = format!("/{}", keys.join("/"));
            proptest::prop_assert_eq!(section.pointer(&pointer), Some(&json!(value)));
        }

        #[test]
        fn range_matches_bounds(min in -1000i64..1000, span in 0i64..1000, probe in -3000i64..3000) {
            let condition = Condition::Range {
                min: Some(min as f64),
                max: Some((min + span) as f64),
            };
            let inside = probe >= min && probe <= min + span;
            proptest::prop_assert_eq!(evaluate_condition(&condition, &json!(probe)), inside);
        }
    }
}
