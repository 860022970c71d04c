//! Interaction declarations
//!
//! A widget declares [`InteractionEvent`]s (what to watch, when to fire, what
//! to do) and an [`InteractionCapability`] (what others may watch or mutate
//! on it). Actions are a closed set; anything else deserializes into
//! [`Action::Unknown`] so it can be reported instead of failing the whole
//! declaration.

use crate::ids::ComponentId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event that can fire an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Click,
    Hover,
    /// A watched property changed value
    DataChange,
}

/// Comparison operators for [`Condition::Comparison`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

/// Guard evaluated against the new value before actions run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Condition {
    /// Compare against a literal
    Comparison {
        operator: ComparisonOperator,
        value: Value,
    },
    /// Inclusive numeric range; a missing bound is open
    Range {
        #[serde(default, alias = "minValue", skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, alias = "maxValue", skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Restricted expression with `value` in scope
    Expression { expr: String },
}

/// Where a navigate action goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NavigationTarget {
    External { url: String },
    Internal { path: String },
}

/// How a modify action combines with the current property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum KnownAction {
    Navigate {
        target: NavigationTarget,
        #[serde(default)]
        new_context: bool,
    },
    ModifyProperty {
        target_component: ComponentId,
        target_property: String,
        value: Value,
        #[serde(default)]
        update_mode: UpdateMode,
    },
}

/// Response executed when an interaction fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Action {
    /// Open an external URL or internal path
    Navigate {
        target: NavigationTarget,
        new_context: bool,
    },
    /// Write a value into a peer widget's component configuration
    ModifyProperty {
        target_component: ComponentId,
        target_property: String,
        value: Value,
        update_mode: UpdateMode,
    },
    /// Action kind this engine does not know
    Unknown { kind: String, raw: Value },
}

impl Action {
    /// Action name as it appears in declarations
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::ModifyProperty { .. } => "modifyProperty",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

impl TryFrom<Value> for Action {
    type Error = serde_json::Error;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let kind = raw
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if kind != "navigate" && kind != "modifyProperty" {
            return Ok(Self::Unknown { kind, raw });
        }
        Ok(match serde_json::from_value::<KnownAction>(raw)? {
            KnownAction::Navigate {
                target,
                new_context,
            } => Self::Navigate {
                target,
                new_context,
            },
            KnownAction::ModifyProperty {
                target_component,
                target_property,
                value,
                update_mode,
            } => Self::ModifyProperty {
                target_component,
                target_property,
                value,
                update_mode,
            },
        })
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        let known = match action {
            Action::Unknown { raw, .. } => return raw,
            Action::Navigate {
                target,
                new_context,
            } => KnownAction::Navigate {
                target,
                new_context,
            },
            Action::ModifyProperty {
                target_component,
                target_property,
                value,
                update_mode,
            } => KnownAction::ModifyProperty {
                target_component,
                target_property,
                value,
                update_mode,
            },
        };
        serde_json::to_value(known).unwrap_or(Value::Object(Map::new()))
    }
}

fn default_enabled() -> bool {
    true
}

/// One declared interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub event: EventKind,
    /// Path into the widget's payload, or `config.<prop>` for its component configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub responses: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher fires first
    #[serde(default)]
    pub priority: i32,
}

impl InteractionEvent {
    /// Enabled event with no condition and no responses
    #[must_use]
    pub fn new(event: EventKind) -> Self {
        Self {
            event,
            watched_property: None,
            condition: None,
            responses: Vec::new(),
            enabled: true,
            priority: 0,
        }
    }

    /// `dataChange` event watching `property`
    #[must_use]
    pub fn on_change(property: impl Into<String>) -> Self {
        let mut event = Self::new(EventKind::DataChange);
        event.watched_property = Some(property.into());
        event
    }

    /// With condition
    #[inline]
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Append a response
    #[inline]
    #[must_use]
    pub fn then(mut self, action: Action) -> Self {
        self.responses.push(action);
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// One property a widget exposes to interactions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    #[serde(rename = "type", default)]
    pub property_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_value: Value,
}

/// Contract a widget exposes to the interaction engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionCapability {
    #[serde(default)]
    pub supported_events: Vec<EventKind>,
    #[serde(default)]
    pub available_actions: Vec<String>,
    #[serde(default)]
    pub watchable_properties: IndexMap<String, PropertySpec>,
}

impl InteractionCapability {
    /// True if `property` (or its top-level segment) is declared
    #[must_use]
    pub fn exposes(&self, property: &str) -> bool {
        let head = property.split('.').next().unwrap_or(property);
        self.watchable_properties.contains_key(property) || self.watchable_properties.contains_key(head)
    }
}

/// Contents of a widget's `interaction` configuration section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSection {
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<InteractionCapability>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn modify_property_round_trips_through_json() {
        let action = Action::ModifyProperty {
            target_component: ComponentId::from("label"),
            target_property: "text".into(),
            value: json!("hot"),
            update_mode: UpdateMode::Replace,
        };
        let raw = serde_json::to_value(&action).unwrap();
        assert_eq!(raw["action"], json!("modifyProperty"));
        assert_eq!(raw["targetComponent"], json!("label"));
        let back: Action = serde_json::from_value(raw).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn unknown_action_is_captured() {
        let action: Action = serde_json::from_value(json!({"action": "playSound", "file": "a.wav"})).unwrap();
        assert_eq!(action.kind(), "playSound");
        assert!(matches!(action, Action::Unknown { .. }));
    }

    #[test]
    fn malformed_known_action_is_an_error() {
        let result: Result<Action, _> = serde_json::from_value(json!({"action": "navigate"}));
        assert!(result.is_err());
    }

    #[test]
    fn event_declaration_parses() {
        let event: InteractionEvent = serde_json::from_value(json!({
            "event": "dataChange",
            "watchedProperty": "temp.value",
            "condition": {"type": "range", "minValue": 10, "maxValue": 20},
            "responses": [{"action": "navigate", "target": {"kind": "external", "url": "https://example.com"}, "newContext": true}]
        }))
        .unwrap();
        assert!(event.enabled);
        assert_eq!(
            event.condition,
            Some(Condition::Range {
                min: Some(10.0),
                max: Some(20.0)
            })
        );
        assert!(matches!(
            &event.responses[0],
            Action::Navigate { new_context: true, .. }
        ));
    }

    #[test]
    fn capability_matches_nested_property() {
        let mut capability = InteractionCapability::default();
        capability
            .watchable_properties
            .insert("style".into(), PropertySpec::default());
        assert!(capability.exposes("style.color"));
        assert!(!capability.exposes("title"));
    }
}
