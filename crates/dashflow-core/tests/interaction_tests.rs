//! Cross-widget interactions through the runtime

use dashflow_config::{ConfigSection, WriteOptions, Writer};
use dashflow_core::{ActionOutcome, DashboardRuntime, NavigationSink, RuntimeSettings, WidgetDefinition};
use dashflow_pipeline::{FetcherConfig, SourceFetcher};
use dashflow_test_utils::{static_input, temperature_requirement};
use dashflow_types::{
    Action, ComparisonOperator, Condition, EventKind, InteractionCapability, InteractionEvent,
    InteractionSection, NavigationTarget, PropertySpec, UpdateMode,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingNavigator {
    visits: Mutex<Vec<NavigationTarget>>,
}

impl NavigationSink for RecordingNavigator {
    fn navigate(&self, target: &NavigationTarget, _new_context: bool) {
        self.visits.lock().push(target.clone());
    }
}

fn runtime_with(navigator: Arc<RecordingNavigator>) -> DashboardRuntime {
    let fetcher = SourceFetcher::new(FetcherConfig::default()).unwrap();
    let runtime = DashboardRuntime::create_with_services(RuntimeSettings::default(), Arc::new(fetcher), navigator);
    runtime.initialize().unwrap();
    runtime
}

fn widget(id: &str, temperature: f64, interaction: InteractionSection) -> WidgetDefinition {
    WidgetDefinition::new(
        temperature_requirement(id),
        vec![static_input("sensor", json!({ "temperature": temperature }))],
    )
    .with_interaction(interaction)
}

fn modify(target: &str, property: &str, value: Value) -> Action {
    Action::ModifyProperty {
        target_component: target.into(),
        target_property: property.into(),
        value,
        update_mode: UpdateMode::Replace,
    }
}

fn events(events: Vec<InteractionEvent>) -> InteractionSection {
    InteractionSection {
        events,
        capability: None,
    }
}

#[tokio::test(start_paused = true)]
async fn payload_change_writes_into_peer_and_navigates() {
    let navigator = Arc::new(RecordingNavigator::default());
    let runtime = runtime_with(Arc::clone(&navigator));

    let hot = Condition::Comparison {
        operator: ComparisonOperator::GreaterThan,
        value: json!(25),
    };
    runtime
        .add_widget(widget(
            "gauge",
            25.6,
            events(vec![InteractionEvent::on_change("sensor.temperature")
                .when(hot)
                .then(modify("label", "text", json!("hot")))
                .then(Action::Navigate {
                    target: NavigationTarget::Internal { path: "/alerts".into() },
                    new_context: false,
                })]),
        ))
        .unwrap();
    runtime
        .add_widget(widget("label", 0.0, InteractionSection::default()).with_component(json!({"text": "idle"})))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        runtime.state().section("label", ConfigSection::Component),
        Some(json!({"text": "hot"}))
    );
    let version = runtime
        .state()
        .section_version("label", ConfigSection::Component)
        .unwrap();
    assert!(matches!(version.last_writer, Writer::Interaction { .. }));
    assert_eq!(
        navigator.visits.lock().clone(),
        vec![NavigationTarget::Internal { path: "/alerts".into() }]
    );
}

#[tokio::test(start_paused = true)]
async fn handlers_sharing_a_property_all_fire() {
    let runtime = runtime_with(Arc::default());
    for peer in ["a", "b"] {
        runtime
            .add_widget(widget(peer, 0.0, InteractionSection::default()).with_component(json!({"text": "idle"})))
            .unwrap();
    }
    runtime
        .add_widget(widget(
            "gauge",
            30.0,
            events(vec![
                InteractionEvent::on_change("sensor.temperature").then(modify("a", "text", json!("warm"))),
                InteractionEvent::on_change("sensor.temperature").then(modify("b", "text", json!("warm"))),
            ]),
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    for peer in ["a", "b"] {
        assert_eq!(
            runtime.state().section(peer, ConfigSection::Component),
            Some(json!({"text": "warm"}))
        );
    }
    assert_eq!(runtime.interactions().stats().writes_queued, 2);
}

#[tokio::test(start_paused = true)]
async fn ping_pong_between_widgets_dies_out() {
    let runtime = runtime_with(Arc::default());
    runtime
        .add_widget(widget(
            "a",
            1.0,
            events(vec![InteractionEvent::on_change("config.x").then(modify("b", "y", json!("ping")))]),
        ))
        .unwrap();
    runtime
        .add_widget(widget(
            "b",
            2.0,
            events(vec![InteractionEvent::on_change("config.y").then(modify("a", "x", json!("pong")))]),
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    runtime
        .state()
        .update_section("a", ConfigSection::Component, json!({"x": "start"}), WriteOptions::user())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(runtime.state().section("a", ConfigSection::Component), Some(json!({"x": "pong"})));
    assert_eq!(runtime.state().section("b", ConfigSection::Component), Some(json!({"y": "ping"})));

    let stats = runtime.interactions().stats();
    assert_eq!(stats.writes_queued, 2);
    assert_eq!(stats.writes_rejected, 1);
    assert_eq!(stats.events_fired, 3);
}

#[tokio::test(start_paused = true)]
async fn click_respects_target_capability() {
    let runtime = runtime_with(Arc::default());
    let mut capability = InteractionCapability::default();
    capability
        .watchable_properties
        .insert("title".into(), PropertySpec::default());
    runtime
        .add_widget(widget(
            "card",
            0.0,
            InteractionSection {
                events: Vec::new(),
                capability: Some(capability),
            },
        ))
        .unwrap();
    runtime
        .add_widget(widget(
            "button",
            0.0,
            events(vec![InteractionEvent::new(EventKind::Click)
                .then(modify("card", "title", json!("Clicked")))
                .then(modify("card", "secret", json!(true)))]),
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcomes = runtime.trigger("button", EventKind::Click, &Value::Null);
    assert!(matches!(outcomes[0], ActionOutcome::Queued { .. }));
    assert!(matches!(outcomes[1], ActionOutcome::Rejected { .. }));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        runtime.state().section("card", ConfigSection::Component),
        Some(json!({"title": "Clicked"}))
    );
}

#[tokio::test(start_paused = true)]
async fn append_mode_extends_target_list() {
    let runtime = runtime_with(Arc::default());
    runtime
        .add_widget(widget("log", 0.0, InteractionSection::default()).with_component(json!({"entries": ["boot"]})))
        .unwrap();
    let mut append = modify("log", "entries", json!("clicked"));
    if let Action::ModifyProperty { update_mode, .. } = &mut append {
        *update_mode = UpdateMode::Append;
    }
    runtime
        .add_widget(widget(
            "button",
            0.0,
            events(vec![InteractionEvent::new(EventKind::Click).then(append)]),
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    runtime.trigger("button", EventKind::Click, &Value::Null);
    runtime.trigger("button", EventKind::Click, &Value::Null);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        runtime.state().section("log", ConfigSection::Component),
        Some(json!({"entries": ["boot", "clicked", "clicked"]}))
    );
}
