//! End-to-end tests for the dashboard runtime

use async_trait::async_trait;
use dashflow_config::{ConfigError, ConfigSection, WriteOptions, WriteOutcome};
use dashflow_core::{DashboardRuntime, PollingSettings, RuntimeError, RuntimeSettings, WidgetDefinition};
use dashflow_pipeline::{DataFetcher, FetchError};
use dashflow_test_utils::{
    climate_requirement, http_input, manual_config, static_definition, static_input, static_item,
    temperature_requirement, TestHttpServer,
};
use dashflow_types::{FetchSpec, MergeStrategy, TriggerConfig};
use dashflow_warehouse::WarehouseConfig;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Serves static values after a delay so runs can be overtaken
struct SlowFetcher {
    delay: Duration,
}

#[async_trait]
impl DataFetcher for SlowFetcher {
    async fn fetch(&self, spec: &FetchSpec) -> Result<Value, FetchError> {
        tokio::time::sleep(self.delay).await;
        match spec {
            FetchSpec::Static { value } => Ok(value.clone()),
            _ => Err(FetchError::SocketClosed),
        }
    }
}

fn runtime() -> DashboardRuntime {
    let runtime = DashboardRuntime::create(RuntimeSettings::default()).unwrap();
    runtime.initialize().unwrap();
    runtime
}

fn slow_runtime(delay: Duration) -> DashboardRuntime {
    let runtime = DashboardRuntime::create_with_fetcher(RuntimeSettings::default(), Arc::new(SlowFetcher { delay }));
    runtime.initialize().unwrap();
    runtime
}

fn gauge(value: Value) -> WidgetDefinition {
    WidgetDefinition::new(temperature_requirement("gauge"), vec![static_input("sensor", value)])
}

#[tokio::test(start_paused = true)]
async fn static_widget_produces_integrated_payload() {
    let runtime = runtime();
    runtime.add_widget(gauge(json!({"temperature": 25.6}))).unwrap();

    let payload = runtime.execute("gauge").await.unwrap();
    assert_eq!(payload.into_value(), json!({"sensor": {"temperature": 25.6}}));
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"temperature": 25.6}})
    );
    assert_eq!(runtime.stats().storage.total_components, 1);
}

#[tokio::test(start_paused = true)]
async fn adding_a_widget_runs_its_pipeline() {
    let runtime = runtime();
    runtime.add_widget(gauge(json!({"temperature": 19}))).unwrap();
    assert!(runtime.payload("gauge").is_none());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"temperature": 19}})
    );
    assert_eq!(runtime.stats().executions, 1);
}

#[tokio::test]
async fn missing_required_source_leaves_runtime_untouched() {
    let runtime = runtime();
    let widget = WidgetDefinition::new(climate_requirement("climate"), vec![static_input("temp", json!(21))]);

    let err = runtime.add_widget(widget).unwrap_err();
    match &err {
        RuntimeError::Config(ConfigError::MissingRequiredSource { source_id, .. }) => {
            assert_eq!(source_id.as_str(), "humidity");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_config());
    assert!(!runtime.contains_widget("climate"));
    assert!(!runtime.state().contains("climate"));
}

#[tokio::test(start_paused = true)]
async fn rejected_component_section_leaves_runtime_untouched() {
    let runtime = runtime();
    let err = runtime
        .add_widget(gauge(json!({"temperature": 1})).with_component(json!([1, 2])))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Config(ConfigError::InvalidSectionShape {
            section: ConfigSection::Component,
            ..
        })
    ));
    assert!(!runtime.contains_widget("gauge"));
    assert!(!runtime.state().contains("gauge"));
    assert!(!runtime.interactions().is_registered("gauge"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runtime.stats().executions, 0);
    assert_eq!(runtime.scheduler().statistics().total_tasks, 0);
}

#[tokio::test(start_paused = true)]
async fn identical_inputs_are_a_no_op() {
    let runtime = runtime();
    runtime.add_widget(gauge(json!({"temperature": 1}))).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = runtime
        .update_inputs("gauge", &[static_input("sensor", json!({"temperature": 1}))])
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Unchanged);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runtime.stats().executions, 1);

    let outcome = runtime
        .update_inputs("gauge", &[static_input("sensor", json!({"temperature": 2}))])
        .unwrap();
    assert!(outcome.is_applied());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"temperature": 2}})
    );
}

#[tokio::test(start_paused = true)]
async fn cached_payload_expires_after_ttl() {
    let settings = RuntimeSettings::default()
        .with_warehouse(WarehouseConfig::default().with_default_ttl(Duration::from_secs(1)));
    let runtime = DashboardRuntime::create(settings).unwrap();
    runtime.initialize().unwrap();
    runtime.add_widget(gauge(json!({"temperature": 3}))).unwrap();
    runtime.execute("gauge").await.unwrap();

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(runtime.payload("gauge").is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(runtime.payload("gauge").is_none());
}

#[tokio::test(start_paused = true)]
async fn widgets_are_isolated() {
    let runtime = runtime();
    runtime.add_widget(gauge(json!({"temperature": 10}))).unwrap();
    runtime
        .add_widget(WidgetDefinition::new(
            temperature_requirement("other"),
            vec![static_input("sensor", json!({"temperature": 99}))],
        ))
        .unwrap();
    runtime.execute("gauge").await.unwrap();
    runtime.execute("other").await.unwrap();

    assert!(runtime.remove_widget("other"));
    assert!(!runtime.remove_widget("other"));
    assert!(runtime.payload("other").is_none());
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"temperature": 10}})
    );

    let storage = runtime.stats().storage;
    assert_eq!(storage.total_components, 1);
    assert!(storage.component_stats.contains_key("gauge"));
    assert!(matches!(
        runtime.execute("other").await,
        Err(RuntimeError::UnknownComponent(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn result_for_removed_widget_is_discarded() {
    let runtime = slow_runtime(Duration::from_secs(1));
    runtime.add_widget(gauge(json!({"temperature": 5}))).unwrap();

    let background = runtime.clone();
    let run = tokio::spawn(async move { background.execute("gauge").await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    runtime.remove_widget("gauge");

    assert!(matches!(run.await.unwrap(), Err(RuntimeError::UnknownComponent(_))));
    assert!(runtime.payload("gauge").is_none());
    assert!(runtime.stats().discarded_results >= 1);
}

#[tokio::test(start_paused = true)]
async fn superseded_result_is_not_cached() {
    let runtime = slow_runtime(Duration::from_secs(1));
    runtime.add_widget(gauge(json!({"temperature": 5}))).unwrap();

    let background = runtime.clone();
    let run = tokio::spawn(async move { background.execute("gauge").await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    runtime
        .update_inputs("gauge", &[static_input("sensor", json!({"temperature": 6}))])
        .unwrap();

    let stale = run.await.unwrap().unwrap();
    assert_eq!(stale.into_value(), json!({"sensor": {"temperature": 5}}));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"temperature": 6}})
    );
}

#[tokio::test(start_paused = true)]
async fn reinitializing_polling_never_duplicates_tasks() {
    let settings = RuntimeSettings::default().with_polling(PollingSettings {
        min_interval_ms: 100,
        ..PollingSettings::default()
    });
    let runtime = DashboardRuntime::create(settings).unwrap();
    runtime.initialize().unwrap();
    runtime.add_widget(gauge(json!({"temperature": 1}))).unwrap();

    let mut config = manual_config(
        "gauge",
        vec![static_definition(
            "sensor",
            vec![static_item("t", json!({"temperature": 7}), Some("$.temperature"))],
            MergeStrategy::Object,
        )],
    );
    config.triggers = vec![TriggerConfig::Timer {
        interval_ms: 5000,
        immediate: false,
    }];
    runtime
        .state()
        .update_section(
            "gauge",
            ConfigSection::DataSource,
            serde_json::to_value(&config).unwrap(),
            WriteOptions::user(),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(runtime.scheduler().tasks_for_component("gauge").len(), 1);

    assert_eq!(runtime.reinitialize_polling(), 1);
    assert_eq!(runtime.reinitialize_polling(), 1);

    let before = runtime.stats().executions;
    tokio::time::sleep(Duration::from_millis(10_100)).await;
    assert_eq!(runtime.stats().executions, before + 2);
    assert_eq!(
        runtime.payload("gauge").unwrap().into_value(),
        json!({"sensor": {"t": 7}})
    );

    runtime.disable_global_polling();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(runtime.stats().executions, before + 2);
    assert_eq!(runtime.stats().polling.running_tasks, 1);
}

#[tokio::test]
async fn http_widget_polls_its_endpoint() {
    let server = TestHttpServer::json(json!({"humidity": 40})).await;
    let settings = RuntimeSettings::default().with_polling(PollingSettings {
        min_interval_ms: 50,
        ..PollingSettings::default()
    });
    let runtime = DashboardRuntime::create(settings).unwrap();
    runtime.initialize().unwrap();

    let mut input = http_input("humidity", &format!("{}/climate", server.url));
    input.config["interval"] = json!(100);
    input.config["filterPath"] = json!("$.humidity");
    runtime
        .add_widget(WidgetDefinition::new(climate_requirement("climate"), vec![
            static_input("temp", json!(21)),
            input,
        ]))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(server.requests().len() >= 3);
    assert_eq!(server.requests()[0].target, "/climate");
    assert_eq!(
        runtime.payload("climate").unwrap().into_value(),
        json!({"temp": 21, "humidity": 40})
    );

    assert!(runtime.remove_widget("climate"));
    let seen = server.requests().len();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(server.requests().len() <= seen + 1);
    assert_eq!(runtime.scheduler().statistics().total_tasks, 0);
    runtime.dispose();
}

#[tokio::test(start_paused = true)]
async fn dispose_clears_everything() {
    let runtime = runtime();
    runtime.add_widget(gauge(json!({"temperature": 1}))).unwrap();
    runtime.execute("gauge").await.unwrap();

    runtime.dispose();
    assert!(runtime.is_disposed());
    assert!(runtime.widget_ids().is_empty());
    assert!(runtime.payload("gauge").is_none());
    assert!(!runtime.state().contains("gauge"));
    assert!(matches!(runtime.execute("gauge").await, Err(RuntimeError::Disposed)));
}
