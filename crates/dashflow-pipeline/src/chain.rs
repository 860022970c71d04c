//! Pipeline executor
//!
//! Runs fetch → process → merge → integrate for every data source definition
//! of a widget. Items of one definition are fetched concurrently; their
//! results are processed and merged in declaration order, and definitions are
//! integrated in declaration order.
//!
//! A failed fetch never aborts a run: the item contributes its default value
//! and the failure is reported in [`ExecutionResult::failures`].

use crate::expr::Expression;
use crate::fetcher::DataFetcher;
use crate::integrator::integrate;
use crate::merger::{merge, ProcessedItem};
use crate::path::JsonPath;
use crate::processor::process;
use crate::script::{ExpressionEngine, ScriptEngine};
use dashflow_types::{
    DataSourceConfig, DataSourceDefinition, FetchSpec, MergeStrategy, Payload, SourceId, SourceType,
    ValidationReport,
};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One item that fell back to its default value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub source_id: SourceId,
    pub item_id: String,
    pub error: String,
}

/// Per-item trace entry
#[derive(Debug, Clone, Serialize)]
pub struct ItemTrace {
    pub item_id: String,
    pub raw: Value,
    pub processed: Value,
    pub fetch_error: Option<String>,
    pub fetch_ms: u64,
}

/// Per-source trace entry
#[derive(Debug, Clone, Serialize)]
pub struct SourceTrace {
    pub source_id: SourceId,
    pub merge_strategy: &'static str,
    pub items: Vec<ItemTrace>,
    pub merged: Value,
}

/// Stage-by-stage record of one run, collected when tracing is enabled
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionTrace {
    pub sources: Vec<SourceTrace>,
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Integrated payload
    pub payload: Payload,
    /// True if no item fell back to its default
    pub success: bool,
    /// Wall time of the run
    pub elapsed: Duration,
    /// Items that fell back to their default
    pub failures: Vec<ItemFailure>,
    /// Stage trace, when enabled
    pub trace: Option<ExecutionTrace>,
}

/// Supported source types and merge strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineCapabilities {
    pub source_types: Vec<SourceType>,
    pub merge_strategies: Vec<&'static str>,
}

struct SourceOutcome {
    merged: Value,
    failures: Vec<ItemFailure>,
    trace: SourceTrace,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Runs data source configurations through the four stages
#[derive(Clone)]
pub struct PipelineExecutor {
    fetcher: Arc<dyn DataFetcher>,
    scripts: Arc<dyn ScriptEngine>,
    trace: bool,
}

impl fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("scripts", &self.scripts)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl PipelineExecutor {
    /// Create executor over a fetcher
    #[must_use]
    pub fn new(fetcher: Arc<dyn DataFetcher>) -> Self {
        Self {
            fetcher,
            scripts: Arc::new(ExpressionEngine),
            trace: false,
        }
    }

    /// Use a different script engine for script merges
    #[inline]
    #[must_use]
    pub fn with_script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.scripts = engine;
        self
    }

    /// Collect a stage trace on every run
    #[inline]
    #[must_use]
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Run a configuration and integrate the result
    pub async fn execute(&self, config: &DataSourceConfig) -> ExecutionResult {
        let started = Instant::now();
        if !config.enabled {
            debug!(widget = %config.widget_id, "config disabled, skipping run");
            return ExecutionResult {
                payload: Payload::new(),
                success: true,
                elapsed: started.elapsed(),
                failures: Vec::new(),
                trace: self.trace.then(ExecutionTrace::default),
            };
        }

        let outcomes = join_all(config.data_sources.iter().map(|def| self.execute_source(def))).await;

        let mut failures = Vec::new();
        let mut traces = Vec::with_capacity(outcomes.len());
        let mut merged = Vec::with_capacity(outcomes.len());
        for (def, outcome) in config.data_sources.iter().zip(outcomes) {
            failures.extend(outcome.failures);
            merged.push((def.id.clone(), outcome.merged));
            traces.push(outcome.trace);
        }
        let payload = integrate(merged);

        let elapsed = started.elapsed();
        info!(
            widget = %config.widget_id,
            sources = config.data_sources.len(),
            failed_items = failures.len(),
            elapsed_ms = millis(elapsed),
            "pipeline run complete"
        );

        ExecutionResult {
            payload,
            success: failures.is_empty(),
            elapsed,
            failures,
            trace: self.trace.then(|| ExecutionTrace { sources: traces }),
        }
    }

    async fn execute_source(&self, def: &DataSourceDefinition) -> SourceOutcome {
        let fetched = join_all(def.items.iter().map(|item| async move {
            let started = Instant::now();
            let result = self.fetcher.fetch(&item.fetch_spec).await;
            (result, started.elapsed())
        }))
        .await;

        let mut processed = Vec::with_capacity(def.items.len());
        let mut item_traces = Vec::new();
        let mut failures = Vec::new();
        for (item, (result, elapsed)) in def.items.iter().zip(fetched) {
            let (raw, value, fetch_error) = match result {
                Ok(raw) => {
                    let value = process(&raw, &item.processing);
                    (raw, value, None)
                }
                Err(e) => {
                    warn!(source = %def.id, item = %item.id, error = %e, "item fell back to default");
                    failures.push(ItemFailure {
                        source_id: def.id.clone(),
                        item_id: item.id.clone(),
                        error: e.to_string(),
                    });
                    (Value::Null, item.processing.default_value.clone(), Some(e.to_string()))
                }
            };
            if self.trace {
                item_traces.push(ItemTrace {
                    item_id: item.id.clone(),
                    raw,
                    processed: value.clone(),
                    fetch_error,
                    fetch_ms: millis(elapsed),
                });
            }
            processed.push(ProcessedItem::new(item.id.clone(), value));
        }

        let merged = merge(&processed, &def.merge_strategy, self.scripts.as_ref());
        SourceOutcome {
            trace: SourceTrace {
                source_id: def.id.clone(),
                merge_strategy: def.merge_strategy.name(),
                items: item_traces,
                merged: if self.trace { merged.clone() } else { Value::Null },
            },
            merged,
            failures,
        }
    }

    /// What this pipeline can run
    #[must_use]
    pub fn capabilities() -> PipelineCapabilities {
        PipelineCapabilities {
            source_types: vec![
                SourceType::Static,
                SourceType::Http,
                SourceType::Socket,
                SourceType::Script,
            ],
            merge_strategies: vec!["object", "array", "select", "script"],
        }
    }

    /// Structural checks on the data sources of a configuration
    #[must_use]
    pub fn validate(config: &DataSourceConfig) -> ValidationReport {
        let mut report = ValidationReport::new();
        if config.widget_id.is_blank() {
            report.error("widget id is missing");
        }
        if config.data_sources.is_empty() {
            report.error("at least one data source is required");
        }

        let mut source_ids = HashSet::new();
        for def in &config.data_sources {
            if def.id.is_blank() {
                report.error("data source id is missing");
            } else if !source_ids.insert(def.id.as_str()) {
                report.error(format!("duplicate data source id '{}'", def.id));
            }
            validate_definition(def, &mut report);
        }
        report
    }
}

fn validate_definition(def: &DataSourceDefinition, report: &mut ValidationReport) {
    if def.items.is_empty() {
        report.warn(format!("data source '{}' has no items", def.id));
    }

    let mut item_ids = HashSet::new();
    for item in &def.items {
        if item.id.trim().is_empty() {
            report.error(format!("data source '{}' has an item without id", def.id));
        } else if !item_ids.insert(item.id.as_str()) {
            report.error(format!("data source '{}' has duplicate item id '{}'", def.id, item.id));
        }
        if item.fetch_spec.source_type() != def.source_type {
            report.warn(format!(
                "item '{}' fetches {} inside a {} data source",
                item.id,
                item.fetch_spec.source_type(),
                def.source_type
            ));
        }
        if let Some(path) = &item.processing.filter_path {
            if let Err(e) = JsonPath::parse(path) {
                report.error(format!("item '{}' has invalid filter path '{path}': {e}", item.id));
            }
        }
        if let FetchSpec::Script(script) = &item.fetch_spec {
            if let Err(e) = Expression::parse(&script.source) {
                report.error(format!("item '{}' has invalid script: {e}", item.id));
            }
        }
    }

    match &def.merge_strategy {
        MergeStrategy::Select { index } if !def.items.is_empty() && *index >= def.items.len() => {
            report.warn(format!(
                "data source '{}' selects item {index} of {}, first item will be used",
                def.id,
                def.items.len()
            ));
        }
        MergeStrategy::Script { source } => {
            if let Err(e) = Expression::parse(source) {
                report.error(format!("data source '{}' has invalid merge script: {e}", def.id));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::MockDataFetcher;
    use dashflow_types::{DataItem, HttpSpec, ProcessingConfig, TriggerConfig};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config(data_sources: Vec<DataSourceDefinition>) -> DataSourceConfig {
        DataSourceConfig {
            id: "cfg".into(),
            widget_id: "widget".into(),
            data_sources,
            triggers: vec![TriggerConfig::Manual],
            enabled: true,
        }
    }

    fn definition(id: &str, items: Vec<DataItem>, merge_strategy: MergeStrategy) -> DataSourceDefinition {
        DataSourceDefinition {
            id: id.into(),
            source_type: SourceType::Static,
            source_config: Value::Null,
            items,
            merge_strategy,
            field_mapping: Default::default(),
        }
    }

    fn static_item(id: &str, value: Value) -> DataItem {
        DataItem::new(id, FetchSpec::Static { value })
    }

    fn passthrough() -> Arc<MockDataFetcher> {
        let mut fetcher = MockDataFetcher::new();
        fetcher.expect_fetch().returning(|spec| match spec {
            FetchSpec::Static { value } => Ok(value.clone()),
            _ => Err(FetchError::SocketClosed),
        });
        Arc::new(fetcher)
    }

    #[tokio::test]
    async fn static_item_end_to_end() {
        let item = static_item("temperature", json!({"temperature": 25.6}))
            .with_processing(ProcessingConfig::default().with_filter_path("$.temperature"));
        let cfg = config(vec![definition("sensor", vec![item], MergeStrategy::Object)]);

        let result = PipelineExecutor::new(passthrough()).execute(&cfg).await;
        assert!(result.success);
        assert_eq!(
            result.payload.into_value(),
            json!({"sensor": {"temperature": 25.6}})
        );
    }

    #[tokio::test]
    async fn failed_item_uses_default_and_others_survive() {
        let http = DataItem::new("remote", FetchSpec::Http(HttpSpec::get("http://unreachable")))
            .with_processing(ProcessingConfig::default().with_default(json!(0)));
        let local = static_item("local", json!(7));
        let cfg = config(vec![definition("mixed", vec![http, local], MergeStrategy::Array)]);

        let result = PipelineExecutor::new(passthrough()).execute(&cfg).await;
        assert!(!result.success);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].item_id, "remote");
        assert_eq!(result.payload.get("mixed"), Some(&json!([0, 7])));
    }

    #[tokio::test]
    async fn sources_are_isolated_and_ordered() {
        let cfg = config(vec![
            definition("zeta", vec![static_item("a", json!(1))], MergeStrategy::Object),
            definition("alpha", vec![static_item("a", json!(2))], MergeStrategy::Select { index: 0 }),
        ]);
        let result = PipelineExecutor::new(passthrough()).execute(&cfg).await;
        let keys: Vec<_> = result.payload.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
        assert_eq!(result.payload.get("zeta"), Some(&json!({"a": 1})));
        assert_eq!(result.payload.get("alpha"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn trace_records_every_stage() {
        let cfg = config(vec![definition(
            "s",
            vec![static_item("x", json!({"v": 3}))
                .with_processing(ProcessingConfig::default().with_filter_path("$.v"))],
            MergeStrategy::Array,
        )]);
        let result = PipelineExecutor::new(passthrough())
            .with_trace(true)
            .execute(&cfg)
            .await;
        let trace = result.trace.unwrap();
        assert_eq!(trace.sources[0].items[0].raw, json!({"v": 3}));
        assert_eq!(trace.sources[0].items[0].processed, json!(3));
        assert_eq!(trace.sources[0].merged, json!([3]));
    }

    #[tokio::test]
    async fn disabled_config_yields_empty_payload() {
        let mut fetcher = MockDataFetcher::new();
        fetcher.expect_fetch().never();
        let mut cfg = config(vec![definition("s", vec![static_item("x", json!(1))], MergeStrategy::Object)]);
        cfg.enabled = false;
        let result = PipelineExecutor::new(Arc::new(fetcher)).execute(&cfg).await;
        assert!(result.payload.is_empty());
    }

    #[test]
    fn validation_reports_structure_problems() {
        let mut bad_path = static_item("x", json!(1));
        bad_path.processing.filter_path = Some("$[".into());
        let cfg = config(vec![
            definition("dup", vec![bad_path], MergeStrategy::Select { index: 3 }),
            definition("dup", Vec::new(), MergeStrategy::Script { source: "(".into() }),
        ]);
        let report = PipelineExecutor::validate(&cfg);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("duplicate data source id")));
        assert!(report.errors.iter().any(|e| e.contains("invalid filter path")));
        assert!(report.errors.iter().any(|e| e.contains("invalid merge script")));
        assert!(report.warnings.iter().any(|w| w.contains("has no items")));
        assert!(report.warnings.iter().any(|w| w.contains("first item will be used")));
    }

    #[test]
    fn capabilities_list_everything() {
        let caps = PipelineExecutor::capabilities();
        assert_eq!(caps.source_types.len(), 4);
        assert!(caps.merge_strategies.contains(&"script"));
    }
}
