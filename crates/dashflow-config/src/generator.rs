//! Config generator
//!
//! Turns a widget's [`DataRequirement`] plus what the user configured into a
//! [`DataSourceConfig`] the pipeline can run:
//! - every required source must have an input
//! - static inputs get a per-field projection, other types are fetched whole
//! - triggers are synthesized so a config is never triggerless

use crate::error::{ConfigError, Result};
use dashflow_pipeline::{JsonPath, PipelineExecutor};
use dashflow_types::{
    DataItem, DataRequirement, DataSourceConfig, DataSourceDefinition, FetchSpec, HttpSpec,
    MergeStrategy, ProcessingConfig, ScriptSpec, SocketSpec, SourceRequirement, SourceType,
    StructureType, TriggerConfig, UserSourceInput, ValidationReport,
};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

static IDENTIFIER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").ok());

/// Generator defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Timer interval for HTTP sources that do not set one
    pub default_poll_interval_ms: u64,
    /// Fire timer triggers once on start
    pub immediate: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            default_poll_interval_ms: 30_000,
            immediate: true,
        }
    }
}

impl GeneratorOptions {
    #[must_use]
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Outcome of applying one field mapping entry to sample data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPreview {
    pub target_field: String,
    pub source_path: String,
    pub mapped_value: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builds pipeline configs from requirements and user inputs
#[derive(Debug, Clone, Default)]
pub struct ConfigGenerator {
    options: GeneratorOptions,
}

impl ConfigGenerator {
    #[must_use]
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate a config for `requirement` from `inputs`
    ///
    /// Inputs for sources the requirement does not declare are skipped.
    ///
    /// # Errors
    /// - [`ConfigError::MissingComponentId`] for a blank component id
    /// - [`ConfigError::EmptyInputs`] when nothing was supplied
    /// - [`ConfigError::MissingRequiredSource`] naming the first required
    ///   source without an input
    /// - [`ConfigError::InvalidSourceConfig`] when an input cannot be read
    ///   as a fetch spec of its type
    pub fn generate_config(
        &self,
        requirement: &DataRequirement,
        inputs: &[UserSourceInput],
    ) -> Result<DataSourceConfig> {
        let component = &requirement.component_id;
        if component.is_blank() {
            return Err(ConfigError::MissingComponentId);
        }
        if inputs.is_empty() {
            return Err(ConfigError::EmptyInputs(component.clone()));
        }
        if let Some(missing) = requirement
            .data_sources
            .iter()
            .filter(|source| source.required)
            .find(|source| !inputs.iter().any(|input| input.data_source_id == source.id))
        {
            return Err(ConfigError::MissingRequiredSource {
                source_id: missing.id.clone(),
                name: missing.name.clone(),
            });
        }

        let mut data_sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            let Some(declared) = requirement
                .data_sources
                .iter()
                .find(|source| source.id == input.data_source_id)
            else {
                warn!(
                    component_id = %component,
                    source_id = %input.data_source_id,
                    "Skipping input for undeclared data source"
                );
                continue;
            };
            data_sources.push(definition(declared, input)?);
        }

        let config = DataSourceConfig {
            id: format!("dsc-{component}"),
            widget_id: component.clone(),
            triggers: self.triggers(inputs),
            data_sources,
            enabled: true,
        };
        debug!(
            component_id = %component,
            sources = config.data_sources.len(),
            items = config.item_count(),
            "Generated data source config"
        );
        Ok(config)
    }

    fn triggers(&self, inputs: &[UserSourceInput]) -> Vec<TriggerConfig> {
        let mut triggers = Vec::new();

        let interval = inputs
            .iter()
            .filter(|input| input.source_type == SourceType::Http)
            .map(|input| {
                ["interval", "intervalMs"]
                    .iter()
                    .find_map(|key| input.config.get(*key).and_then(Value::as_u64))
                    .unwrap_or(self.options.default_poll_interval_ms)
            })
            .min();
        if let Some(interval_ms) = interval {
            triggers.push(TriggerConfig::Timer {
                interval_ms,
                immediate: self.options.immediate,
            });
        }

        for input in inputs
            .iter()
            .filter(|input| input.source_type == SourceType::Socket)
        {
            let Some(url) = input.config.get("url").and_then(Value::as_str) else {
                continue;
            };
            let duplicate = triggers
                .iter()
                .any(|t| matches!(t, TriggerConfig::Socket { url: existing, .. } if existing == url));
            if duplicate {
                continue;
            }
            let protocols = input
                .config
                .get("protocols")
                .and_then(|p| serde_json::from_value(p.clone()).ok())
                .unwrap_or_default();
            triggers.push(TriggerConfig::Socket {
                url: url.to_string(),
                protocols,
            });
        }

        if triggers.is_empty() {
            triggers.push(TriggerConfig::Manual);
        }
        triggers
    }

    /// Structural checks on a generated or hand-written config
    #[must_use]
    pub fn validate_config(&self, config: &DataSourceConfig) -> ValidationReport {
        let mut report = PipelineExecutor::validate(config);
        if config.id.trim().is_empty() {
            report.error("config id is missing");
        }
        if config.triggers.is_empty() {
            report.warn("at least one trigger is recommended");
        }
        for trigger in &config.triggers {
            match trigger {
                TriggerConfig::Timer { interval_ms: 0, .. } => {
                    report.error("timer trigger interval must be positive");
                }
                TriggerConfig::Socket { url, .. } if url.trim().is_empty() => {
                    report.error("socket trigger url is missing");
                }
                _ => {}
            }
        }
        report
    }

    /// Apply each `target -> path` entry of `mapping` to `source`
    #[must_use]
    pub fn preview_mapping(
        &self,
        source: &Value,
        mapping: &IndexMap<String, String>,
    ) -> Vec<MappingPreview> {
        mapping
            .iter()
            .map(|(target, path)| {
                let (mapped_value, error) = match JsonPath::parse(path) {
                    Ok(parsed) => match parsed.select(source) {
                        Some(value) => (value, None),
                        None => (Value::Null, Some(format!("no value at '{path}'"))),
                    },
                    Err(e) => (Value::Null, Some(e.to_string())),
                };
                MappingPreview {
                    target_field: target.clone(),
                    source_path: path.clone(),
                    mapped_value,
                    success: error.is_none(),
                    error,
                }
            })
            .collect()
    }

    /// One-line description for logs and the CLI
    #[must_use]
    pub fn summarize(&self, config: &DataSourceConfig) -> String {
        let sources: Vec<&str> = config
            .data_sources
            .iter()
            .map(|def| def.source_type.as_str())
            .collect();
        let triggers: Vec<&str> = config
            .triggers
            .iter()
            .map(|trigger| match trigger {
                TriggerConfig::Timer { .. } => "timer",
                TriggerConfig::Socket { .. } => "socket",
                TriggerConfig::Manual => "manual",
            })
            .collect();
        format!(
            "component: {} | sources: {} | triggers: {}",
            config.widget_id,
            sources.join(", "),
            triggers.join(", ")
        )
    }
}

fn definition(declared: &SourceRequirement, input: &UserSourceInput) -> Result<DataSourceDefinition> {
    let processing = ProcessingConfig::default().with_default(declared.default_value.clone());
    let invalid = |reason: String| ConfigError::InvalidSourceConfig {
        source_id: input.data_source_id.clone(),
        reason,
    };

    let (items, merge_strategy, field_mapping) = match input.source_type {
        SourceType::Static => static_items(declared, static_value(&input.config), &processing),
        SourceType::Http => {
            let spec: HttpSpec = serde_json::from_value(input.config.clone())
                .map_err(|e| invalid(e.to_string()))?;
            whole_item(input, FetchSpec::Http(spec), processing)
        }
        SourceType::Socket => {
            let spec: SocketSpec = serde_json::from_value(input.config.clone())
                .map_err(|e| invalid(e.to_string()))?;
            whole_item(input, FetchSpec::Socket(spec), processing)
        }
        SourceType::Script => {
            let spec = match &input.config {
                Value::String(source) => ScriptSpec {
                    source: source.clone(),
                    context: Value::Null,
                },
                other => serde_json::from_value(other.clone()).map_err(|e| invalid(e.to_string()))?,
            };
            whole_item(input, FetchSpec::Script(spec), processing)
        }
    };

    Ok(DataSourceDefinition {
        id: input.data_source_id.clone(),
        source_type: input.source_type,
        source_config: input.config.clone(),
        items,
        merge_strategy,
        field_mapping,
    })
}

type Generated = (Vec<DataItem>, MergeStrategy, IndexMap<String, String>);

/// One item fetching the whole value, optionally projected by `filterPath`
fn whole_item(input: &UserSourceInput, spec: FetchSpec, mut processing: ProcessingConfig) -> Generated {
    processing.filter_path = input
        .config
        .get("filterPath")
        .and_then(Value::as_str)
        .map(str::to_string);
    let item = DataItem::new(input.data_source_id.as_str(), spec).with_processing(processing);
    (vec![item], MergeStrategy::Select { index: 0 }, IndexMap::new())
}

fn static_items(declared: &SourceRequirement, value: Value, processing: &ProcessingConfig) -> Generated {
    if declared.fields.is_empty() {
        let item = DataItem::new("value", FetchSpec::Static { value }).with_processing(processing.clone());
        return (vec![item], MergeStrategy::Select { index: 0 }, IndexMap::new());
    }

    let mut items = Vec::with_capacity(declared.fields.len());
    let mut mapping = IndexMap::new();
    for field in &declared.fields {
        let key = field_selector(&field.name);
        let (filter_path, mapped) = match declared.structure_type {
            StructureType::Object => (format!("${key}"), field.name.clone()),
            StructureType::Array => (format!("$[*]{key}"), format!("[*]{key}")),
        };
        mapping.insert(field.name.clone(), mapped);
        items.push(
            DataItem::new(field.name.as_str(), FetchSpec::Static { value: value.clone() })
                .with_processing(processing.clone().with_filter_path(filter_path)),
        );
    }
    (items, MergeStrategy::Object, mapping)
}

/// `.name` for identifiers, `['name']` otherwise
fn field_selector(name: &str) -> String {
    let plain = IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name));
    if plain {
        format!(".{name}")
    } else {
        format!("['{}']", name.replace('\'', ""))
    }
}

/// Literal carried by a static input: `config.value` if present, JSON text parsed
fn static_value(config: &Value) -> Value {
    let value = match config {
        Value::Object(map) if map.contains_key("value") => map.get("value").cloned().unwrap_or_default(),
        other => other.clone(),
    };
    match value {
        Value::String(text) => {
            let trimmed = text.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        other => other,
    }
}
