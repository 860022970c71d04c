//! Data source configuration model
//!
//! A widget's [`DataSourceConfig`] lists one or more [`DataSourceDefinition`]s.
//! Each definition owns an ordered list of [`DataItem`]s, and each item says how
//! to fetch a raw value ([`FetchSpec`]) and how to project and coerce it
//! ([`ProcessingConfig`]). The definition's [`MergeStrategy`] then folds the
//! processed items into one value.

use crate::ids::{ComponentId, SourceId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of origin a data source reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Literal value embedded in the configuration
    Static,
    /// HTTP request
    Http,
    /// First frame of a WebSocket stream
    Socket,
    /// Script evaluated by the pipeline's script engine
    Script,
}

impl SourceType {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Http => "http",
            Self::Socket => "socket",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb for an HTTP fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "head")]
    Head,
}

impl HttpMethod {
    /// True for methods that carry their arguments in the query string
    #[inline]
    #[must_use]
    pub const fn uses_query(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

/// HTTP fetch parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSpec {
    /// Absolute URL
    pub url: String,
    /// Request method
    #[serde(default)]
    pub method: HttpMethod,
    /// Extra request headers
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    /// Query parameters
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub params: IndexMap<String, Value>,
    /// Request body (query string for GET/HEAD, JSON otherwise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-request timeout override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl HttpSpec {
    /// GET request to `url`
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: IndexMap::new(),
            params: IndexMap::new(),
            body: None,
            timeout_ms: None,
        }
    }
}

/// WebSocket fetch parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketSpec {
    /// `ws://` or `wss://` URL
    pub url: String,
    /// Requested sub-protocols
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    /// Message sent right after connecting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Value>,
    /// How long to wait for the first frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Script fetch parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSpec {
    /// Script text
    #[serde(alias = "script")]
    pub source: String,
    /// Values bound in the script scope
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
}

/// How one data item obtains its raw value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FetchSpec {
    /// Literal value
    Static {
        /// The value itself
        value: Value,
    },
    /// HTTP response body
    Http(HttpSpec),
    /// First socket frame
    Socket(SocketSpec),
    /// Script return value
    Script(ScriptSpec),
}

impl FetchSpec {
    /// The source type this spec belongs to
    #[inline]
    #[must_use]
    pub const fn source_type(&self) -> SourceType {
        match self {
            Self::Static { .. } => SourceType::Static,
            Self::Http(_) => SourceType::Http,
            Self::Socket(_) => SourceType::Socket,
            Self::Script(_) => SourceType::Script,
        }
    }
}

/// Type coercion applied after path projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Number,
    String,
    Boolean,
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        })
    }
}

/// Per-item processing rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfig {
    /// JSON-path-like projection, e.g. `$.rows[0].value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_path: Option<String>,
    /// Value used when fetching fails or the path misses
    #[serde(default)]
    pub default_value: Value,
    /// Optional type coercion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

impl ProcessingConfig {
    /// With a filter path
    #[inline]
    #[must_use]
    pub fn with_filter_path(mut self, path: impl Into<String>) -> Self {
        self.filter_path = Some(path.into());
        self
    }

    /// With a default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }

    /// With a transform
    #[inline]
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// One fetchable, processable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItem {
    /// Item id, used as the key by the `object` merge strategy
    pub id: String,
    /// How to fetch the raw value
    pub fetch_spec: FetchSpec,
    /// How to process the fetched value
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl DataItem {
    /// Create item with default processing
    #[must_use]
    pub fn new(id: impl Into<String>, fetch_spec: FetchSpec) -> Self {
        Self {
            id: id.into(),
            fetch_spec,
            processing: ProcessingConfig::default(),
        }
    }

    /// With processing rules
    #[inline]
    #[must_use]
    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }
}

/// Rule combining the processed items of one definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MergeStrategy {
    /// `{ itemId: value }`
    #[default]
    Object,
    /// `[value, ...]` in declaration order
    Array,
    /// A single item's value, falling back to the first item when out of range
    Select {
        /// Zero-based item index
        #[serde(default)]
        index: usize,
    },
    /// Script evaluated with `items` and `byId` in scope
    Script {
        /// Script text
        source: String,
    },
}

impl MergeStrategy {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Select { .. } => "select",
            Self::Script { .. } => "script",
        }
    }
}

/// One independently configured origin of values for a widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDefinition {
    /// Source id, the key of this source in the output payload
    pub id: SourceId,
    /// Kind of origin
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Raw user configuration this definition was generated from
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub source_config: Value,
    /// Items in declaration order
    #[serde(default)]
    pub items: Vec<DataItem>,
    /// How items are combined
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    /// Target field to source path, as computed by the config generator
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub field_mapping: IndexMap<String, String>,
}

/// What causes the pipeline to re-run for a widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum TriggerConfig {
    /// Periodic re-fetch
    Timer {
        /// Period in milliseconds
        interval_ms: u64,
        /// Fire once right away
        #[serde(default)]
        immediate: bool,
    },
    /// Re-run on every frame of a socket
    Socket {
        /// Socket address
        url: String,
        /// Requested sub-protocols
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        protocols: Vec<String>,
    },
    /// Only on explicit request
    Manual,
}

fn default_enabled() -> bool {
    true
}

/// Full data configuration of one widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    /// Config id
    pub id: String,
    /// Owning widget
    pub widget_id: ComponentId,
    /// Definitions in declaration order
    pub data_sources: Vec<DataSourceDefinition>,
    /// Re-run triggers
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    /// Disabled configs produce an empty payload
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl DataSourceConfig {
    /// Look up a definition by id
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&DataSourceDefinition> {
        self.data_sources.iter().find(|d| d.id.as_str() == id)
    }

    /// Number of items across every definition
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.data_sources.iter().map(|d| d.items.len()).sum()
    }
}
