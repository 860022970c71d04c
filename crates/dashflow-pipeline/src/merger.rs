//! Merger stage
//!
//! Folds the processed items of one data source definition into a single
//! value according to its [`MergeStrategy`].

use crate::expr::Scope;
use crate::script::ScriptEngine;
use dashflow_types::MergeStrategy;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Output of the processor for one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedItem {
    pub id: String,
    pub value: Value,
}

impl ProcessedItem {
    /// Create processed item
    #[must_use]
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

fn as_object(items: &[ProcessedItem]) -> Value {
    let mut map = Map::with_capacity(items.len());
    for item in items {
        map.insert(item.id.clone(), item.value.clone());
    }
    Value::Object(map)
}

fn as_array(items: &[ProcessedItem]) -> Value {
    Value::Array(items.iter().map(|item| item.value.clone()).collect())
}

/// Merge processed items
///
/// - `object`: `{ id: value }` in declaration order
/// - `array`: `[value, ...]` in declaration order
/// - `select(i)`: item `i`, or the first item when `i` is out of range; `{}` when empty
/// - `script`: script result with `items` and `byId` bound, or the `array` result if it fails
#[must_use]
pub fn merge(items: &[ProcessedItem], strategy: &MergeStrategy, scripts: &dyn ScriptEngine) -> Value {
    match strategy {
        MergeStrategy::Object => as_object(items),
        MergeStrategy::Array => as_array(items),
        MergeStrategy::Select { index } => items
            .get(*index)
            .or_else(|| items.first())
            .map_or_else(|| Value::Object(Map::new()), |item| item.value.clone()),
        MergeStrategy::Script { source } => {
            let scope = Scope::new()
                .with("items", as_array(items))
                .with("byId", as_object(items));
            match scripts.run(source, &scope) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "merge script failed, falling back to array");
                    as_array(items)
                }
            }
        }
    }
}
