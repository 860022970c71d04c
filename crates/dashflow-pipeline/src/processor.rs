//! Processor stage
//!
//! Projects a fetched value through the item's `filterPath` and coerces it
//! with `transform`. Never fails: a path miss yields the item default, a
//! failed coercion yields the untransformed value.

use crate::error::TransformError;
use crate::path::JsonPath;
use dashflow_types::{ProcessingConfig, Transform};
use serde_json::{Number, Value};
use tracing::{debug, warn};

/// Apply filter path and transform to one fetched value
#[must_use]
pub fn process(raw: &Value, processing: &ProcessingConfig) -> Value {
    let projected = match &processing.filter_path {
        None => raw.clone(),
        Some(path) => match JsonPath::parse(path) {
            Ok(path) => match path.select(raw) {
                Some(value) if !value.is_null() => value,
                _ => {
                    debug!(path = %path, "filter path missed, using default");
                    return processing.default_value.clone();
                }
            },
            Err(e) => {
                warn!(path = %path, error = %e, "invalid filter path, using default");
                return processing.default_value.clone();
            }
        },
    };

    let Some(transform) = processing.transform else {
        return projected;
    };
    match apply_transform(&projected, transform) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "transform failed, keeping untransformed value");
            projected
        }
    }
}

/// Coerce a value to the transform's type
///
/// # Errors
/// Returns [`TransformError`] when the value has no sensible conversion
pub fn apply_transform(value: &Value, transform: Transform) -> Result<Value, TransformError> {
    let fail = |found: &'static str| TransformError {
        target: transform,
        found,
    };
    match transform {
        Transform::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| fail("non-numeric string"))
            }
            Value::Bool(b) => Ok(Value::from(u8::from(*b))),
            Value::Null => Err(fail("null")),
            Value::Array(_) => Err(fail("array")),
            Value::Object(_) => Err(fail("object")),
        },
        Transform::String => Ok(Value::String(match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })),
        Transform::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                _ => Err(fail("non-boolean string")),
            },
            Value::Null => Ok(Value::Bool(false)),
            Value::Array(_) => Err(fail("array")),
            Value::Object(_) => Err(fail("object")),
        },
    }
}
