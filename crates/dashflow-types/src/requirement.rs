//! Widget data requirement declarations and user source inputs

use crate::ids::{ComponentId, SourceId};
use crate::source::SourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape of the data a widget expects from one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureType {
    #[default]
    Object,
    Array,
}

/// One field a widget reads from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequirement {
    pub name: String,
    #[serde(rename = "type", default = "any_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

fn any_type() -> String {
    "any".to_string()
}

impl FieldRequirement {
    /// Required field of any type
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: any_type(),
            required: true,
            example: None,
        }
    }
}

/// One data source a widget declares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequirement {
    pub id: SourceId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub structure_type: StructureType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub fields: Vec<FieldRequirement>,
    /// Fallback value for every item generated for this source
    #[serde(default)]
    pub default_value: Value,
}

impl SourceRequirement {
    /// Required object-shaped source with no declared fields
    #[must_use]
    pub fn new(id: impl Into<SourceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            structure_type: StructureType::Object,
            required: true,
            fields: Vec::new(),
            default_value: Value::Null,
        }
    }

    /// Mark optional
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// With structure type
    #[inline]
    #[must_use]
    pub fn with_structure(mut self, structure: StructureType) -> Self {
        self.structure_type = structure;
        self
    }

    /// With declared fields
    #[inline]
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(FieldRequirement::new).collect();
        self
    }

    /// With default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }
}

/// What data a widget needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequirement {
    pub component_id: ComponentId,
    pub data_sources: Vec<SourceRequirement>,
}

impl DataRequirement {
    /// Create requirement
    #[must_use]
    pub fn new(component_id: impl Into<ComponentId>, data_sources: Vec<SourceRequirement>) -> Self {
        Self {
            component_id: component_id.into(),
            data_sources,
        }
    }
}

/// A data source as configured by the user
///
/// `config` depends on `source_type`: a literal (or `{ "value": ... }`) for
/// static, URL/method/headers for HTTP, URL/protocols for socket, and source
/// text for script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSourceInput {
    pub data_source_id: SourceId,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub config: Value,
}

impl UserSourceInput {
    /// Create input
    #[must_use]
    pub fn new(data_source_id: impl Into<SourceId>, source_type: SourceType, config: Value) -> Self {
        Self {
            data_source_id: data_source_id.into(),
            source_type,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requirement_from_catalog_json() {
        let req: DataRequirement = serde_json::from_value(json!({
            "componentId": "gauge",
            "dataSources": [{
                "id": "temp",
                "name": "Temperature",
                "structureType": "array",
                "required": true,
                "fields": [{"name": "value", "type": "number", "required": true, "example": 21}]
            }]
        }))
        .unwrap();
        let source = &req.data_sources[0];
        assert_eq!(source.structure_type, StructureType::Array);
        assert_eq!(source.fields[0].field_type, "number");
        assert!(source.default_value.is_null());
    }

    #[test]
    fn builder_helpers() {
        let source = SourceRequirement::new("humidity", "Humidity")
            .with_fields(["value"])
            .with_default(json!(0))
            .optional();
        assert!(!source.required);
        assert_eq!(source.fields.len(), 1);
        assert_eq!(source.default_value, json!(0));
    }
}
