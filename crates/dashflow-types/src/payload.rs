//! Pipeline output payload

use crate::ids::SourceId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Integrated output of one widget: `{ sourceId: mergedValue }`
///
/// Keys keep declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Empty payload
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source's merged value, keeping the original position on overwrite
    pub fn insert(&mut self, source: &SourceId, value: Value) {
        self.0.insert(source.to_string(), value);
    }

    /// Value for one source
    #[inline]
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&Value> {
        self.0.get(source)
    }

    /// Number of sources
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no source produced a value
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate sources in order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow as JSON object map
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert to a JSON object
    #[inline]
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(SourceId, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (SourceId, Value)>>(iter: I) -> Self {
        let mut payload = Self::new();
        for (source, value) in iter {
            payload.insert(&source, value);
        }
        payload
    }
}
