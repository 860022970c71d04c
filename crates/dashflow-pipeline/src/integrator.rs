//! Integrator stage
//!
//! Combines the merged value of every data source definition of a widget
//! into one [`Payload`] keyed by definition id, in declaration order.

use dashflow_types::{Payload, SourceId};
use serde_json::Value;

/// Build the widget payload from per-source merged values
#[must_use]
pub fn integrate<I>(merged: I) -> Payload
where
    I: IntoIterator<Item = (SourceId, Value)>,
{
    merged.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyed_by_source_in_order() {
        let payload = integrate([
            (SourceId::from("temp"), json!({"value": 25.6})),
            (SourceId::from("alerts"), json!([])),
        ]);
        assert_eq!(
            payload.into_value(),
            json!({"temp": {"value": 25.6}, "alerts": []})
        );
    }

    #[test]
    fn nothing_to_integrate() {
        assert!(integrate(Vec::new()).is_empty());
    }
}
