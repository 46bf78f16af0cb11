//! Response envelope types shared by all SharePoint endpoints.
//!
//! SharePoint's verbose OData responses come in three shapes, and this
//! module turns a raw body into exactly one of them, once, at the
//! transport boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SpError;

/// An untyped list item: field name to value.
pub type ListItem = Map<String, Value>;

/// The `__metadata` block attached to a single entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Metadata {
    /// Absolute URL of the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Concurrency tag of the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Entity type name, e.g. `SP.Data.TasksListItem`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

/// A response body classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// `{d: {__metadata: {...}, ...}}` - a single entity.
    Entity {
        /// The entity object (`d`).
        data: Value,
        /// The entity's URL, from `__metadata.uri`.
        uri: Option<String>,
        /// The entity's concurrency tag, from `__metadata.etag`.
        etag: Option<String>,
    },

    /// `{d: {results: [...]}}` - a collection.
    Results(Vec<Value>),

    /// Anything else, passed through untouched.
    Raw(Value),
}

impl ResponseEnvelope {
    /// Classifies a body: entity first, then results, then raw.
    pub fn from_body(mut body: Value) -> Self {
        if let Some(Value::Object(d)) = body.get_mut("d") {
            if let Some(meta) = d.get("__metadata") {
                let metadata: Metadata = serde_json::from_value(meta.clone()).unwrap_or_default();
                return ResponseEnvelope::Entity {
                    data: Value::Object(std::mem::take(d)),
                    uri: metadata.uri,
                    etag: metadata.etag,
                };
            }
            if let Some(Value::Array(results)) = d.get_mut("results") {
                return ResponseEnvelope::Results(std::mem::take(results));
            }
        }
        ResponseEnvelope::Raw(body)
    }

    /// Returns the entity etag, if this is an entity.
    pub fn etag(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Entity { etag, .. } => etag.as_deref(),
            _ => None,
        }
    }

    /// Returns the entity URL, if this is an entity.
    pub fn uri(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Entity { uri, .. } => uri.as_deref(),
            _ => None,
        }
    }

    /// Unwraps a collection.
    ///
    /// # Errors
    ///
    /// Returns `SpError::UnexpectedEnvelope` for entity and raw bodies.
    pub fn into_results(self) -> Result<Vec<Value>, SpError> {
        match self {
            ResponseEnvelope::Results(results) => Ok(results),
            ResponseEnvelope::Entity { .. } => Err(SpError::unexpected_envelope(
                "expected a result collection, got a single entity",
            )),
            ResponseEnvelope::Raw(_) => Err(SpError::unexpected_envelope(
                "expected a result collection under d.results",
            )),
        }
    }

    /// Returns the payload a caller most likely wants: the entity, the
    /// collection as an array, or the raw body.
    pub fn into_value(self) -> Value {
        match self {
            ResponseEnvelope::Entity { data, .. } => data,
            ResponseEnvelope::Results(results) => Value::Array(results),
            ResponseEnvelope::Raw(body) => body,
        }
    }
}

/// Unwraps the `d` object of a verbose single-object response.
///
/// Falls back to the body itself when there is no `d` wrapper.
pub fn unwrap_d(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("d") {
            Some(d) => d,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// The `{results: [...]}` value written to multi-value lookup fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IdResults {
    /// Lookup IDs, in the order their keys were given.
    pub results: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_entity_takes_precedence() {
        let body = json!({
            "d": {
                "__metadata": {"uri": "https://x/items(1)", "etag": "\"4\"", "type": "SP.Data.TasksListItem"},
                "Title": "One",
                "results": []
            }
        });
        let envelope = ResponseEnvelope::from_body(body);
        assert_eq!(envelope.uri(), Some("https://x/items(1)"));
        assert_eq!(envelope.etag(), Some("\"4\""));
        match envelope {
            ResponseEnvelope::Entity { data, .. } => assert_eq!(data["Title"], "One"),
            other => panic!("expected entity, got {:?}", other),
        }
    }

    #[test]
    fn test_results_envelope() {
        let body = json!({"d": {"results": [{"Title": "a"}, {"Title": "b"}]}});
        let results = ResponseEnvelope::from_body(body).into_results().unwrap();
        assert_eq!(results, vec![json!({"Title": "a"}), json!({"Title": "b"})]);
    }

    #[test]
    fn test_raw_fallback() {
        let body = json!({"odata.error": {"code": "-1"}});
        let envelope = ResponseEnvelope::from_body(body.clone());
        assert_eq!(envelope, ResponseEnvelope::Raw(body));
        assert!(ResponseEnvelope::Raw(Value::Null).into_results().is_err());
    }

    #[test]
    fn test_d_without_known_shape_is_raw() {
        let body = json!({"d": {"Id": 12}});
        assert_eq!(
            ResponseEnvelope::from_body(body.clone()),
            ResponseEnvelope::Raw(body)
        );
    }

    #[test]
    fn test_unwrap_d() {
        assert_eq!(unwrap_d(json!({"d": {"Id": 3}})), json!({"Id": 3}));
        assert_eq!(unwrap_d(json!({"Id": 3})), json!({"Id": 3}));
        assert_eq!(unwrap_d(Value::Null), Value::Null);
    }

    #[test]
    fn test_id_results_serializes_as_results_object() {
        let ids = IdResults {
            results: vec![json!(3), json!(2)],
        };
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!({"results": [3, 2]}));
    }
}
