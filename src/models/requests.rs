//! Request models for batch operations
//!
//! Defines the shape of one operation inside a batch.

use serde::Deserialize;
use serde_json::Value;

/// Kind of a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Get,
    Update,
    Delete,
}

/// One operation in a batch
///
/// # Fields
/// - `type`: `get`, `update` or `delete`
/// - `key`: The cache key the operation targets
/// - `data`: Replacement value, required by `update`
///
/// Every field is optional on the wire; operations missing a required field
/// are skipped by the executor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOp {
    /// Operation kind
    #[serde(rename = "type", default)]
    pub kind: Option<OpKind>,
    /// Target key
    #[serde(default)]
    pub key: Option<String>,
    /// Replacement value for updates
    #[serde(default)]
    pub data: Option<Value>,
}

impl BatchOp {
    /// Creates a get operation.
    pub fn get(key: impl Into<String>) -> Self {
        Self {
            kind: Some(OpKind::Get),
            key: Some(key.into()),
            data: None,
        }
    }

    /// Creates an update operation.
    pub fn update(key: impl Into<String>, data: Value) -> Self {
        Self {
            kind: Some(OpKind::Update),
            key: Some(key.into()),
            data: Some(data),
        }
    }

    /// Creates a delete operation.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: Some(OpKind::Delete),
            key: Some(key.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_op_deserialize() {
        let json = r#"{"type": "update", "key": "k1", "data": {"value": "updated"}}"#;
        let op: BatchOp = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind, Some(OpKind::Update));
        assert_eq!(op.key.as_deref(), Some("k1"));
        assert_eq!(op.data, Some(json!({"value": "updated"})));
    }

    #[test]
    fn test_batch_op_missing_fields() {
        let op: BatchOp = serde_json::from_str(r#"{"key": "k1"}"#).unwrap();
        assert!(op.kind.is_none());
        assert!(op.data.is_none());

        let op: BatchOp = serde_json::from_str(r#"{"type": "get"}"#).unwrap();
        assert!(op.key.is_none());
    }

    #[test]
    fn test_batch_op_null_data() {
        // serde maps an explicit null onto None
        let op: BatchOp = serde_json::from_str(r#"{"type": "update", "key": "k", "data": null}"#)
            .unwrap();
        assert!(op.data.is_none());
    }
}
