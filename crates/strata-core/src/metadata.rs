//! Typed, open key-value metadata attached to events.
//!
//! Metadata is a string-keyed JSON map. A fixed set of reserved keys carries
//! a known type and is validated at the boundary (when the event is
//! appended or imported); every other key is free-form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reserved metadata keys and the JSON type each one must hold.
pub const RESERVED_KEYS: &[(&str, ReservedType)] = &[
    ("source", ReservedType::String),
    ("user_id", ReservedType::String),
    ("message_id", ReservedType::String),
    ("thread_id", ReservedType::String),
    ("language", ReservedType::String),
    ("redacted", ReservedType::Bool),
];

/// Value type required for a reserved metadata key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservedType {
    /// JSON string.
    String,
    /// JSON boolean.
    Bool,
}

impl ReservedType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "boolean",
        }
    }
}

/// Metadata validation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    /// A reserved key holds a value of the wrong JSON type.
    #[error("metadata key '{key}' must be a {expected}")]
    WrongType {
        /// The offending key.
        key: String,
        /// Expected JSON type.
        expected: &'static str,
    },
    /// Keys must be non-empty.
    #[error("metadata keys must be non-empty")]
    EmptyKey,
}

/// Open key-value map with validated reserved keys.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventMetadata(Map<String, Value>);

impl EventMetadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from an arbitrary JSON object, validating reserved keys.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, MetadataError> {
        let meta = Self(map);
        meta.validate()?;
        Ok(meta)
    }

    /// Insert a value, rejecting wrongly-typed reserved keys.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<(), MetadataError> {
        let key = key.into();
        check(&key, &value)?;
        let _ = self.0.insert(key, value);
        Ok(())
    }

    /// Builder-style insert of a string value.
    pub fn with_str(mut self, key: &str, value: &str) -> Result<Self, MetadataError> {
        self.insert(key, Value::String(value.to_string()))?;
        Ok(self)
    }

    /// Validate every reserved key currently present.
    pub fn validate(&self) -> Result<(), MetadataError> {
        for (key, value) in &self.0 {
            check(key, value)?;
        }
        Ok(())
    }

    /// Get a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Whether redaction altered the event content.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.0.get("redacted").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn check(key: &str, value: &Value) -> Result<(), MetadataError> {
    if key.is_empty() {
        return Err(MetadataError::EmptyKey);
    }
    if let Some((_, ty)) = RESERVED_KEYS.iter().find(|(k, _)| *k == key) {
        if !ty.accepts(value) {
            return Err(MetadataError::WrongType {
                key: key.to_string(),
                expected: ty.name(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn free_form_keys_accept_anything() {
        let mut meta = EventMetadata::new();
        meta.insert("custom", json!({"nested": [1, 2]})).unwrap();
        assert_eq!(meta.get("custom").unwrap()["nested"][1], 2);
    }

    #[test]
    fn reserved_string_key_rejects_number() {
        let mut meta = EventMetadata::new();
        let err = meta.insert("user_id", json!(42)).unwrap_err();
        assert_matches!(err, MetadataError::WrongType { expected: "string", .. });
    }

    #[test]
    fn reserved_bool_key() {
        let mut meta = EventMetadata::new();
        assert!(meta.insert("redacted", json!("yes")).is_err());
        meta.insert("redacted", json!(true)).unwrap();
        assert!(meta.is_redacted());
    }

    #[test]
    fn from_map_validates() {
        let map = json!({"source": 1}).as_object().unwrap().clone();
        assert!(EventMetadata::from_map(map).is_err());
        let map = json!({"source": "telegram", "x": 1}).as_object().unwrap().clone();
        let meta = EventMetadata::from_map(map).unwrap();
        assert_eq!(meta.get_str("source"), Some("telegram"));
    }

    #[test]
    fn empty_key_rejected() {
        let mut meta = EventMetadata::new();
        assert_eq!(meta.insert("", json!(1)), Err(MetadataError::EmptyKey));
    }

    #[test]
    fn serializes_as_plain_object() {
        let meta = EventMetadata::new().with_str("thread_id", "t1").unwrap();
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"thread_id":"t1"}"#);
    }
}
