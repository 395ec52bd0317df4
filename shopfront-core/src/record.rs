//! Pure tree transforms over the profile record document.
//!
//! A profile record is one JSON object. Field references are dotted paths
//! (`shipping_address.city`, `preferences.theme`); everything in this module
//! is side-effect free so the store and service layers stay testable without
//! touching disk.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};

/// Top-level keys the record model recognizes. Unknown top-level keys
/// round-trip unchanged; this list only decides how dotted paths are rooted.
pub const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "name",
    "email",
    "phone",
    "shipping_address",
    "billing_address",
    "custom_fields",
];

/// A parsed dotted field path. Always has at least one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty input and empty segments (`a..b`) are
    /// malformed and rejected before any I/O.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::ValidationError(
                "field path is empty".to_string(),
            ));
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::ValidationError(format!(
                "malformed field path: {raw}"
            )));
        }
        Ok(Self { segments })
    }

    /// Path segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment of the path.
    #[must_use]
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// Whether the path starts at a recognized top-level key.
    #[must_use]
    pub fn is_rooted(&self) -> bool {
        KNOWN_TOP_LEVEL_KEYS.contains(&self.head())
    }

    /// The same path rooted under `custom_fields`.
    #[must_use]
    pub fn scoped_to_custom_fields(&self) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push("custom_fields".to_string());
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Read the value addressed by `path`. A missing or non-container
/// intermediate yields `None`, never an error.
#[must_use]
pub fn read<'a>(tree: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut cursor = tree;
    for segment in path.segments() {
        cursor = cursor.as_object()?.get(segment)?;
    }
    Some(cursor)
}

/// Write `value` at `path`, creating intermediate objects as needed.
/// Overwriting a scalar with a container (or vice versa) is permitted;
/// last write wins.
pub fn write(tree: &mut Value, path: &FieldPath, value: Value) {
    let mut value = Some(value);
    let mut cursor = tree;
    let last = path.segments().len().saturating_sub(1);
    for (idx, segment) in path.segments().iter().enumerate() {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Some(map) = cursor.as_object_mut() else {
            return;
        };
        if idx == last {
            if let Some(value) = value.take() {
                map.insert(segment.clone(), value);
            }
            return;
        }
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Remove the leaf addressed by `path`. Removing a missing path is a no-op;
/// returns whether anything was removed.
pub fn remove(tree: &mut Value, path: &FieldPath) -> bool {
    let mut cursor = tree;
    let last = path.segments().len().saturating_sub(1);
    for (idx, segment) in path.segments().iter().enumerate() {
        let Some(map) = cursor.as_object_mut() else {
            return false;
        };
        if idx == last {
            return map.remove(segment).is_some();
        }
        match map.get_mut(segment) {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    false
}

/// Recursively merge `incoming` into `target`. Object values merge key by
/// key so sibling keys not mentioned in `incoming` survive; anything else
/// replaces.
pub fn merge(target: &mut Value, incoming: Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Some(map) = target.as_object_mut() else {
        return;
    };
    for (key, value) in incoming {
        match value {
            Value::Object(child) => {
                let slot = map
                    .entry(key)
                    .or_insert_with(|| Value::Object(Map::new()));
                if slot.is_object() {
                    merge(slot, child);
                } else {
                    *slot = Value::Object(child);
                }
            }
            other => {
                map.insert(key, other);
            }
        }
    }
}
