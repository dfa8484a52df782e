//! Quote options
//!
//! Callers hand over a loose JSON options object that may spell each flag
//! either as `snapToStep` / `validateCapacity` or as the legacy
//! `snap_to_step` / `validate_capacity`. Both spellings are accepted here and
//! nowhere else; the rest of the engine only sees `QuoteOptions`.

use serde_json::{Map, Value};

use crate::models::Node;

// ============================================================================
// Keys
// ============================================================================

pub const KEY_SNAP_TO_STEP: &str = "snapToStep";
pub const KEY_SNAP_TO_STEP_LEGACY: &str = "snap_to_step";
pub const KEY_VALIDATE_CAPACITY: &str = "validateCapacity";
pub const KEY_VALIDATE_CAPACITY_LEGACY: &str = "validate_capacity";
const KEY_NODE: &str = "node";
pub const KEY_NODE_UUID: &str = "node_uuid";
pub const KEY_NODE_ID: &str = "node_id";

// ============================================================================
// Boolean parsing
// ============================================================================

/// Parse a flag value leniently
///
/// Recognized strings (trimmed, case-insensitive): `1 true on yes` are true,
/// `0 false off no` and the empty string are false. Booleans map directly,
/// numbers are true when non-zero. Anything else falls back to truthiness:
/// null and empty arrays are false, other strings, arrays and objects are true.
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" | "" => false,
            _ => true,
        },
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// First non-null value among the given keys
fn first_present<'a>(options: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| options.get(*key))
        .find(|value| !value.is_null())
}

// ============================================================================
// QuoteOptions
// ============================================================================

/// Canonical, typed quote options
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteOptions {
    snap_to_step: bool,
    validate_capacity: bool,
    node: Option<Node>,
    /// Caller-supplied keys that are not flags, kept for audit
    extra: Map<String, Value>,
}

impl Default for QuoteOptions {
    fn default() -> Self {
        Self {
            snap_to_step: true,
            validate_capacity: false,
            node: None,
            extra: Map::new(),
        }
    }
}

impl QuoteOptions {
    /// Normalize an options object and an optional target node
    pub fn from_map(options: &Map<String, Value>, node: Option<Node>) -> Self {
        let snap_to_step = first_present(options, &[KEY_SNAP_TO_STEP, KEY_SNAP_TO_STEP_LEGACY])
            .map(parse_flag)
            .unwrap_or(true);

        let has_explicit_capacity_flag = options.contains_key(KEY_VALIDATE_CAPACITY)
            || options.contains_key(KEY_VALIDATE_CAPACITY_LEGACY);

        let validate_capacity = if has_explicit_capacity_flag {
            first_present(options, &[KEY_VALIDATE_CAPACITY, KEY_VALIDATE_CAPACITY_LEGACY])
                .map(parse_flag)
                .unwrap_or(false)
        } else {
            node.is_some()
        };

        let extra = options
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    key.as_str(),
                    KEY_NODE
                        | KEY_SNAP_TO_STEP
                        | KEY_SNAP_TO_STEP_LEGACY
                        | KEY_VALIDATE_CAPACITY
                        | KEY_VALIDATE_CAPACITY_LEGACY
                )
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            snap_to_step,
            validate_capacity,
            node,
            extra,
        }
    }

    /// Normalize a JSON value; anything but an object is treated as empty
    pub fn from_value(options: &Value, node: Option<Node>) -> Self {
        match options.as_object() {
            Some(map) => Self::from_map(map, node),
            None => Self::from_map(&Map::new(), node),
        }
    }

    /// Options with explicit flags and no extra keys
    pub fn new(snap_to_step: bool, validate_capacity: bool, node: Option<Node>) -> Self {
        Self {
            snap_to_step,
            validate_capacity,
            node,
            extra: Map::new(),
        }
    }

    pub fn snap_to_step(&self) -> bool {
        self.snap_to_step
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Capacity is validated only when requested and a node is known
    pub fn should_validate_capacity(&self) -> bool {
        self.validate_capacity && self.node.is_some()
    }

    /// Flat map for persistence/audit: canonical keys plus node identity
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert(KEY_SNAP_TO_STEP.to_string(), Value::Bool(self.snap_to_step));
        map.insert(
            KEY_VALIDATE_CAPACITY.to_string(),
            Value::Bool(self.validate_capacity),
        );

        if let Some(node) = &self.node {
            map.insert(KEY_NODE_UUID.to_string(), Value::String(node.uuid.clone()));
            map.insert(KEY_NODE_ID.to_string(), Value::from(node.id));
        }

        map
    }
}
