//! Builder quote request parsing
//!
//! The storefront builder posts a loosely typed JSON body:
//!
//! ```json
//! {
//!   "resources": [{ "resource": "memory", "quantity": "4096" }],
//!   "term": "5d0c...",
//!   "options": { "snap_to_step": true, "node_uuid": "..." },
//!   "node_id": 3,
//!   "coupons": ["SPRING"]
//! }
//! ```
//!
//! Parsing happens once at this boundary; everything downstream is typed.

use serde_json::{Map, Value};

use super::engine::QuoteLine;
use super::options::{
    KEY_NODE_ID, KEY_NODE_UUID, KEY_SNAP_TO_STEP, KEY_SNAP_TO_STEP_LEGACY, KEY_VALIDATE_CAPACITY,
    KEY_VALIDATE_CAPACITY_LEGACY,
};
use crate::error::{Error, Result};

/// How the caller identified the target node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeReference {
    Uuid(String),
    Id(i64),
}

/// A parsed builder quote request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteRequest {
    pub lines: Vec<QuoteLine>,
    /// Billing term uuid
    pub term: Option<String>,
    /// Raw options object, normalized later by `QuoteOptions`
    pub options: Map<String, Value>,
    pub node: Option<NodeReference>,
    pub coupons: Vec<String>,
}

impl QuoteRequest {
    /// Parse a request body
    ///
    /// Resource entries that are not objects or lack a resource key are
    /// skipped. A quantity that cannot be read as an integer fails the whole
    /// request.
    pub fn from_json(body: &Value) -> Result<Self> {
        let body = body
            .as_object()
            .ok_or_else(|| Error::validation("quote request must be a JSON object"))?;

        let mut lines = Vec::new();
        if let Some(resources) = body.get("resources").and_then(Value::as_array) {
            for item in resources.iter().filter_map(Value::as_object) {
                let Some(resource) = item.get("resource").and_then(non_empty_str) else {
                    continue;
                };
                let quantity = match item.get("quantity") {
                    None | Some(Value::Null) => 0,
                    Some(value) => parse_quantity(value)
                        .ok_or_else(|| Error::invalid_quantity(resource, value))?,
                };
                lines.push(QuoteLine::new(resource, quantity));
            }
        }

        let options = body
            .get("options")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let node = node_reference(&options, body)?;

        let coupons = body
            .get("coupons")
            .and_then(Value::as_array)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(non_empty_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            lines,
            term: body.get("term").and_then(non_empty_str).map(str::to_string),
            options,
            node,
            coupons,
        })
    }

    /// The quote flags from `options`, without node references or other client keys
    pub fn flag_options(&self) -> Map<String, Value> {
        [
            KEY_SNAP_TO_STEP,
            KEY_SNAP_TO_STEP_LEGACY,
            KEY_VALIDATE_CAPACITY,
            KEY_VALIDATE_CAPACITY_LEGACY,
        ]
        .into_iter()
        .filter_map(|key| self.options.get(key).map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Integers, floats (truncated toward zero) and numeric strings
fn parse_quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// `options.node_uuid`, then `options.node_id`, then top-level `node_id`
fn node_reference(options: &Map<String, Value>, body: &Map<String, Value>) -> Result<Option<NodeReference>> {
    if let Some(uuid) = options.get(KEY_NODE_UUID).and_then(non_empty_str) {
        return Ok(Some(NodeReference::Uuid(uuid.to_string())));
    }

    for value in [options.get(KEY_NODE_ID), body.get(KEY_NODE_ID)].into_iter().flatten() {
        match value {
            Value::Null => continue,
            Value::String(s) if s.trim().is_empty() => continue,
            _ => {}
        }
        let id = parse_quantity(value)
            .ok_or_else(|| Error::validation(format!("invalid node_id: {}", value)))?;
        return Ok(Some(NodeReference::Id(id)));
    }

    Ok(None)
}
