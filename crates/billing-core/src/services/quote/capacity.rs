//! Capacity requirement extraction
//!
//! Translates a resolved quantity into the physical capacity it needs on a
//! node. A catalog entry maps itself to metrics through
//! `metadata.node_capacity`, either one definition or a list of them:
//!
//! ```json
//! { "node_capacity": { "metric": "memory_mb", "per_unit": 1 } }
//! { "node_capacity": [ { "metric": "disk_mb", "per_unit": 1024 }, { "metric": "inodes" } ] }
//! ```
//!
//! The older flat keys `node_capacity_metric` / `node_capacity_per_unit` add
//! one more definition. Without any definition, `memory` maps to `memory_mb`
//! and `disk` to `disk_mb` one to one; other resources need nothing.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::models::ResourceCatalogEntry;

pub const METRIC_MEMORY_MB: &str = "memory_mb";
pub const METRIC_DISK_MB: &str = "disk_mb";

/// One mapping from a resource to a physical metric
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityDefinition {
    pub metric: String,
    /// Metric units needed per unit of resource quantity
    pub per_unit: f64,
}

/// Demand per metric, summed across selections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapacityRequirements(BTreeMap<String, i64>);

impl CapacityRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add demand for a metric; negative values count as zero
    pub fn add(&mut self, metric: impl Into<String>, value: i64) {
        let slot = self.0.entry(metric.into()).or_insert(0);
        *slot = slot.saturating_add(value.max(0));
    }

    /// Fold another set of requirements into this one
    pub fn merge(&mut self, other: &CapacityRequirements) {
        for (metric, value) in other.iter() {
            self.add(metric, value);
        }
    }

    pub fn get(&self, metric: &str) -> i64 {
        self.0.get(metric).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Memory demand in MB (`memory` and `memory_mb` metrics combined)
    pub fn memory_mb(&self) -> i64 {
        self.get("memory").saturating_add(self.get(METRIC_MEMORY_MB))
    }

    /// Disk demand in MB (`disk` and `disk_mb` metrics combined)
    pub fn disk_mb(&self) -> i64 {
        self.get("disk").saturating_add(self.get(METRIC_DISK_MB))
    }
}

/// Metric used when an entry configures no capacity mapping
pub fn default_metric(resource: &str) -> Option<&'static str> {
    match resource {
        "memory" => Some(METRIC_MEMORY_MB),
        "disk" => Some(METRIC_DISK_MB),
        _ => None,
    }
}

/// Capacity definitions configured on an entry, in declaration order
pub fn capacity_definitions(entry: &ResourceCatalogEntry) -> Vec<CapacityDefinition> {
    let mut definitions = Vec::new();
    let Some(metadata) = entry.metadata.as_ref().and_then(Value::as_object) else {
        return definitions;
    };

    match metadata.get("node_capacity") {
        Some(Value::Object(single)) => definitions.extend(parse_definition(single)),
        Some(Value::Array(list)) => definitions.extend(
            list.iter()
                .filter_map(Value::as_object)
                .filter_map(parse_definition),
        ),
        _ => {}
    }

    if let Some(metric) = metadata.get("node_capacity_metric").and_then(Value::as_str) {
        if !metric.is_empty() {
            definitions.push(CapacityDefinition {
                metric: metric.to_string(),
                per_unit: metadata
                    .get("node_capacity_per_unit")
                    .and_then(parse_ratio)
                    .unwrap_or(1.0),
            });
        }
    }

    definitions
}

fn parse_definition(definition: &serde_json::Map<String, Value>) -> Option<CapacityDefinition> {
    let metric = definition.get("metric").and_then(Value::as_str)?;
    if metric.is_empty() {
        return None;
    }

    let per_unit = definition
        .get("per_unit")
        .filter(|v| !v.is_null())
        .or_else(|| definition.get("per_quantity"))
        .and_then(parse_ratio)
        .unwrap_or(1.0);

    Some(CapacityDefinition {
        metric: metric.to_string(),
        per_unit,
    })
}

/// Numbers and numeric strings; anything else is treated as unset
fn parse_ratio(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Capacity a resolved quantity of `entry` needs
pub fn requirements_for(entry: &ResourceCatalogEntry, quantity: i64) -> CapacityRequirements {
    let mut definitions = capacity_definitions(entry);
    if definitions.is_empty() {
        match default_metric(&entry.resource) {
            Some(metric) => definitions.push(CapacityDefinition {
                metric: metric.to_string(),
                per_unit: 1.0,
            }),
            None => return CapacityRequirements::new(),
        }
    }

    let mut requirements = CapacityRequirements::new();
    for definition in definitions {
        let value = (quantity as f64 * definition.per_unit).ceil();
        let value = if value.is_finite() { value as i64 } else { 0 };
        requirements.add(definition.metric, value);
    }

    requirements
}
