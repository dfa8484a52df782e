//! Resource catalog types
//!
//! A catalog entry describes one billable resource: its bounds, step, block
//! price and the ordered scaling rules that adjust that price. Entries are
//! authored by administrators elsewhere and are read-only here.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Scaling Rules
// ============================================================================

/// How a scaling rule adjusts the price once its threshold is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    /// Replace the running price multiplier
    Multiplier,
    /// Add a flat amount to the base cost
    Surcharge,
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingMode::Multiplier => write!(f, "multiplier"),
            ScalingMode::Surcharge => write!(f, "surcharge"),
        }
    }
}

impl std::str::FromStr for ScalingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "multiplier" => Ok(ScalingMode::Multiplier),
            "surcharge" => Ok(ScalingMode::Surcharge),
            _ => Err(format!("Unknown scaling mode: {}", s)),
        }
    }
}

/// A threshold-triggered price adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRule {
    /// Resolved quantity at which the rule starts to apply
    pub threshold: i64,
    pub mode: ScalingMode,
    /// Multiplier in `Multiplier` mode, flat surcharge amount in `Surcharge` mode
    pub multiplier: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ScalingRule {
    /// Create a multiplier rule
    pub fn multiplier(threshold: i64, multiplier: f64) -> Self {
        Self {
            threshold,
            mode: ScalingMode::Multiplier,
            multiplier,
            label: None,
            metadata: None,
        }
    }

    /// Create a surcharge rule
    pub fn surcharge(threshold: i64, amount: f64) -> Self {
        Self {
            threshold,
            mode: ScalingMode::Surcharge,
            multiplier: amount,
            label: None,
            metadata: None,
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ============================================================================
// Catalog Entry
// ============================================================================

/// Catalog description of one billable resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCatalogEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uuid: String,
    /// Unique resource key (e.g. `memory`, `backups`)
    pub resource: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Billing block size; `price` is charged per block
    pub base_quantity: i64,
    pub price: f64,
    pub currency: String,
    pub min_quantity: i64,
    /// `None` means unbounded
    #[serde(default)]
    pub max_quantity: Option<i64>,
    pub default_quantity: i64,
    /// Quantity granularity; values of 1 or less disable snapping
    pub step_quantity: i64,
    #[serde(default)]
    pub is_metered: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub sort_order: i64,
    /// Free-form metadata; `node_capacity` definitions live here
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Rules in evaluation order (ascending threshold)
    #[serde(default)]
    pub scaling_rules: Vec<ScalingRule>,
}

fn default_true() -> bool {
    true
}

impl ResourceCatalogEntry {
    /// Create an entry with unit block size, no bounds and no rules
    pub fn new(resource: impl Into<String>, price: f64) -> Self {
        let resource = resource.into();
        Self {
            id: 0,
            uuid: String::new(),
            display_name: resource.clone(),
            resource,
            description: None,
            unit: None,
            base_quantity: 1,
            price,
            currency: crate::config::DEFAULT_CURRENCY_CODE.to_string(),
            min_quantity: 0,
            max_quantity: None,
            default_quantity: 0,
            step_quantity: 1,
            is_metered: false,
            is_visible: true,
            sort_order: 0,
            metadata: None,
            scaling_rules: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_base_quantity(mut self, base_quantity: i64) -> Self {
        self.base_quantity = base_quantity;
        self
    }

    /// Set the allowed quantity range
    pub fn with_bounds(mut self, min: i64, max: Option<i64>) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step_quantity = step;
        self
    }

    pub fn with_rule(mut self, rule: ScalingRule) -> Self {
        self.scaling_rules.push(rule);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metered(mut self) -> Self {
        self.is_metered = true;
        self
    }

    /// Check the entry for authoring mistakes the engine has to tolerate
    pub fn validate(&self) -> Vec<CatalogWarning> {
        let mut warnings = Vec::new();

        if let Some(max) = self.max_quantity {
            if max < self.min_quantity {
                warnings.push(CatalogWarning::MaxBelowMin {
                    resource: self.resource.clone(),
                    min: self.min_quantity,
                    max,
                });
            }
        }

        if self.step_quantity < 1 {
            warnings.push(CatalogWarning::InvalidStep {
                resource: self.resource.clone(),
                step: self.step_quantity,
            });
        }

        if self.base_quantity < 1 {
            warnings.push(CatalogWarning::InvalidBaseQuantity {
                resource: self.resource.clone(),
                base_quantity: self.base_quantity,
            });
        }

        if self.price < 0.0 {
            warnings.push(CatalogWarning::NegativePrice {
                resource: self.resource.clone(),
                price: self.price,
            });
        }

        warnings
    }
}

/// A catalog authoring problem that does not stop quoting
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogWarning {
    MaxBelowMin { resource: String, min: i64, max: i64 },
    InvalidStep { resource: String, step: i64 },
    InvalidBaseQuantity { resource: String, base_quantity: i64 },
    NegativePrice { resource: String, price: f64 },
}

impl fmt::Display for CatalogWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogWarning::MaxBelowMin { resource, min, max } => write!(
                f,
                "{}: max_quantity {} is below min_quantity {}, min is used",
                resource, max, min
            ),
            CatalogWarning::InvalidStep { resource, step } => {
                write!(f, "{}: step_quantity {} disables snapping", resource, step)
            }
            CatalogWarning::InvalidBaseQuantity {
                resource,
                base_quantity,
            } => write!(
                f,
                "{}: base_quantity {} is not positive, price applies per unit",
                resource, base_quantity
            ),
            CatalogWarning::NegativePrice { resource, price } => {
                write!(f, "{}: negative price {}", resource, price)
            }
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// An ordered, immutable snapshot of catalog entries
///
/// Entries are shared with the selections built from them, so a quote can
/// outlive the catalog it was priced against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<Arc<ResourceCatalogEntry>>,
}

impl Catalog {
    /// Build a catalog; a later entry with a duplicate key replaces the earlier one
    pub fn new(entries: Vec<ResourceCatalogEntry>) -> Self {
        let mut deduped: Vec<Arc<ResourceCatalogEntry>> = Vec::with_capacity(entries.len());
        for entry in entries {
            match deduped.iter_mut().find(|e| e.resource == entry.resource) {
                Some(existing) => *existing = Arc::new(entry),
                None => deduped.push(Arc::new(entry)),
            }
        }
        Self { entries: deduped }
    }

    /// Look up an entry by resource key
    pub fn get(&self, resource: &str) -> Option<&Arc<ResourceCatalogEntry>> {
        self.entries.iter().find(|e| e.resource == resource)
    }

    /// Entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceCatalogEntry> {
        self.entries.iter().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Only the entries shown to customers
    pub fn visible(&self) -> impl Iterator<Item = &ResourceCatalogEntry> {
        self.iter().filter(|e| e.is_visible)
    }

    /// Authoring warnings across every entry
    pub fn warnings(&self) -> Vec<CatalogWarning> {
        self.iter().flat_map(|e| e.validate()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_mode_parse() {
        assert_eq!("multiplier".parse::<ScalingMode>(), Ok(ScalingMode::Multiplier));
        assert_eq!("Surcharge".parse::<ScalingMode>(), Ok(ScalingMode::Surcharge));
        assert!("discount".parse::<ScalingMode>().is_err());
        assert_eq!(ScalingMode::Surcharge.to_string(), "surcharge");
    }

    #[test]
    fn test_entry_deserializes_with_defaults() {
        let json = r#"{
            "resource": "memory",
            "display_name": "Memory",
            "base_quantity": 1024,
            "price": 5.0,
            "currency": "USD",
            "min_quantity": 1024,
            "default_quantity": 2048,
            "step_quantity": 1024,
            "scaling_rules": [{"threshold": 4096, "mode": "multiplier", "multiplier": 0.9}]
        }"#;

        let entry: ResourceCatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.max_quantity, None);
        assert!(entry.is_visible);
        assert!(!entry.is_metered);
        assert_eq!(entry.scaling_rules.len(), 1);
        assert_eq!(entry.scaling_rules[0].mode, ScalingMode::Multiplier);
    }

    #[test]
    fn test_validate_flags_max_below_min() {
        let entry = ResourceCatalogEntry::new("disk", 1.0).with_bounds(2048, Some(1024));
        let warnings = entry.validate();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], CatalogWarning::MaxBelowMin { max: 1024, .. }));
        assert!(warnings[0].to_string().contains("below min_quantity"));
    }

    #[test]
    fn test_validate_clean_entry() {
        let entry = ResourceCatalogEntry::new("cpu", 2.0)
            .with_bounds(50, Some(400))
            .with_step(50);
        assert!(entry.validate().is_empty());
    }

    #[test]
    fn test_catalog_lookup_and_duplicates() {
        let catalog = Catalog::new(vec![
            ResourceCatalogEntry::new("memory", 1.0),
            ResourceCatalogEntry::new("disk", 0.5),
            ResourceCatalogEntry::new("memory", 2.0),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.iter().next().unwrap().resource, "memory");
        assert_eq!(catalog.get("memory").unwrap().price, 2.0);
        assert!(catalog.get("gpu").is_none());
    }
}
