//! Resource selection: quantity normalization and line costing
//!
//! Normalization order matters:
//!
//! 1. negative requests become 0
//! 2. raise to `min_quantity`
//! 3. lower to `max_quantity` (an entry with `max < min` resolves to `min`)
//! 4. with snapping on and `step > 1`, round **up** to a multiple of the step
//! 5. `max_quantity` is a hard ceiling: a snap that overshoots it falls back
//!    to the largest step multiple under the ceiling, or to the ceiling itself
//!    when that multiple would drop below `min_quantity`
//!
//! Every step starts from the previous step's value, which itself started
//! from the requested quantity.

use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::capacity::{requirements_for, CapacityRequirements};
use super::options::QuoteOptions;
use super::round_money;
use super::scaling::{AppliedRule, ScalingRuleEvaluator};
use crate::models::ResourceCatalogEntry;

/// Resolve a requested quantity against an entry's bounds and step
pub fn normalize_quantity(entry: &ResourceCatalogEntry, requested: i64, snap_to_step: bool) -> i64 {
    let min = entry.min_quantity.max(0);
    let mut quantity = requested.max(0).max(min);

    let ceiling = match entry.max_quantity {
        Some(max) if max < min => {
            log::warn!(
                "[billing:quote] Catalog entry '{}' has max_quantity {} below min_quantity {}, using min",
                entry.resource,
                max,
                min
            );
            Some(min)
        }
        other => other,
    };

    if let Some(max) = ceiling {
        quantity = quantity.min(max);
    }

    let step = entry.step_quantity;
    if snap_to_step && step > 1 {
        quantity = ceil_to_step(quantity, step);

        if let Some(max) = ceiling {
            if quantity > max {
                let floored = (max / step) * step;
                quantity = if floored >= min && floored > 0 { floored } else { max };
            }
        }
    }

    quantity
}

fn ceil_to_step(quantity: i64, step: i64) -> i64 {
    match quantity % step {
        0 => quantity,
        rem => quantity.saturating_sub(rem).saturating_add(step),
    }
}

/// Cost of `quantity` units before rounding, plus the rules that matched
fn line_cost(entry: &ResourceCatalogEntry, quantity: i64) -> (f64, Vec<AppliedRule>) {
    let base_blocks = if entry.base_quantity > 0 {
        quantity as f64 / entry.base_quantity as f64
    } else {
        quantity as f64
    };
    let base_cost = base_blocks * entry.price;

    let outcome = ScalingRuleEvaluator::new(&entry.scaling_rules).evaluate(quantity);
    (outcome.adjust(base_cost), outcome.applied)
}

// ============================================================================
// ResourceSelection
// ============================================================================

/// One priced line of a quote
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSelection {
    entry: Arc<ResourceCatalogEntry>,
    requested_quantity: i64,
    quantity: i64,
    total: f64,
    applied_rules: Vec<AppliedRule>,
}

impl ResourceSelection {
    /// Resolve and price a requested quantity of `entry`
    pub fn from_entry(entry: Arc<ResourceCatalogEntry>, requested: i64, options: &QuoteOptions) -> Self {
        let quantity = normalize_quantity(&entry, requested, options.snap_to_step());
        let (cost, applied_rules) = line_cost(&entry, quantity);

        Self {
            requested_quantity: requested.max(0),
            quantity,
            total: round_money(cost),
            applied_rules,
            entry,
        }
    }

    pub fn resource(&self) -> &str {
        &self.entry.resource
    }

    pub fn entry(&self) -> &ResourceCatalogEntry {
        &self.entry
    }

    /// Requested quantity after clamping negatives to zero
    pub fn requested_quantity(&self) -> i64 {
        self.requested_quantity
    }

    /// Resolved quantity
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Line total rounded to 4 decimals
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn applied_rules(&self) -> &[AppliedRule] {
        &self.applied_rules
    }

    pub fn is_metered(&self) -> bool {
        self.entry.is_metered
    }

    /// Physical capacity this line needs on a node
    pub fn capacity_requirements(&self) -> CapacityRequirements {
        requirements_for(&self.entry, self.quantity)
    }
}

#[derive(Serialize)]
struct SelectionView<'a> {
    resource: &'a str,
    display_name: &'a str,
    quantity: i64,
    unit: Option<&'a str>,
    base_quantity: i64,
    base_price: f64,
    applied_rules: &'a [AppliedRule],
    total: f64,
}

impl Serialize for ResourceSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SelectionView {
            resource: &self.entry.resource,
            display_name: &self.entry.display_name,
            quantity: self.quantity,
            unit: self.entry.unit.as_deref(),
            base_quantity: self.entry.base_quantity,
            base_price: self.entry.price,
            applied_rules: &self.applied_rules,
            total: self.total,
        }
        .serialize(serializer)
    }
}
