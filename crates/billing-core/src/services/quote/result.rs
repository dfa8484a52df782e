//! Quote result
//!
//! Immutable aggregate of priced selections plus term data. Discounts never
//! mutate a result; `with_discount` returns a new one.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::capacity::CapacityRequirements;
use super::options::QuoteOptions;
use super::round_money;
use super::selection::ResourceSelection;
use crate::models::TermSummary;

/// How a priced order will be provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    /// Nothing to charge
    Free,
    /// Charged up front
    Paid,
    /// At least one selected resource is billed on usage
    Metered,
}

/// A priced, validated quote
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResult {
    /// Selections in request order, one per resource key
    resources: Vec<ResourceSelection>,
    subtotal: f64,
    term_multiplier: f64,
    term: Option<TermSummary>,
    options: QuoteOptions,
    discount: Option<f64>,
    total_after_discount: Option<f64>,
}

impl QuoteResult {
    pub fn new(
        resources: Vec<ResourceSelection>,
        subtotal: f64,
        term_multiplier: f64,
        term: Option<TermSummary>,
        options: QuoteOptions,
    ) -> Self {
        Self {
            resources,
            subtotal: round_money(subtotal),
            term_multiplier: clamp_multiplier(term_multiplier),
            term,
            options,
            discount: None,
            total_after_discount: None,
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.subtotal
    }

    pub fn term_multiplier(&self) -> f64 {
        self.term_multiplier
    }

    /// Subtotal scaled by the term multiplier, rounded to 4 decimals
    pub fn total(&self) -> f64 {
        round_money(self.subtotal * self.term_multiplier)
    }

    pub fn term(&self) -> Option<&TermSummary> {
        self.term.as_ref()
    }

    pub fn options(&self) -> &QuoteOptions {
        &self.options
    }

    pub fn resources(&self) -> &[ResourceSelection] {
        &self.resources
    }

    /// Selection for a resource key
    pub fn resource(&self, key: &str) -> Option<&ResourceSelection> {
        self.resources.iter().find(|s| s.resource() == key)
    }

    pub fn discount(&self) -> Option<f64> {
        self.discount
    }

    pub fn total_after_discount(&self) -> Option<f64> {
        self.total_after_discount
    }

    /// Amount due: the discounted total when a discount was applied
    pub fn amount_due(&self) -> f64 {
        self.total_after_discount.unwrap_or_else(|| self.total())
    }

    /// Copy of this quote with a discount applied
    ///
    /// Negative or non-finite discounts count as zero; the discounted total
    /// never goes below zero.
    pub fn with_discount(&self, discount: f64) -> Self {
        let discount = if discount.is_finite() {
            round_money(discount.max(0.0))
        } else {
            0.0
        };
        let total_after_discount = round_money(self.total() - discount).max(0.0);

        Self {
            discount: Some(discount),
            total_after_discount: Some(total_after_discount),
            ..self.clone()
        }
    }

    /// Capacity demand of all selections, summed per metric
    pub fn capacity_requirements(&self) -> CapacityRequirements {
        let mut demand = CapacityRequirements::new();
        for selection in &self.resources {
            demand.merge(&selection.capacity_requirements());
        }
        demand
    }

    /// Classify the quote for provisioning
    pub fn deployment_type(&self) -> DeploymentType {
        let metered = self
            .resources
            .iter()
            .any(|s| s.quantity() > 0 && s.is_metered());

        if metered {
            DeploymentType::Metered
        } else if self.amount_due() <= 0.0 {
            DeploymentType::Free
        } else {
            DeploymentType::Paid
        }
    }

    /// Serialized response as a JSON value
    pub fn to_value(&self) -> Value {
        // Serializing owned f64/strings/maps into a Value cannot fail
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn clamp_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() {
        multiplier.max(0.0)
    } else {
        0.0
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Resources keyed by resource identifier, in request order
struct ResourcesView<'a>(&'a [ResourceSelection]);

impl Serialize for ResourcesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for selection in self.0 {
            map.serialize_entry(selection.resource(), selection)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct QuoteView<'a> {
    subtotal: f64,
    total: f64,
    term_multiplier: f64,
    term: Option<&'a TermSummary>,
    resources: ResourcesView<'a>,
    options: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_after_discount: Option<f64>,
}

impl Serialize for QuoteResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        QuoteView {
            subtotal: self.subtotal,
            total: self.total(),
            term_multiplier: self.term_multiplier,
            term: self.term.as_ref(),
            resources: ResourcesView(&self.resources),
            options: self.options.to_map(),
            discount: self.discount,
            total_after_discount: self.total_after_discount,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingTerm, ResourceCatalogEntry};
    use serde_json::json;
    use std::sync::Arc;

    fn selection(resource: &str, price: f64, quantity: i64) -> ResourceSelection {
        ResourceSelection::from_entry(
            Arc::new(ResourceCatalogEntry::new(resource, price)),
            quantity,
            &QuoteOptions::default(),
        )
    }

    #[test]
    fn test_term_multiplier_applied_to_total() {
        let quote = QuoteResult::new(vec![], 20.0, 0.85, None, QuoteOptions::default());
        assert_eq!(quote.total(), 17.0);
    }

    #[test]
    fn test_negative_multiplier_clamped() {
        let quote = QuoteResult::new(vec![], 20.0, -1.0, None, QuoteOptions::default());
        assert_eq!(quote.term_multiplier(), 0.0);
        assert_eq!(quote.total(), 0.0);
    }

    #[test]
    fn test_subtotal_rounded() {
        let quote = QuoteResult::new(vec![], 1.234_56, 1.0, None, QuoteOptions::default());
        assert_eq!(quote.subtotal(), 1.2346);
    }

    #[test]
    fn test_with_discount_returns_new_result() {
        let quote = QuoteResult::new(vec![], 10.0, 1.0, None, QuoteOptions::default());
        let discounted = quote.with_discount(3.25);

        assert_eq!(quote.discount(), None);
        assert_eq!(discounted.discount(), Some(3.25));
        assert_eq!(discounted.total_after_discount(), Some(6.75));
        assert_eq!(discounted.total(), 10.0);
        assert_eq!(discounted.amount_due(), 6.75);
    }

    #[test]
    fn test_discount_never_below_zero() {
        let quote = QuoteResult::new(vec![], 5.0, 1.0, None, QuoteOptions::default());
        assert_eq!(quote.with_discount(50.0).total_after_discount(), Some(0.0));
        assert_eq!(quote.with_discount(-4.0).discount(), Some(0.0));
    }

    #[test]
    fn test_deployment_type() {
        let free = QuoteResult::new(vec![selection("backups", 0.0, 2)], 0.0, 1.0, None, QuoteOptions::default());
        assert_eq!(free.deployment_type(), DeploymentType::Free);

        let paid = QuoteResult::new(vec![selection("cpu", 1.0, 2)], 2.0, 1.0, None, QuoteOptions::default());
        assert_eq!(paid.deployment_type(), DeploymentType::Paid);
        assert_eq!(paid.with_discount(2.0).deployment_type(), DeploymentType::Free);

        let metered_entry = ResourceCatalogEntry::new("bandwidth", 0.1).metered();
        let metered = QuoteResult::new(
            vec![ResourceSelection::from_entry(Arc::new(metered_entry), 5, &QuoteOptions::default())],
            0.5,
            1.0,
            None,
            QuoteOptions::default(),
        );
        assert_eq!(metered.deployment_type(), DeploymentType::Metered);
    }

    #[test]
    fn test_serialized_shape() {
        let term = BillingTerm::new("term-uuid", "Monthly", 30, 1.0);
        let quote = QuoteResult::new(
            vec![selection("disk", 0.5, 4), selection("cpu", 1.0, 2)],
            4.0,
            1.0,
            Some(term.summary()),
            QuoteOptions::default(),
        );
        let value = quote.to_value();

        assert_eq!(value["subtotal"], json!(4.0));
        assert_eq!(value["total"], json!(4.0));
        assert_eq!(value["term_multiplier"], json!(1.0));
        assert_eq!(value["term"]["uuid"], json!("term-uuid"));
        assert_eq!(value["options"], json!({"snapToStep": true, "validateCapacity": false}));
        assert!(value.get("discount").is_none());
        assert!(value.get("total_after_discount").is_none());

        let keys: Vec<&String> = value["resources"].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(value["resources"]["disk"]["quantity"], json!(4));

        let discounted = quote.with_discount(1.0).to_value();
        assert_eq!(discounted["discount"], json!(1.0));
        assert_eq!(discounted["total_after_discount"], json!(3.0));
    }

    #[test]
    fn test_null_term_serialized() {
        let quote = QuoteResult::new(vec![], 0.0, 1.0, None, QuoteOptions::default());
        assert_eq!(quote.to_value()["term"], Value::Null);
    }
}
