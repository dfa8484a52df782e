//! Quote engine
//!
//! Holds an immutable catalog snapshot and prices resource bundles against
//! it. Pricing is pure and synchronous; the capacity check is the only async
//! step and happens after every line has been priced.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{BillingTerm, Catalog};
use crate::services::capacity::{CapacityCheckOutcome, CapacityChecker, NodeCapacityChecker};

use super::options::QuoteOptions;
use super::result::QuoteResult;
use super::selection::ResourceSelection;

/// One requested resource line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLine {
    pub resource: String,
    pub quantity: i64,
}

impl QuoteLine {
    pub fn new(resource: impl Into<String>, quantity: i64) -> Self {
        Self {
            resource: resource.into(),
            quantity,
        }
    }
}

/// Prices resource bundles against a catalog
pub struct QuoteEngine {
    catalog: Catalog,
    capacity: Arc<dyn CapacityChecker>,
}

impl QuoteEngine {
    /// Engine that checks capacity against recorded allocations only
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            capacity: Arc::new(NodeCapacityChecker::allocation_only()),
        }
    }

    /// Use a different capacity checker
    pub fn with_capacity_checker(mut self, checker: Arc<dyn CapacityChecker>) -> Self {
        self.capacity = checker;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Price `lines` without any capacity check
    ///
    /// Lines keep their request order. A resource requested twice keeps its
    /// first position and takes the later quantity.
    pub fn price(
        &self,
        lines: &[QuoteLine],
        term: Option<&BillingTerm>,
        options: &QuoteOptions,
    ) -> Result<QuoteResult> {
        let mut selections: Vec<ResourceSelection> = Vec::with_capacity(lines.len());

        for line in lines {
            let entry = self
                .catalog
                .get(&line.resource)
                .ok_or_else(|| Error::unknown_resource(&line.resource))?;

            let selection = ResourceSelection::from_entry(Arc::clone(entry), line.quantity, options);

            match selections.iter_mut().find(|s| s.resource() == line.resource) {
                Some(existing) => {
                    log::debug!(
                        "[billing:quote] Resource '{}' requested more than once, keeping the last quantity",
                        line.resource
                    );
                    *existing = selection;
                }
                None => selections.push(selection),
            }
        }

        let subtotal: f64 = selections.iter().map(ResourceSelection::total).sum();
        let term_multiplier = term.map(BillingTerm::effective_multiplier).unwrap_or(1.0);

        log::debug!(
            "[billing:quote] Priced {} resource(s): subtotal {:.4}, term multiplier {}",
            selections.len(),
            subtotal,
            term_multiplier
        );

        Ok(QuoteResult::new(
            selections,
            subtotal,
            term_multiplier,
            term.map(BillingTerm::summary),
            options.clone(),
        ))
    }

    /// Price `lines` and, when requested, confirm the target node can host them
    pub async fn quote(
        &self,
        lines: &[QuoteLine],
        term: Option<&BillingTerm>,
        options: &QuoteOptions,
    ) -> Result<QuoteResult> {
        self.quote_with_outcome(lines, term, options)
            .await
            .map(|(quote, _)| quote)
    }

    /// Like [`quote`](Self::quote), also returning how the capacity check ended
    ///
    /// The outcome is `None` when no capacity check was requested.
    pub async fn quote_with_outcome(
        &self,
        lines: &[QuoteLine],
        term: Option<&BillingTerm>,
        options: &QuoteOptions,
    ) -> Result<(QuoteResult, Option<CapacityCheckOutcome>)> {
        let quote = self.price(lines, term, options)?;

        let node = match options.node() {
            Some(node) if options.should_validate_capacity() => node,
            _ => return Ok((quote, None)),
        };

        let demand = quote.capacity_requirements();
        let outcome = self.capacity.check(node, &demand).await?;
        log::debug!(
            "[billing:quote] Capacity on node {} for {:?}: {:?}",
            node.uuid,
            demand,
            outcome
        );

        Ok((quote, Some(outcome)))
    }
}
