//! Builder quote flow
//!
//! Resolves everything a parsed `QuoteRequest` refers to (term, node,
//! coupons) from the catalog store, prices it, and classifies the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::capacity::{CapacityCheckOutcome, CapacityChecker};
use super::catalog_store::CatalogStore;
use super::quote::{apply_coupons, DeploymentType, NodeReference, QuoteEngine, QuoteOptions, QuoteRequest, QuoteResult};
use crate::error::{Error, Result};
use crate::models::{BillingTerm, Coupon, Node};

/// Everything the builder needs to render a quote
#[derive(Debug, Clone)]
pub struct BuilderQuote {
    pub quote: QuoteResult,
    pub coupons: Vec<Coupon>,
    pub term: Option<BillingTerm>,
    pub node: Option<Node>,
    pub capacity: Option<CapacityCheckOutcome>,
    pub deployment_type: DeploymentType,
}

#[derive(Serialize)]
struct BuilderQuoteView<'a> {
    quote: &'a QuoteResult,
    coupons: &'a [Coupon],
    deployment_type: DeploymentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    capacity: Option<&'a CapacityCheckOutcome>,
}

impl BuilderQuote {
    pub fn to_value(&self) -> Value {
        let view = BuilderQuoteView {
            quote: &self.quote,
            coupons: &self.coupons,
            deployment_type: self.deployment_type,
            capacity: self.capacity.as_ref(),
        };
        serde_json::to_value(view).unwrap_or(Value::Null)
    }
}

/// Prices builder requests against a catalog loaded from the store
pub struct BuilderQuoteService {
    store: CatalogStore,
    engine: QuoteEngine,
}

impl BuilderQuoteService {
    /// Load the full catalog, hidden entries included, and build a service around it
    pub async fn load(store: CatalogStore, checker: Arc<dyn CapacityChecker>) -> Result<Self> {
        let catalog = store.load_catalog(false).await?;
        let engine = QuoteEngine::new(catalog).with_capacity_checker(checker);
        Ok(Self { store, engine })
    }

    pub fn engine(&self) -> &QuoteEngine {
        &self.engine
    }

    /// Price a parsed request as of `now`
    pub async fn calculate(&self, request: &QuoteRequest, now: DateTime<Utc>) -> Result<BuilderQuote> {
        let term = match &request.term {
            Some(uuid) => Some(self.resolve_term(uuid).await?),
            None => None,
        };

        let node = self.resolve_node(request.node.as_ref()).await?;
        let options = QuoteOptions::from_map(&request.flag_options(), node.clone());

        let (quote, capacity) = self
            .engine
            .quote_with_outcome(&request.lines, term.as_ref(), &options)
            .await?;

        let (quote, coupons) = if request.coupons.is_empty() {
            (quote, Vec::new())
        } else {
            let coupons = self.store.find_coupons(&request.coupons).await?;
            let application = apply_coupons(&quote, &coupons, now);
            (application.quote, coupons)
        };

        let deployment_type = quote.deployment_type();
        log::info!(
            "[billing:quote] Builder quote: {} resource(s), total {:.4}, {:?}",
            quote.resources().len(),
            quote.amount_due(),
            deployment_type
        );

        Ok(BuilderQuote {
            quote,
            coupons,
            term,
            node,
            capacity,
            deployment_type,
        })
    }

    async fn resolve_term(&self, uuid: &str) -> Result<BillingTerm> {
        match self.store.find_term(uuid).await? {
            Some(term) if term.is_active => Ok(term),
            _ => Err(Error::UnknownTerm {
                term: uuid.to_string(),
            }),
        }
    }

    /// Node the request points at; a reference to a missing node means no node
    async fn resolve_node(&self, reference: Option<&NodeReference>) -> Result<Option<Node>> {
        let node = match reference {
            Some(NodeReference::Uuid(uuid)) => self.store.find_node_by_uuid(uuid).await?,
            Some(NodeReference::Id(id)) => self.store.find_node_by_id(*id).await?,
            None => return Ok(None),
        };

        if node.is_none() {
            log::debug!("[billing:quote] Requested node {:?} not found, quoting without one", reference);
        }
        Ok(node)
    }
}
