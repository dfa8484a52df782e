//! # billing-core
//!
//! Resource quote engine for the game-server panel billing module.
//!
//! This crate provides:
//! - Catalog persistence (`db` module, `services::catalog_store`)
//! - Catalog, term, node and coupon models (`models` module)
//! - Quote pricing, coupons and capacity checks (`services` module)
//! - Billing configuration (`config` module)
//! - Unified error handling (`error` module)

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

// Re-exports for convenience
pub use config::BillingConfig;
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from models
pub use models::{BillingTerm, Catalog, Coupon, Node, ResourceCatalogEntry, ScalingMode, ScalingRule};

// Re-export commonly used types from services
pub use services::quote::{
    apply_coupons, CapacityRequirements, DeploymentType, QuoteEngine, QuoteLine, QuoteOptions,
    QuoteRequest, QuoteResult, ResourceSelection,
};
pub use services::{
    BuilderQuote, BuilderQuoteService, CapacityCheckOutcome, CapacityChecker, CatalogStore,
    NodeCapacityChecker,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
