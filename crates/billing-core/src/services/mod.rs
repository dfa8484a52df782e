//! Services module - business logic

pub mod builder;
pub mod capacity;
pub mod catalog_store;
pub mod quote;

pub use builder::{BuilderQuote, BuilderQuoteService};
pub use capacity::{CapacityCheckOutcome, CapacityChecker, NodeCapacityChecker};
pub use catalog_store::CatalogStore;
pub use quote::{QuoteEngine, QuoteLine, QuoteOptions, QuoteRequest, QuoteResult};
