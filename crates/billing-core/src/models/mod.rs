//! Data models

pub mod catalog;
pub mod coupon;
pub mod node;
pub mod term;

pub use catalog::{Catalog, CatalogWarning, ResourceCatalogEntry, ScalingMode, ScalingRule};
pub use coupon::Coupon;
pub use node::Node;
pub use term::{BillingTerm, TermSummary};
