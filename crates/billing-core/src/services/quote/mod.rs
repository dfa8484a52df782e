//! Resource quote engine
//!
//! Turns a requested resource bundle, an optional billing term and quote
//! options into a priced, validated quote.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ QuoteRequest (boundary parsing)                         │
//! │   - resources, term uuid, options, coupon codes         │
//! └─────────────────────────────────────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │ QuoteEngine (catalog snapshot)                          │
//! │   - price()  -> ResourceSelection per line (pure)       │
//! │   - quote()  -> price() + capacity check                │
//! └─────────────────────────────────────────────────────────┘
//!          │                              │
//!          ▼                              ▼
//! ┌──────────────────────┐     ┌──────────────────────────┐
//! │ ResourceSelection    │     │ trait CapacityChecker    │
//! │  - normalize qty     │     │  NodeCapacityChecker     │
//! │  - scaling rules     │     │   - allocation ceiling   │
//! │  - capacity demand   │     │   - daemon telemetry     │
//! └──────────────────────┘     └──────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │ QuoteResult -> apply_coupons / with_discount -> JSON    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use billing_core::services::quote::{QuoteEngine, QuoteLine, QuoteOptions};
//!
//! let engine = QuoteEngine::new(catalog);
//! let options = QuoteOptions::from_value(&raw_options, node);
//! let quote = engine
//!     .quote(&[QuoteLine::new("memory", 4096)], Some(&term), &options)
//!     .await?;
//! let response = quote.with_discount(2.0).to_value();
//! ```

pub mod capacity;
pub mod coupon;
pub mod engine;
pub mod options;
pub mod request;
pub mod result;
pub mod scaling;
pub mod selection;

pub use capacity::{CapacityDefinition, CapacityRequirements};
pub use coupon::{apply_coupons, CouponApplication};
pub use engine::{QuoteEngine, QuoteLine};
pub use options::{parse_flag, QuoteOptions};
pub use request::{NodeReference, QuoteRequest};
pub use result::{DeploymentType, QuoteResult};
pub use scaling::{AppliedRule, ScalingOutcome, ScalingRuleEvaluator};
pub use selection::{normalize_quantity, ResourceSelection};

/// Round a money amount to 4 decimals, halves away from zero
pub fn round_money(amount: f64) -> f64 {
    (amount * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(1.234_56), 1.2346);
        assert_eq!(round_money(1.234_54), 1.2345);
        assert_eq!(round_money(3.0), 3.0);
    }
}
