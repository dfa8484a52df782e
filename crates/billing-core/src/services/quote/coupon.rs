//! Coupon application
//!
//! Coupons are evaluated against the term-adjusted total of a finished
//! quote. Every applicable coupon contributes; the summed discount goes
//! through `QuoteResult::with_discount`, so the amount due never drops below
//! zero.

use chrono::{DateTime, Utc};

use super::result::QuoteResult;
use super::round_money;
use crate::models::Coupon;

/// A discounted quote and the coupons that produced the discount
#[derive(Debug, Clone)]
pub struct CouponApplication {
    pub quote: QuoteResult,
    /// Coupons that applied, in the order given
    pub applied: Vec<Coupon>,
    /// Codes that were supplied but did not apply
    pub rejected: Vec<String>,
}

impl CouponApplication {
    pub fn applied_codes(&self) -> Vec<&str> {
        self.applied.iter().map(|c| c.code.as_str()).collect()
    }

    pub fn discount(&self) -> f64 {
        self.quote.discount().unwrap_or(0.0)
    }
}

/// Apply `coupons` to `quote` as of `now`
///
/// Any supplied coupon sets the discount fields, to zero when none applies.
/// An empty slice returns the quote unchanged.
pub fn apply_coupons(quote: &QuoteResult, coupons: &[Coupon], now: DateTime<Utc>) -> CouponApplication {
    let term_id = quote.term().map(|t| t.id);
    let total = quote.total();

    let mut applied = Vec::new();
    let mut rejected = Vec::new();
    let mut discount = 0.0;

    for coupon in coupons {
        if !coupon.is_applicable(now, term_id) {
            log::debug!("[billing:quote] Coupon '{}' does not apply", coupon.code);
            rejected.push(coupon.code.clone());
            continue;
        }

        let amount = coupon.discount_for(total);
        if amount.is_finite() && amount > 0.0 {
            discount += amount;
        }
        applied.push(coupon.clone());
    }

    let quote = if coupons.is_empty() {
        quote.clone()
    } else {
        let discount = round_money(discount);
        log::info!(
            "[billing:quote] Applied {} coupon(s) for a discount of {:.4}",
            applied.len(),
            discount
        );
        quote.with_discount(discount)
    };

    CouponApplication {
        quote,
        applied,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingTerm;
    use crate::services::quote::QuoteOptions;
    use chrono::Duration;

    fn quote(total: f64, term: Option<&BillingTerm>) -> QuoteResult {
        QuoteResult::new(
            vec![],
            total,
            1.0,
            term.map(BillingTerm::summary),
            QuoteOptions::default(),
        )
    }

    #[test]
    fn test_fixed_and_percentage_coupons_add_up() {
        let coupons = [Coupon::amount("FIVE", 5.0), Coupon::percentage("TEN", 0.1)];
        let result = apply_coupons(&quote(40.0, None), &coupons, Utc::now());

        assert_eq!(result.applied_codes(), vec!["FIVE", "TEN"]);
        assert_eq!(result.discount(), 9.0);
        assert_eq!(result.quote.total_after_discount(), Some(31.0));
    }

    #[test]
    fn test_no_applicable_coupon_sets_zero_discount() {
        let mut expired = Coupon::amount("OLD", 5.0);
        expired.expires_at = Some(Utc::now() - Duration::days(1));

        let result = apply_coupons(&quote(20.0, None), &[expired], Utc::now());

        assert!(result.applied.is_empty());
        assert_eq!(result.rejected, vec!["OLD".to_string()]);
        assert_eq!(result.quote.discount(), Some(0.0));
        assert_eq!(result.quote.total_after_discount(), Some(20.0));
    }

    #[test]
    fn test_no_coupons_leaves_quote_untouched() {
        let original = quote(20.0, None);
        let result = apply_coupons(&original, &[], Utc::now());

        assert_eq!(result.quote, original);
        assert_eq!(result.quote.discount(), None);
        assert_eq!(result.quote.total_after_discount(), None);
    }

    #[test]
    fn test_term_restricted_coupon() {
        let mut annual = BillingTerm::new("annual", "Annual", 365, 10.0);
        annual.id = 7;
        let mut coupon = Coupon::percentage("ANNUAL20", 0.2);
        coupon.applies_to_term_id = Some(7);

        let on_term = apply_coupons(&quote(100.0, Some(&annual)), &[coupon.clone()], Utc::now());
        assert_eq!(on_term.discount(), 20.0);

        let no_term = apply_coupons(&quote(100.0, None), &[coupon], Utc::now());
        assert!(no_term.applied.is_empty());
    }

    #[test]
    fn test_discount_larger_than_total_floors_at_zero() {
        let result = apply_coupons(&quote(3.0, None), &[Coupon::amount("BIG", 10.0)], Utc::now());
        assert_eq!(result.discount(), 10.0);
        assert_eq!(result.quote.total_after_discount(), Some(0.0));
    }

    #[test]
    fn test_exhausted_coupon_rejected() {
        let mut coupon = Coupon::amount("LIMITED", 1.0);
        coupon.max_usages = Some(3);
        coupon.usage_count = 3;
        let result = apply_coupons(&quote(10.0, None), &[coupon], Utc::now());
        assert_eq!(result.rejected, vec!["LIMITED".to_string()]);
    }
}
