//! Coupon definitions
//!
//! Only what is needed to decide whether a coupon applies to a quote and how
//! much it takes off. Redemptions are recorded by the order ledger, this
//! crate only reads their count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A discount code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    #[serde(default)]
    pub id: i64,
    pub uuid: String,
    pub code: String,
    pub name: String,
    /// `amount` or `percentage`; informational, `value`/`percentage` decide
    #[serde(rename = "type")]
    pub kind: String,
    /// Fixed amount taken off the total
    #[serde(default)]
    pub value: Option<f64>,
    /// Fraction of the total taken off (0.1 = 10%)
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub max_usages: Option<i64>,
    #[serde(default)]
    pub per_user_limit: Option<i64>,
    /// Restrict the coupon to one billing term
    #[serde(default)]
    pub applies_to_term_id: Option<i64>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Number of times the coupon was already redeemed
    #[serde(default)]
    pub usage_count: i64,
}

impl Coupon {
    /// Create an active fixed-amount coupon
    pub fn amount(code: impl Into<String>, value: f64) -> Self {
        Self::base(code.into(), "amount", Some(value), None)
    }

    /// Create an active percentage coupon (`fraction` of the total)
    pub fn percentage(code: impl Into<String>, fraction: f64) -> Self {
        Self::base(code.into(), "percentage", None, Some(fraction))
    }

    fn base(code: String, kind: &str, value: Option<f64>, percentage: Option<f64>) -> Self {
        Self {
            id: 0,
            uuid: String::new(),
            name: code.clone(),
            code,
            kind: kind.to_string(),
            value,
            percentage,
            max_usages: None,
            per_user_limit: None,
            applies_to_term_id: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
            metadata: None,
            usage_count: 0,
        }
    }

    /// Whether the coupon can be applied at `now` to a quote on `term_id`
    pub fn is_applicable(&self, now: DateTime<Utc>, term_id: Option<i64>) -> bool {
        if !self.is_active {
            return false;
        }

        if matches!(self.starts_at, Some(starts) if now < starts) {
            return false;
        }

        if matches!(self.expires_at, Some(expires) if now > expires) {
            return false;
        }

        if matches!(self.max_usages, Some(max) if self.usage_count >= max) {
            return false;
        }

        match self.applies_to_term_id {
            Some(required) => term_id == Some(required),
            None => true,
        }
    }

    /// Discount this coupon grants on `total`
    ///
    /// A fixed value takes precedence over a percentage when both are set.
    pub fn discount_for(&self, total: f64) -> f64 {
        match (self.value, self.percentage) {
            (Some(value), _) => value,
            (None, Some(fraction)) => total * fraction,
            (None, None) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_inactive_coupon_not_applicable() {
        let mut coupon = Coupon::amount("SAVE5", 5.0);
        coupon.is_active = false;
        assert!(!coupon.is_applicable(Utc::now(), None));
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        let mut coupon = Coupon::amount("LATER", 5.0);
        coupon.starts_at = Some(now + Duration::days(1));
        assert!(!coupon.is_applicable(now, None));

        coupon.starts_at = Some(now - Duration::days(2));
        coupon.expires_at = Some(now - Duration::days(1));
        assert!(!coupon.is_applicable(now, None));

        coupon.expires_at = Some(now + Duration::days(1));
        assert!(coupon.is_applicable(now, None));
    }

    #[test]
    fn test_usage_limit() {
        let mut coupon = Coupon::percentage("TENOFF", 0.1);
        coupon.max_usages = Some(3);
        coupon.usage_count = 3;
        assert!(!coupon.is_applicable(Utc::now(), None));
        coupon.usage_count = 2;
        assert!(coupon.is_applicable(Utc::now(), None));
    }

    #[test]
    fn test_term_restriction() {
        let mut coupon = Coupon::amount("ANNUAL", 10.0);
        coupon.applies_to_term_id = Some(7);
        assert!(!coupon.is_applicable(Utc::now(), None));
        assert!(!coupon.is_applicable(Utc::now(), Some(8)));
        assert!(coupon.is_applicable(Utc::now(), Some(7)));
    }

    #[test]
    fn test_discount_for() {
        assert_eq!(Coupon::amount("A", 4.5).discount_for(100.0), 4.5);
        assert!((Coupon::percentage("P", 0.25).discount_for(20.0) - 5.0).abs() < 1e-9);
        let mut none = Coupon::amount("N", 0.0);
        none.value = None;
        assert_eq!(none.discount_for(10.0), 0.0);
    }
}
