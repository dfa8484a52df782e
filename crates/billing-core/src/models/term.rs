//! Billing term (monthly, annual, ...) carrying a price multiplier

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A billing duration with its price multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingTerm {
    #[serde(default)]
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub duration_days: i64,
    pub multiplier: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// Presentational term data embedded in a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSummary {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub duration_days: i64,
    pub multiplier: f64,
}

impl BillingTerm {
    /// Create an active term
    pub fn new(
        uuid: impl Into<String>,
        name: impl Into<String>,
        duration_days: i64,
        multiplier: f64,
    ) -> Self {
        let name = name.into();
        Self {
            id: 0,
            uuid: uuid.into(),
            slug: slugify(&name),
            name,
            duration_days,
            multiplier,
            is_active: true,
            is_default: false,
            sort_order: 0,
            metadata: None,
        }
    }

    /// Multiplier clamped to be non-negative
    pub fn effective_multiplier(&self) -> f64 {
        if self.multiplier.is_finite() {
            self.multiplier.max(0.0)
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> TermSummary {
        TermSummary {
            id: self.id,
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            duration_days: self.duration_days,
            multiplier: self.effective_multiplier(),
        }
    }
}

/// Lowercase, dash-separated slug of a display name
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
