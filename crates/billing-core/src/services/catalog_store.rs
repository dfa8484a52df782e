//! Catalog storage layer
//!
//! Read-only access to the billing tables. Rows are mapped into the model
//! types once here; the quote engine never sees SQL types.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::models::{BillingTerm, Catalog, Coupon, Node, ResourceCatalogEntry, ScalingMode, ScalingRule};

// ============================================================================
// Database Row Types
// ============================================================================

/// Row of `billing_resource_prices`
#[derive(Debug, Clone, FromRow)]
pub struct StoredResourcePrice {
    pub id: i64,
    pub uuid: String,
    pub resource: String,
    pub display_name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub base_quantity: i64,
    pub price: f64,
    pub currency: String,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub default_quantity: i64,
    pub step_quantity: i64,
    pub is_metered: bool,
    pub is_visible: bool,
    pub sort_order: i64,
    pub metadata: Option<String>,
}

impl StoredResourcePrice {
    fn into_entry(self, scaling_rules: Vec<ScalingRule>) -> ResourceCatalogEntry {
        let metadata = parse_metadata(&self.resource, self.metadata.as_deref());
        ResourceCatalogEntry {
            id: self.id,
            uuid: self.uuid,
            resource: self.resource,
            display_name: self.display_name,
            description: self.description,
            unit: self.unit,
            base_quantity: self.base_quantity,
            price: self.price,
            currency: self.currency,
            min_quantity: self.min_quantity,
            max_quantity: self.max_quantity,
            default_quantity: self.default_quantity,
            step_quantity: self.step_quantity,
            is_metered: self.is_metered,
            is_visible: self.is_visible,
            sort_order: self.sort_order,
            metadata,
            scaling_rules,
        }
    }
}

/// Row of `billing_resource_scaling_rules`
#[derive(Debug, Clone, FromRow)]
pub struct StoredScalingRule {
    pub id: i64,
    pub resource_price_id: i64,
    pub threshold: i64,
    pub multiplier: f64,
    pub mode: String,
    pub label: Option<String>,
    pub metadata: Option<String>,
}

impl StoredScalingRule {
    /// Convert to a rule; `None` when the mode is not recognized
    fn to_rule(&self) -> Option<ScalingRule> {
        let mode = match self.mode.parse::<ScalingMode>() {
            Ok(mode) => mode,
            Err(err) => {
                log::warn!("[billing:store] Skipping scaling rule {}: {}", self.id, err);
                return None;
            }
        };

        Some(ScalingRule {
            threshold: self.threshold.max(0),
            mode,
            multiplier: self.multiplier,
            label: self.label.clone(),
            metadata: parse_metadata("scaling rule", self.metadata.as_deref()),
        })
    }
}

/// Row of `billing_terms`
#[derive(Debug, Clone, FromRow)]
pub struct StoredTerm {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub duration_days: i64,
    pub multiplier: f64,
    pub is_active: bool,
    pub is_default: bool,
    pub sort_order: i64,
    pub metadata: Option<String>,
}

impl From<StoredTerm> for BillingTerm {
    fn from(row: StoredTerm) -> Self {
        let metadata = parse_metadata(&row.slug, row.metadata.as_deref());
        BillingTerm {
            id: row.id,
            uuid: row.uuid,
            name: row.name,
            slug: row.slug,
            duration_days: row.duration_days,
            multiplier: row.multiplier,
            is_active: row.is_active,
            is_default: row.is_default,
            sort_order: row.sort_order,
            metadata,
        }
    }
}

/// Row of `nodes` joined with the allocation totals of its servers
#[derive(Debug, Clone, FromRow)]
pub struct StoredNode {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    pub fqdn: String,
    pub scheme: String,
    pub daemon_listen: i64,
    pub daemon_token: String,
    pub memory: i64,
    pub memory_overallocate: i64,
    pub disk: i64,
    pub disk_overallocate: i64,
    pub database_host_id: Option<i64>,
    pub allocated_memory: i64,
    pub allocated_disk: i64,
}

impl From<StoredNode> for Node {
    fn from(row: StoredNode) -> Self {
        let daemon_listen = u16::try_from(row.daemon_listen).unwrap_or_else(|_| {
            log::warn!(
                "[billing:store] Node {} has invalid daemon port {}, using 8080",
                row.uuid,
                row.daemon_listen
            );
            8080
        });

        Node {
            id: row.id,
            uuid: row.uuid,
            name: row.name,
            fqdn: row.fqdn,
            scheme: row.scheme,
            daemon_listen,
            daemon_token: row.daemon_token,
            memory: row.memory,
            memory_overallocate: row.memory_overallocate,
            disk: row.disk,
            disk_overallocate: row.disk_overallocate,
            allocated_memory: row.allocated_memory,
            allocated_disk: row.allocated_disk,
            database_host_id: row.database_host_id,
        }
    }
}

/// Row of `coupons` with its redemption count
#[derive(Debug, Clone, FromRow)]
pub struct StoredCoupon {
    pub id: i64,
    pub uuid: String,
    pub code: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub value: Option<f64>,
    pub percentage: Option<f64>,
    pub max_usages: Option<i64>,
    pub per_user_limit: Option<i64>,
    pub applies_to_term_id: Option<i64>,
    pub starts_at: Option<String>,
    pub expires_at: Option<String>,
    pub is_active: bool,
    pub metadata: Option<String>,
    pub redemptions_count: i64,
}

impl From<StoredCoupon> for Coupon {
    fn from(row: StoredCoupon) -> Self {
        let metadata = parse_metadata(&row.code, row.metadata.as_deref());
        Coupon {
            id: row.id,
            uuid: row.uuid,
            code: row.code,
            name: row.name,
            kind: row.kind,
            value: row.value,
            percentage: row.percentage,
            max_usages: row.max_usages,
            per_user_limit: row.per_user_limit,
            applies_to_term_id: row.applies_to_term_id,
            starts_at: row.starts_at.as_deref().and_then(parse_datetime),
            expires_at: row.expires_at.as_deref().and_then(parse_datetime),
            is_active: row.is_active,
            metadata,
            usage_count: row.redemptions_count,
        }
    }
}

/// Parse a JSON metadata column; unparseable text is dropped with a warning
fn parse_metadata(owner: &str, raw: Option<&str>) -> Option<Value> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("[billing:store] Ignoring invalid metadata on {}: {}", owner, err);
            None
        }
    }
}

/// Parse datetime string (supports both RFC3339 and NaiveDateTime formats)
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    log::warn!("[billing:store] Failed to parse datetime: {}", s);
    None
}

// ============================================================================
// CatalogStore
// ============================================================================

const NODE_SELECT: &str = r#"
    SELECT n.id, n.uuid, n.name, n.fqdn, n.scheme, n.daemon_listen, n.daemon_token,
           n.memory, n.memory_overallocate, n.disk, n.disk_overallocate, n.database_host_id,
           COALESCE((SELECT SUM(s.memory) FROM servers s WHERE s.node_id = n.id), 0) AS allocated_memory,
           COALESCE((SELECT SUM(s.disk) FROM servers s WHERE s.node_id = n.id), 0) AS allocated_disk
    FROM nodes n
"#;

const TERM_SELECT: &str = r#"
    SELECT id, uuid, name, slug, duration_days, multiplier, is_active, is_default,
           sort_order, metadata
    FROM billing_terms
"#;

/// Read access to the billing catalog tables
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Create a new CatalogStore with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the resource catalog with scaling rules attached
    ///
    /// Entries come back ordered by `sort_order, id`; rules by threshold.
    /// Authoring problems are logged, never fatal.
    pub async fn load_catalog(&self, visible_only: bool) -> Result<Catalog> {
        let prices = sqlx::query_as::<_, StoredResourcePrice>(
            r#"
            SELECT id, uuid, resource, display_name, description, unit, base_quantity,
                   price, currency, min_quantity, max_quantity, default_quantity,
                   step_quantity, is_metered, is_visible, sort_order, metadata
            FROM billing_resource_prices
            WHERE (? = 0 OR is_visible = 1)
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .bind(visible_only)
        .fetch_all(&self.pool)
        .await?;

        let rules = sqlx::query_as::<_, StoredScalingRule>(
            r#"
            SELECT id, resource_price_id, threshold, multiplier, mode, label, metadata
            FROM billing_resource_scaling_rules
            ORDER BY resource_price_id ASC, threshold ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rules_by_price: HashMap<i64, Vec<ScalingRule>> = HashMap::new();
        for row in &rules {
            if let Some(rule) = row.to_rule() {
                rules_by_price.entry(row.resource_price_id).or_default().push(rule);
            }
        }

        let entries: Vec<ResourceCatalogEntry> = prices
            .into_iter()
            .map(|row| {
                let rules = rules_by_price.remove(&row.id).unwrap_or_default();
                row.into_entry(rules)
            })
            .collect();

        let catalog = Catalog::new(entries);
        for warning in catalog.warnings() {
            log::warn!("[billing:store] Catalog: {}", warning);
        }

        log::debug!(
            "[billing:store] Loaded {} catalog entries (visible_only={})",
            catalog.len(),
            visible_only
        );

        Ok(catalog)
    }

    /// List billing terms in display order
    pub async fn list_terms(&self, only_active: bool) -> Result<Vec<BillingTerm>> {
        let sql = format!(
            "{} WHERE (? = 0 OR is_active = 1) ORDER BY sort_order ASC, duration_days ASC, id ASC",
            TERM_SELECT
        );
        let rows = sqlx::query_as::<_, StoredTerm>(&sql)
            .bind(only_active)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(BillingTerm::from).collect())
    }

    /// Find a term by uuid, active or not
    pub async fn find_term(&self, uuid: &str) -> Result<Option<BillingTerm>> {
        let sql = format!("{} WHERE uuid = ?", TERM_SELECT);
        let row = sqlx::query_as::<_, StoredTerm>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(BillingTerm::from))
    }

    /// The active term flagged as default, falling back to the first active term
    pub async fn default_term(&self) -> Result<Option<BillingTerm>> {
        let sql = format!(
            "{} WHERE is_active = 1 ORDER BY is_default DESC, sort_order ASC, id ASC LIMIT 1",
            TERM_SELECT
        );
        let row = sqlx::query_as::<_, StoredTerm>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(BillingTerm::from))
    }

    /// Find a node by uuid with its current allocation totals
    pub async fn find_node_by_uuid(&self, uuid: &str) -> Result<Option<Node>> {
        let sql = format!("{} WHERE n.uuid = ?", NODE_SELECT);
        let row = sqlx::query_as::<_, StoredNode>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Node::from))
    }

    /// Find a node by id with its current allocation totals
    pub async fn find_node_by_id(&self, id: i64) -> Result<Option<Node>> {
        let sql = format!("{} WHERE n.id = ?", NODE_SELECT);
        let row = sqlx::query_as::<_, StoredNode>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Node::from))
    }

    /// Coupons matching `codes`, in the order the codes were given
    ///
    /// Unknown and repeated codes are skipped.
    pub async fn find_coupons(&self, codes: &[String]) -> Result<Vec<Coupon>> {
        let mut coupons: Vec<Coupon> = Vec::new();

        for code in codes.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            if coupons.iter().any(|c| c.code == code) {
                continue;
            }

            let row = sqlx::query_as::<_, StoredCoupon>(
                r#"
                SELECT c.id, c.uuid, c.code, c.name, c.type, c.value, c.percentage,
                       c.max_usages, c.per_user_limit, c.applies_to_term_id,
                       c.starts_at, c.expires_at, c.is_active, c.metadata,
                       (SELECT COUNT(*) FROM coupon_redemptions r WHERE r.coupon_id = c.id) AS redemptions_count
                FROM coupons c
                WHERE c.code = ?
                "#,
            )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(row) => coupons.push(Coupon::from(row)),
                None => log::debug!("[billing:store] Coupon code '{}' not found", code),
            }
        }

        Ok(coupons)
    }
}
