//! Database module - SQLx with SQLite
//!
//! Holds the billing catalog tables the quote engine reads: resource prices
//! and their scaling rules, terms, coupons, nodes and the servers allocated
//! on them.

use crate::config::get_db_path;
use crate::error::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default path
    pub async fn new() -> Result<Self> {
        let db_path = get_db_path()?;
        Self::open(db_path).await
    }

    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        log::info!("[billing:store] Connecting to database: {}", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("[billing:store] Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS billing_resource_prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                resource TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                description TEXT,
                unit TEXT,
                base_quantity INTEGER NOT NULL DEFAULT 1,
                price REAL NOT NULL DEFAULT 0,
                currency TEXT NOT NULL DEFAULT 'USD',
                min_quantity INTEGER NOT NULL DEFAULT 0,
                max_quantity INTEGER,
                default_quantity INTEGER NOT NULL DEFAULT 0,
                step_quantity INTEGER NOT NULL DEFAULT 1,
                is_metered BOOLEAN NOT NULL DEFAULT 0,
                is_visible BOOLEAN NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS billing_resource_scaling_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                resource_price_id INTEGER NOT NULL,
                threshold INTEGER NOT NULL DEFAULT 0,
                multiplier REAL NOT NULL DEFAULT 1,
                mode TEXT NOT NULL DEFAULT 'multiplier',
                label TEXT,
                metadata TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (resource_price_id) REFERENCES billing_resource_prices(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS billing_terms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                duration_days INTEGER NOT NULL DEFAULT 30,
                multiplier REAL NOT NULL DEFAULT 1,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                is_default BOOLEAN NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coupons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                code TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL DEFAULT 'amount',
                value REAL,
                percentage REAL,
                max_usages INTEGER,
                per_user_limit INTEGER,
                applies_to_term_id INTEGER,
                starts_at DATETIME,
                expires_at DATETIME,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                metadata TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (applies_to_term_id) REFERENCES billing_terms(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coupon_redemptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                coupon_id INTEGER NOT NULL,
                user_id INTEGER,
                order_id INTEGER,
                amount REAL NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (coupon_id) REFERENCES coupons(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                fqdn TEXT NOT NULL,
                scheme TEXT NOT NULL DEFAULT 'https',
                daemon_listen INTEGER NOT NULL DEFAULT 8080,
                daemon_token TEXT NOT NULL DEFAULT '',
                memory INTEGER NOT NULL DEFAULT 0,
                memory_overallocate INTEGER NOT NULL DEFAULT 0,
                disk INTEGER NOT NULL DEFAULT 0,
                disk_overallocate INTEGER NOT NULL DEFAULT 0,
                database_host_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT UNIQUE NOT NULL,
                node_id INTEGER NOT NULL,
                memory INTEGER NOT NULL DEFAULT 0,
                disk INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (node_id) REFERENCES nodes(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scaling_rules_resource ON billing_resource_scaling_rules(resource_price_id, threshold)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_coupon_redemptions_coupon ON coupon_redemptions(coupon_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_servers_node_id ON servers(node_id)")
            .execute(&self.pool)
            .await?;

        log::info!("[billing:store] Database migrations completed");
        Ok(())
    }
}
