//! Billing configuration
//!
//! Settings are read from environment variables with sensible defaults, the
//! same way the database path is resolved.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for daemon telemetry requests, in seconds
pub const DEFAULT_DAEMON_TIMEOUT_SECS: u64 = 10;

/// Minimum timeout for daemon telemetry requests, in seconds
pub const MIN_DAEMON_TIMEOUT_SECS: u64 = 1;

/// Default account currency
pub const DEFAULT_CURRENCY_CODE: &str = "USD";

const ENV_ENABLED: &str = "PANEL_BILLING_ENABLED";
const ENV_CURRENCY: &str = "PANEL_BILLING_CURRENCY";
const ENV_CURRENCY_SYMBOL: &str = "PANEL_BILLING_CURRENCY_SYMBOL";
const ENV_DAEMON_TIMEOUT: &str = "PANEL_DAEMON_TIMEOUT_SECS";
const ENV_DB_PATH: &str = "PANEL_BILLING_DB_PATH";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the billing module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Whether the billing module is enabled; gates live daemon telemetry
    pub enabled: bool,
    /// ISO currency code every price is expressed in
    pub currency_code: String,
    /// Display symbol for the currency
    pub currency_symbol: String,
    /// Timeout for daemon telemetry requests, in seconds
    pub daemon_timeout_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            currency_code: DEFAULT_CURRENCY_CODE.to_string(),
            currency_symbol: "$".to_string(),
            daemon_timeout_secs: DEFAULT_DAEMON_TIMEOUT_SECS,
        }
    }
}

impl BillingConfig {
    /// Load configuration from `PANEL_*` environment variables
    ///
    /// Unset variables keep their defaults. A timeout that is not a number is
    /// reported as a configuration error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_ENABLED) {
            config.enabled = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        if let Ok(code) = std::env::var(ENV_CURRENCY) {
            if !code.trim().is_empty() {
                config.currency_code = code;
            }
        }

        if let Ok(symbol) = std::env::var(ENV_CURRENCY_SYMBOL) {
            config.currency_symbol = symbol;
        }

        if let Ok(timeout) = std::env::var(ENV_DAEMON_TIMEOUT) {
            config.daemon_timeout_secs = timeout.trim().parse().map_err(|_| {
                Error::config(format!("{} must be a whole number of seconds", ENV_DAEMON_TIMEOUT))
            })?;
        }

        Ok(config.validate())
    }

    /// Validate and normalize the configuration
    pub fn validate(&self) -> Self {
        Self {
            enabled: self.enabled,
            currency_code: self.currency_code.trim().to_ascii_uppercase(),
            currency_symbol: self.currency_symbol.clone(),
            daemon_timeout_secs: self.daemon_timeout_secs.max(MIN_DAEMON_TIMEOUT_SECS),
        }
    }

    /// Daemon request timeout as a `Duration`
    pub fn daemon_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon_timeout_secs.max(MIN_DAEMON_TIMEOUT_SECS))
    }
}

/// Resolve the path of the billing catalog database
pub fn get_db_path() -> Result<PathBuf> {
    // Check for environment variable override
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        return Ok(PathBuf::from(path));
    }

    let dirs = directories::ProjectDirs::from("com", "panel", "Billing")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("billing.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = BillingConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.currency_code, "USD");
        assert_eq!(config.daemon_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_clamps_timeout_and_normalizes_currency() {
        let config = BillingConfig {
            enabled: true,
            currency_code: " eur ".to_string(),
            currency_symbol: "€".to_string(),
            daemon_timeout_secs: 0,
        }
        .validate();

        assert_eq!(config.currency_code, "EUR");
        assert_eq!(config.daemon_timeout_secs, MIN_DAEMON_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_env_reads_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_ENABLED, "true");
        std::env::set_var(ENV_DAEMON_TIMEOUT, "3");

        let config = BillingConfig::from_env().unwrap();
        assert!(config.enabled);
        assert_eq!(config.daemon_timeout_secs, 3);

        std::env::remove_var(ENV_ENABLED);
        std::env::remove_var(ENV_DAEMON_TIMEOUT);
    }

    #[test]
    fn test_from_env_rejects_bad_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_DAEMON_TIMEOUT, "soon");

        let result = BillingConfig::from_env();
        assert!(matches!(result, Err(Error::Config(_))));

        std::env::remove_var(ENV_DAEMON_TIMEOUT);
    }

    #[test]
    fn test_get_db_path_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ENV_DB_PATH, "/tmp/billing-test.db");

        let path = get_db_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/billing-test.db"));

        std::env::remove_var(ENV_DB_PATH);
    }
}
