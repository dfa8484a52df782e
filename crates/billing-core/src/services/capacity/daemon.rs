//! Daemon telemetry client
//!
//! Reads system information and live utilization from a node's daemon. The
//! data is best-effort: callers treat every `DaemonError` as "no telemetry".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::DEFAULT_DAEMON_TIMEOUT_SECS;
use crate::models::Node;
use crate::services::quote::parse_flag;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// ============================================================================
// Error Types
// ============================================================================

/// Errors talking to a node daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    /// The request did not finish within the configured timeout
    #[error("Daemon request timed out")]
    Timeout,

    /// The daemon could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The daemon answered with a non-success status
    #[error("Daemon returned HTTP {0}")]
    Status(u16),

    /// The response body could not be understood
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for DaemonError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DaemonError::Timeout
        } else if err.is_decode() {
            DaemonError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            DaemonError::Status(status.as_u16())
        } else {
            DaemonError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::Parse(err.to_string())
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Daemon system information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInformation {
    pub raw: Value,
}

impl SystemInformation {
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    /// Whether the node opted into live utilization telemetry
    ///
    /// Newer daemons nest the flag under `system`, older ones report it at
    /// the top level.
    pub fn is_supercharged(&self) -> bool {
        let nested = self.raw.get("system").and_then(|s| s.get("supercharged"));
        let flag = nested
            .filter(|v| !v.is_null())
            .or_else(|| self.raw.get("supercharged"));
        flag.map(parse_flag).unwrap_or(false)
    }
}

/// Live utilization snapshot, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SystemUtilization {
    #[serde(default)]
    pub memory_total: u64,
    #[serde(default)]
    pub memory_used: u64,
    #[serde(default)]
    pub disk_total: u64,
    #[serde(default)]
    pub disk_used: u64,
}

/// Whole megabytes (MiB) in a byte count, rounded down
pub fn bytes_to_megabytes(bytes: u64) -> i64 {
    (bytes as f64 / BYTES_PER_MB).floor() as i64
}

impl SystemUtilization {
    /// Free memory in MB
    pub fn memory_available_mb(&self) -> i64 {
        bytes_to_megabytes(self.memory_total) - bytes_to_megabytes(self.memory_used)
    }

    /// Free disk in MB
    pub fn disk_available_mb(&self) -> i64 {
        bytes_to_megabytes(self.disk_total) - bytes_to_megabytes(self.disk_used)
    }
}

// ============================================================================
// Client Trait
// ============================================================================

/// Source of daemon telemetry for a node
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Fetch the daemon's system information
    async fn system_information(&self, node: &Node) -> Result<SystemInformation, DaemonError>;

    /// Fetch current memory/disk utilization
    async fn system_utilization(&self, node: &Node) -> Result<SystemUtilization, DaemonError>;
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Daemon client over the daemon's HTTP API
pub struct HttpDaemonClient {
    client: Client,
}

impl HttpDaemonClient {
    /// Create a client with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_DAEMON_TIMEOUT_SECS))
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    pub fn system_url(node: &Node) -> String {
        format!("{}/api/system", node.daemon_base_url())
    }

    pub fn utilization_url(node: &Node) -> String {
        format!("{}/api/system/utilization", node.daemon_base_url())
    }

    async fn get_json(&self, node: &Node, url: &str) -> Result<Value, DaemonError> {
        log::debug!("[billing:daemon] GET {} (node {})", url, node.uuid);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", node.daemon_token))
            .header("Accept", "application/json")
            .header("User-Agent", "Panel-Billing")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("[billing:daemon] {} returned HTTP {}", url, status);
            return Err(DaemonError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Default for HttpDaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DaemonClient for HttpDaemonClient {
    async fn system_information(&self, node: &Node) -> Result<SystemInformation, DaemonError> {
        let raw = self.get_json(node, &Self::system_url(node)).await?;
        Ok(SystemInformation::from_value(raw))
    }

    async fn system_utilization(&self, node: &Node) -> Result<SystemUtilization, DaemonError> {
        let raw = self.get_json(node, &Self::utilization_url(node)).await?;
        Ok(serde_json::from_value(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_supercharged_flag_locations() {
        let nested = SystemInformation::from_value(json!({"system": {"supercharged": true}}));
        assert!(nested.is_supercharged());

        let top = SystemInformation::from_value(json!({"version": "1.11", "supercharged": "1"}));
        assert!(top.is_supercharged());

        let neither = SystemInformation::from_value(json!({"system": {"cpu_threads": 8}}));
        assert!(!neither.is_supercharged());

        let off = SystemInformation::from_value(json!({"system": {"supercharged": false}, "supercharged": true}));
        assert!(!off.is_supercharged());
    }

    #[test]
    fn test_utilization_available_megabytes() {
        let utilization = SystemUtilization {
            memory_total: 4 * GIB,
            memory_used: 7 * GIB / 2,
            disk_total: 100 * GIB,
            disk_used: 40 * GIB,
        };
        assert_eq!(utilization.memory_available_mb(), 512);
        assert_eq!(utilization.disk_available_mb(), 61_440);
    }

    #[test]
    fn test_bytes_to_megabytes_floors() {
        assert_eq!(bytes_to_megabytes(0), 0);
        assert_eq!(bytes_to_megabytes(1024 * 1024 - 1), 0);
        assert_eq!(bytes_to_megabytes(1024 * 1024 * 3 + 5), 3);
    }

    #[test]
    fn test_utilization_deserializes_partial_payload() {
        let utilization: SystemUtilization =
            serde_json::from_value(json!({"memory_total": 2048, "cpu_percent": 12.5})).unwrap();
        assert_eq!(utilization.memory_total, 2048);
        assert_eq!(utilization.disk_used, 0);
    }

    #[test]
    fn test_daemon_urls() {
        let node = Node::new(1, "n-1", 0, 0).with_daemon("https", "node1.example.com", 8080, "t");
        assert_eq!(
            HttpDaemonClient::system_url(&node),
            "https://node1.example.com:8080/api/system"
        );
        assert_eq!(
            HttpDaemonClient::utilization_url(&node),
            "https://node1.example.com:8080/api/system/utilization"
        );
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_an_error() {
        let client = HttpDaemonClient::with_timeout(Duration::from_millis(500));
        let node = Node::new(1, "n-1", 0, 0).with_daemon("http", "127.0.0.1", 9, "t");
        let result = client.system_information(&node).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_daemon_error_display() {
        assert_eq!(DaemonError::Timeout.to_string(), "Daemon request timed out");
        assert_eq!(DaemonError::Status(502).to_string(), "Daemon returned HTTP 502");
    }
}
