//! Node capacity checking
//!
//! Confirms that a node can host the capacity a quote demands. The node's
//! recorded allocation is the source of truth and is always checked first.
//! Live daemon telemetry is an optional second opinion: it only runs when
//! billing is enabled and the node reports itself as supercharged, and any
//! daemon failure fails open.

pub mod daemon;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::BillingConfig;
use crate::error::{Error, Result};
use crate::models::Node;
use crate::services::quote::CapacityRequirements;

pub use daemon::{DaemonClient, DaemonError, HttpDaemonClient, SystemInformation, SystemUtilization};

/// How a capacity check concluded, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CapacityCheckOutcome {
    /// Every check that ran passed
    Confirmed,
    /// Allocation passed; live telemetry was not consulted
    SkippedNoTelemetry,
    /// Allocation passed; the daemon could not be read
    SkippedDaemonError { reason: String },
}

impl CapacityCheckOutcome {
    /// Whether live telemetry was skipped for any reason
    pub fn is_skipped(&self) -> bool {
        !matches!(self, CapacityCheckOutcome::Confirmed)
    }
}

/// Decides whether a node can host a capacity demand
#[async_trait]
pub trait CapacityChecker: Send + Sync {
    /// Check `demand` against `node`
    ///
    /// Returns `Error::InsufficientCapacity` when the node cannot host it.
    async fn check(&self, node: &Node, demand: &CapacityRequirements) -> Result<CapacityCheckOutcome>;
}

// ============================================================================
// NodeCapacityChecker
// ============================================================================

/// Allocation ceiling check with optional daemon telemetry
pub struct NodeCapacityChecker {
    daemon: Option<Arc<dyn DaemonClient>>,
    telemetry_enabled: bool,
}

impl NodeCapacityChecker {
    /// Checker that consults `daemon` when billing is enabled in `config`
    pub fn new(daemon: Arc<dyn DaemonClient>, config: &BillingConfig) -> Self {
        Self {
            daemon: Some(daemon),
            telemetry_enabled: config.enabled,
        }
    }

    /// Checker backed by an HTTP daemon client using the configured timeout
    pub fn from_config(config: &BillingConfig) -> Self {
        let client = HttpDaemonClient::with_timeout(config.daemon_timeout());
        Self::new(Arc::new(client), config)
    }

    /// Checker that only looks at recorded allocations
    pub fn allocation_only() -> Self {
        Self {
            daemon: None,
            telemetry_enabled: false,
        }
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled && self.daemon.is_some()
    }

    /// Check memory and disk demand (MB) against `node`
    pub async fn assert_can_allocate(
        &self,
        node: &Node,
        memory_mb: i64,
        disk_mb: i64,
    ) -> Result<CapacityCheckOutcome> {
        let memory_mb = memory_mb.max(0);
        let disk_mb = disk_mb.max(0);

        if memory_mb == 0 && disk_mb == 0 {
            return Ok(CapacityCheckOutcome::Confirmed);
        }

        if !node.is_viable(memory_mb, disk_mb) {
            log::info!(
                "[billing:capacity] Node {} rejected by allocation: +{} MB memory, +{} MB disk",
                node.uuid,
                memory_mb,
                disk_mb
            );
            return Err(Error::insufficient_capacity(
                &node.uuid,
                allocation_detail(node, memory_mb, disk_mb),
            ));
        }

        let daemon = match &self.daemon {
            Some(daemon) if self.telemetry_enabled => daemon,
            _ => return Ok(CapacityCheckOutcome::SkippedNoTelemetry),
        };

        let utilization = match self.live_utilization(daemon.as_ref(), node).await {
            Ok(Some(utilization)) => utilization,
            Ok(None) => return Ok(CapacityCheckOutcome::SkippedNoTelemetry),
            Err(err) => {
                log::warn!(
                    "[billing:capacity] Daemon telemetry for node {} unavailable, allowing: {}",
                    node.uuid,
                    err
                );
                return Ok(CapacityCheckOutcome::SkippedDaemonError {
                    reason: err.to_string(),
                });
            }
        };

        let available_memory = utilization.memory_available_mb();
        if memory_mb > 0 && available_memory < memory_mb {
            return Err(Error::insufficient_capacity(
                &node.uuid,
                format!(
                    "requires {} MB memory, daemon reports {} MB available",
                    memory_mb, available_memory
                ),
            ));
        }

        let available_disk = utilization.disk_available_mb();
        if disk_mb > 0 && available_disk < disk_mb {
            return Err(Error::insufficient_capacity(
                &node.uuid,
                format!(
                    "requires {} MB disk, daemon reports {} MB available",
                    disk_mb, available_disk
                ),
            ));
        }

        log::debug!(
            "[billing:capacity] Node {} confirmed by telemetry ({} MB memory, {} MB disk free)",
            node.uuid,
            available_memory,
            available_disk
        );
        Ok(CapacityCheckOutcome::Confirmed)
    }

    /// Utilization snapshot, or `None` when the node is not supercharged
    async fn live_utilization(
        &self,
        daemon: &dyn DaemonClient,
        node: &Node,
    ) -> std::result::Result<Option<SystemUtilization>, DaemonError> {
        let information = daemon.system_information(node).await?;
        if !information.is_supercharged() {
            log::debug!("[billing:capacity] Node {} is not supercharged", node.uuid);
            return Ok(None);
        }

        daemon.system_utilization(node).await.map(Some)
    }
}

impl Default for NodeCapacityChecker {
    fn default() -> Self {
        Self::allocation_only()
    }
}

#[async_trait]
impl CapacityChecker for NodeCapacityChecker {
    async fn check(&self, node: &Node, demand: &CapacityRequirements) -> Result<CapacityCheckOutcome> {
        self.assert_can_allocate(node, demand.memory_mb(), demand.disk_mb())
            .await
    }
}

fn allocation_detail(node: &Node, memory_mb: i64, disk_mb: i64) -> String {
    let mut shortfalls = Vec::new();
    if node.allocated_memory.saturating_add(memory_mb) as f64 > node.memory_limit() {
        shortfalls.push(format!(
            "requires {} MB memory with {} MB allocated of {:.0} MB",
            memory_mb,
            node.allocated_memory,
            node.memory_limit()
        ));
    }
    if node.allocated_disk.saturating_add(disk_mb) as f64 > node.disk_limit() {
        shortfalls.push(format!(
            "requires {} MB disk with {} MB allocated of {:.0} MB",
            disk_mb,
            node.allocated_disk,
            node.disk_limit()
        ));
    }
    shortfalls.join("; ")
}
