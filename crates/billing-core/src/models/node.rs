//! Node allocation record
//!
//! Only the columns the capacity check needs: the recorded memory/disk
//! ceilings, their over-allocation percentages, what servers already use,
//! and how to reach the node's daemon.

use serde::{Deserialize, Serialize};

/// A node that can host servers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub uuid: String,
    pub name: String,
    /// Daemon host name
    pub fqdn: String,
    /// `http` or `https`
    pub scheme: String,
    /// Daemon API port
    pub daemon_listen: u16,
    #[serde(skip_serializing, default)]
    pub daemon_token: String,
    /// Recorded memory ceiling in MB
    pub memory: i64,
    /// Percentage of extra memory that may be allocated beyond `memory`
    pub memory_overallocate: i64,
    /// Recorded disk ceiling in MB
    pub disk: i64,
    pub disk_overallocate: i64,
    /// Memory already allocated to servers on this node, in MB
    #[serde(default)]
    pub allocated_memory: i64,
    /// Disk already allocated to servers on this node, in MB
    #[serde(default)]
    pub allocated_disk: i64,
    #[serde(default)]
    pub database_host_id: Option<i64>,
}

impl Node {
    /// Create a node with the given ceilings and nothing allocated
    pub fn new(id: i64, uuid: impl Into<String>, memory: i64, disk: i64) -> Self {
        Self {
            id,
            uuid: uuid.into(),
            name: format!("node-{}", id),
            fqdn: "localhost".to_string(),
            scheme: "https".to_string(),
            daemon_listen: 8080,
            daemon_token: String::new(),
            memory,
            memory_overallocate: 0,
            disk,
            disk_overallocate: 0,
            allocated_memory: 0,
            allocated_disk: 0,
            database_host_id: None,
        }
    }

    /// Set what is already allocated on the node
    pub fn with_allocated(mut self, memory: i64, disk: i64) -> Self {
        self.allocated_memory = memory;
        self.allocated_disk = disk;
        self
    }

    /// Set the daemon endpoint
    pub fn with_daemon(
        mut self,
        scheme: impl Into<String>,
        fqdn: impl Into<String>,
        port: u16,
        token: impl Into<String>,
    ) -> Self {
        self.scheme = scheme.into();
        self.fqdn = fqdn.into();
        self.daemon_listen = port;
        self.daemon_token = token.into();
        self
    }

    /// Memory ceiling including over-allocation, in MB
    pub fn memory_limit(&self) -> f64 {
        self.memory as f64 * (1.0 + self.memory_overallocate as f64 / 100.0)
    }

    /// Disk ceiling including over-allocation, in MB
    pub fn disk_limit(&self) -> f64 {
        self.disk as f64 * (1.0 + self.disk_overallocate as f64 / 100.0)
    }

    /// Whether the recorded allocation leaves room for the given amounts
    pub fn is_viable(&self, memory_mb: i64, disk_mb: i64) -> bool {
        self.allocated_memory.saturating_add(memory_mb) as f64 <= self.memory_limit()
            && self.allocated_disk.saturating_add(disk_mb) as f64 <= self.disk_limit()
    }

    /// Base URL of the node's daemon API
    pub fn daemon_base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.scheme.trim_end_matches("://"),
            self.fqdn,
            self.daemon_listen
        )
    }
}
