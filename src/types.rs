use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inventory facts reported by a host's agent.
///
/// Any fact may be missing while a host is still registering; calculations
/// that need a missing fact decline to produce a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostFacts {
    #[serde(rename = "hostName")]
    pub host_name: String,
    #[serde(rename = "cpu", default)]
    pub cpu_count: Option<u32>,
    #[serde(rename = "memory", default)]
    pub memory_kb: Option<f64>,
    #[serde(default)]
    pub disk_info: Option<Vec<DiskMount>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMount {
    pub mountpoint: String,
    #[serde(rename = "type")]
    pub fs_type: String,
    #[serde(rename = "available", default)]
    pub available_bytes: u64,
}

/// A master component assigned to a single host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterPlacement {
    pub component: String,
    #[serde(rename = "hostName")]
    pub host_name: String,
}

/// A slave component and every host it is assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlavePlacement {
    #[serde(rename = "componentName")]
    pub component: String,
    pub hosts: Vec<String>,
}

/// A raw `(component, host)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPlacement {
    #[serde(rename = "componentName")]
    pub component: String,
    #[serde(rename = "hostName")]
    pub host_name: String,
}

impl ComponentPlacement {
    pub fn new(component: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            host_name: host_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterTopologySnapshot {
    #[serde(default)]
    pub hosts: BTreeMap<String, HostFacts>,
    #[serde(rename = "masterComponentHosts", default)]
    pub master_placements: Vec<MasterPlacement>,
    #[serde(rename = "slaveComponentHosts", default)]
    pub slave_placements: Vec<SlavePlacement>,
}

impl ClusterTopologySnapshot {
    /// Hosts running any of `components`: every matching master placement,
    /// then the hosts of the first matching slave placement.
    ///
    /// Duplicates are kept; callers that care de-duplicate downstream.
    pub fn hosts_with_components(&self, components: &[String]) -> Vec<&str> {
        let masters = self
            .master_placements
            .iter()
            .filter(|m| components.contains(&m.component))
            .map(|m| m.host_name.as_str());

        let slaves = self
            .slave_placements
            .iter()
            .find(|s| components.contains(&s.component))
            .into_iter()
            .flat_map(|s| s.hosts.iter().map(String::as_str));

        masters.chain(slaves).collect()
    }

    /// Looks a host up, treating unknown names as absent.
    pub fn host(&self, host_name: &str) -> Option<&HostFacts> {
        let host = self.hosts.get(host_name);
        if host.is_none() {
            tracing::warn!(host = host_name, "placement references unknown host");
        }
        host
    }
}

/// Filesystem types that never hold service data.
pub const PSEUDO_FILESYSTEMS: [&str; 4] = ["devtmpfs", "tmpfs", "vboxsf", "CDFS"];

impl DiskMount {
    pub fn is_pseudo_filesystem(&self) -> bool {
        PSEUDO_FILESYSTEMS.contains(&self.fs_type.as_str())
    }
}
