//! YARN and MapReduce memory recommendations derived from host capacity.
//!
//! The sizing follows the usual HDP guidance:
//!
//! ```text
//! usable     = max(2, ram - reserved_os - (hbase ? reserved_hbase : 0))   GB
//! containers = max(3, min(2 * cpu, min(ceil(1.8 * disks), usable * 1024 / min_container)))
//! per_container = usable * 1024 / containers                              MB
//! ```
//!
//! with `per_container` rounded down to a multiple of 512 MB once it exceeds 1 GB.

use crate::settings::Settings;
use crate::types::{ClusterTopologySnapshot, DiskMount, HostFacts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Share of a container's memory given to the JVM heap.
const HEAP_RATIO: f64 = 0.8;

/// Share of the map container used for the sort buffer, capped at 1 GB.
const SORT_BUFFER_RATIO: f64 = 0.4;
const MAX_SORT_BUFFER_MB: f64 = 1024.0;

/// Mountpoints that never hold YARN local directories.
const RESERVED_MOUNTPOINTS: [&str; 3] = ["/home", "/homes", "/dev"];
const RESERVED_MOUNT_PREFIXES: [&str; 3] = ["/tmp", "/boot", "/mnt"];

/// Memory kept back from YARN on a node, in GB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedMemory {
    #[serde(rename = "ramUpperBoundGB")]
    pub ram_upper_bound_gb: u64,
    #[serde(rename = "os")]
    pub os_gb: u64,
    #[serde(rename = "hbase")]
    pub hbase_gb: u64,
}

const fn band(ram_upper_bound_gb: u64, os_gb: u64, hbase_gb: u64) -> ReservedMemory {
    ReservedMemory {
        ram_upper_bound_gb,
        os_gb,
        hbase_gb,
    }
}

/// Reserved memory bands, ascending by upper bound and non-decreasing in
/// both reservations.
pub const RESERVED_MEMORY_TABLE: [ReservedMemory; 11] = [
    band(4, 1, 1),
    band(8, 2, 1),
    band(16, 2, 2),
    band(24, 4, 4),
    band(48, 6, 8),
    band(64, 8, 8),
    band(72, 8, 8),
    band(96, 12, 16),
    band(128, 24, 24),
    band(256, 32, 32),
    band(512, 64, 64),
];

/// Picks the first band able to hold `ram_gb`, or the largest band.
pub fn reserved_memory_recommendations(ram_gb: u64) -> ReservedMemory {
    RESERVED_MEMORY_TABLE
        .iter()
        .find(|band| ram_gb <= band.ram_upper_bound_gb)
        .copied()
        .unwrap_or(RESERVED_MEMORY_TABLE[RESERVED_MEMORY_TABLE.len() - 1])
}

/// Smallest container worth scheduling on a node with `ram_gb` of memory, in MB.
pub fn recommended_minimum_container_size(ram_gb: u64) -> u32 {
    match ram_gb {
        0..=4 => 256,
        5..=8 => 512,
        9..=24 => 1024,
        _ => 2048,
    }
}

/// Whether a mount can host YARN data.
pub fn is_usable_data_mount(mount: &DiskMount) -> bool {
    let path = mount.mountpoint.as_str();
    !RESERVED_MOUNTPOINTS.contains(&path)
        && !RESERVED_MOUNT_PREFIXES.iter().any(|p| path.starts_with(p))
        && !mount.is_pseudo_filesystem()
}

/// Capacity facts of the host used as the sizing reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterData {
    pub cpu: u32,
    /// Memory in GB
    pub ram: u64,
    /// Number of usable data mounts
    pub disk: u32,
    #[serde(rename = "hBaseInstalled")]
    pub hbase_installed: bool,
}

impl ClusterData {
    /// Gathers the reference host's facts, or `None` while the topology
    /// cannot decide a recommendation yet.
    pub fn from_topology(topology: &ClusterTopologySnapshot, settings: &Settings) -> Option<Self> {
        let host = reference_host(topology, settings)?;
        let hbase_installed = topology
            .master_placements
            .iter()
            .filter(|m| topology.hosts.contains_key(&m.host_name))
            .any(|m| m.component == settings.hbase_master);
        Self::from_host(host, hbase_installed)
    }

    fn from_host(host: &HostFacts, hbase_installed: bool) -> Option<Self> {
        let cpu = host.cpu_count?;
        let memory_kb = host.memory_kb?;
        let disks = host.disk_info.as_ref()?;

        let data = Self {
            cpu,
            ram: (memory_kb / (1024.0 * 1024.0)).round().max(0.0) as u64,
            disk: disks.iter().filter(|d| is_usable_data_mount(d)).count() as u32,
            hbase_installed,
        };
        debug!(host = %host.host_name, ?data, "derived cluster data");
        Some(data)
    }
}

/// First master-dependency host, else first slave-dependency host.
fn reference_host<'a>(
    topology: &'a ClusterTopologySnapshot,
    settings: &Settings,
) -> Option<&'a HostFacts> {
    let masters = settings.master_dependencies.iter().filter_map(|component| {
        topology
            .master_placements
            .iter()
            .find(|m| &m.component == component)
            .map(|m| m.host_name.as_str())
    });
    let slaves = settings.slave_dependencies.iter().flat_map(|component| {
        topology
            .slave_placements
            .iter()
            .find(|s| &s.component == component)
            .into_iter()
            .flat_map(|s| s.hosts.iter().map(String::as_str))
    });

    masters
        .chain(slaves)
        .find_map(|host_name| topology.host(host_name))
}

/// A full set of container sizing recommendations for one node profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSizing {
    pub containers: u32,
    /// Memory per container in MB; fractional only below 1 GB
    #[serde(rename = "ramPerContainer")]
    pub ram_per_container: f64,
    #[serde(rename = "mapMemory")]
    pub map_memory: u64,
    #[serde(rename = "reduceMemory")]
    pub reduce_memory: f64,
    #[serde(rename = "amMemory")]
    pub am_memory: f64,
    #[serde(rename = "mapJavaOpts")]
    pub map_java_opts: String,
    #[serde(rename = "reduceJavaOpts")]
    pub reduce_java_opts: String,
    #[serde(rename = "amJavaOpts")]
    pub am_java_opts: String,
    #[serde(rename = "sortBufferMB")]
    pub sort_buffer_mb: u64,
    #[serde(rename = "schedulerMinimumAllocationMB")]
    pub scheduler_minimum_allocation_mb: u64,
    #[serde(rename = "schedulerMaximumAllocationMB")]
    pub scheduler_maximum_allocation_mb: u64,
}

impl ContainerSizing {
    pub fn calculate(data: &ClusterData) -> Self {
        let reserved = reserved_memory_recommendations(data.ram);
        let min_container_mb = recommended_minimum_container_size(data.ram) as f64;

        let hbase_gb = if data.hbase_installed { reserved.hbase_gb } else { 0 };
        // Floored at 2 GB; tiny hosts overcommit into virtual memory.
        let usable_mb = (data.ram as f64 - reserved.os_gb as f64 - hbase_gb as f64).max(2.0) * 1024.0;

        let by_disk = (data.disk as f64 * 1.8).ceil();
        let by_ram = usable_mb / min_container_mb;
        let by_cpu = 2.0 * data.cpu as f64;
        let containers = by_cpu.min(by_disk.min(by_ram)).max(3.0).round() as u32;

        let mut ram_per_container = usable_mb / containers as f64;
        if ram_per_container > 1024.0 {
            ram_per_container = (ram_per_container / 512.0).floor() * 512.0;
        }
        debug!(
            ?reserved,
            min_container_mb, usable_mb, containers, ram_per_container, "sized containers"
        );

        let map_memory = ram_per_container.floor();
        let reduce_memory = ram_per_container;
        let am_memory = map_memory.max(reduce_memory);

        Self {
            containers,
            ram_per_container,
            map_memory: map_memory as u64,
            reduce_memory,
            am_memory,
            map_java_opts: heap_opts(map_memory),
            reduce_java_opts: heap_opts(reduce_memory),
            am_java_opts: heap_opts(am_memory),
            sort_buffer_mb: (SORT_BUFFER_RATIO * map_memory).min(MAX_SORT_BUFFER_MB).round() as u64,
            scheduler_minimum_allocation_mb: ram_per_container.floor() as u64,
            scheduler_maximum_allocation_mb: (containers as f64 * ram_per_container).round() as u64,
        }
    }

    /// The recommendation keyed by the configuration property it populates.
    pub fn properties(&self) -> BTreeMap<YarnProperty, PropertyValue> {
        use PropertyValue::{Megabytes, Text};
        use YarnProperty::*;

        BTreeMap::from([
            (NodeManagerResourceMemory, Megabytes(self.scheduler_maximum_allocation_mb)),
            (SchedulerMinimumAllocation, Megabytes(self.scheduler_minimum_allocation_mb)),
            (SchedulerMaximumAllocation, Megabytes(self.scheduler_maximum_allocation_mb)),
            (AppMasterResource, Megabytes(self.am_memory.floor() as u64)),
            (AppMasterCommandOpts, Text(self.am_java_opts.clone())),
            (MapMemory, Megabytes(self.map_memory)),
            (ReduceMemory, Megabytes(self.reduce_memory.floor() as u64)),
            (MapJavaOpts, Text(self.map_java_opts.clone())),
            (ReduceJavaOpts, Text(self.reduce_java_opts.clone())),
            (TaskIoSortMemory, Megabytes(self.sort_buffer_mb)),
        ])
    }
}

fn heap_opts(memory_mb: f64) -> String {
    format!("-Xmx{}m", (HEAP_RATIO * memory_mb).round() as u64)
}

/// Container sizing for the topology, or `None` when a required fact is missing.
pub fn recommend(topology: &ClusterTopologySnapshot, settings: &Settings) -> Option<ContainerSizing> {
    let data = ClusterData::from_topology(topology, settings)?;
    let sizing = ContainerSizing::calculate(&data);
    info!(
        containers = sizing.containers,
        ram_per_container = sizing.ram_per_container,
        "recommended container sizing"
    );
    Some(sizing)
}

/// Property map for a topology: populated when a recommendation exists,
/// every key mapped to `Unset` otherwise.
pub fn recommended_properties(
    topology: &ClusterTopologySnapshot,
    settings: &Settings,
) -> BTreeMap<YarnProperty, PropertyValue> {
    recommend(topology, settings)
        .map(|sizing| sizing.properties())
        .unwrap_or_else(empty_properties)
}

pub fn empty_properties() -> BTreeMap<YarnProperty, PropertyValue> {
    YarnProperty::ALL
        .iter()
        .map(|&p| (p, PropertyValue::Unset))
        .collect()
}

/// Configuration properties populated by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum YarnProperty {
    #[serde(rename = "yarn.nodemanager.resource.memory-mb")]
    NodeManagerResourceMemory,
    #[serde(rename = "yarn.scheduler.minimum-allocation-mb")]
    SchedulerMinimumAllocation,
    #[serde(rename = "yarn.scheduler.maximum-allocation-mb")]
    SchedulerMaximumAllocation,
    #[serde(rename = "yarn.app.mapreduce.am.resource.mb")]
    AppMasterResource,
    #[serde(rename = "yarn.app.mapreduce.am.command-opts")]
    AppMasterCommandOpts,
    #[serde(rename = "mapreduce.map.memory.mb")]
    MapMemory,
    #[serde(rename = "mapreduce.reduce.memory.mb")]
    ReduceMemory,
    #[serde(rename = "mapreduce.map.java.opts")]
    MapJavaOpts,
    #[serde(rename = "mapreduce.reduce.java.opts")]
    ReduceJavaOpts,
    #[serde(rename = "mapreduce.task.io.sort.mb")]
    TaskIoSortMemory,
}

impl YarnProperty {
    pub const ALL: [YarnProperty; 10] = [
        YarnProperty::NodeManagerResourceMemory,
        YarnProperty::SchedulerMinimumAllocation,
        YarnProperty::SchedulerMaximumAllocation,
        YarnProperty::AppMasterResource,
        YarnProperty::AppMasterCommandOpts,
        YarnProperty::MapMemory,
        YarnProperty::ReduceMemory,
        YarnProperty::MapJavaOpts,
        YarnProperty::ReduceJavaOpts,
        YarnProperty::TaskIoSortMemory,
    ];

    pub fn key(self) -> &'static str {
        match self {
            YarnProperty::NodeManagerResourceMemory => "yarn.nodemanager.resource.memory-mb",
            YarnProperty::SchedulerMinimumAllocation => "yarn.scheduler.minimum-allocation-mb",
            YarnProperty::SchedulerMaximumAllocation => "yarn.scheduler.maximum-allocation-mb",
            YarnProperty::AppMasterResource => "yarn.app.mapreduce.am.resource.mb",
            YarnProperty::AppMasterCommandOpts => "yarn.app.mapreduce.am.command-opts",
            YarnProperty::MapMemory => "mapreduce.map.memory.mb",
            YarnProperty::ReduceMemory => "mapreduce.reduce.memory.mb",
            YarnProperty::MapJavaOpts => "mapreduce.map.java.opts",
            YarnProperty::ReduceJavaOpts => "mapreduce.reduce.java.opts",
            YarnProperty::TaskIoSortMemory => "mapreduce.task.io.sort.mb",
        }
    }
}

impl fmt::Display for YarnProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Megabytes(u64),
    Text(String),
    Unset,
}
