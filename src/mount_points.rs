//! Initial values for directory properties placed on data mounts.
//!
//! A rule names the components whose hosts are inspected. The recommended
//! value (e.g. `/hadoop/hdfs/data`) is prefixed with each usable mount
//! point found on those hosts.

use crate::types::{ClusterTopologySnapshot, DiskMount};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ROOT: &str = "/";
const EXCLUDED_MOUNTPOINTS: [&str; 5] = [
    "/",
    "/home",
    "/etc/resolv.conf",
    "/etc/hostname",
    "/etc/hosts",
];
const EXCLUDED_PREFIXES: [&str; 2] = ["/boot", "/mnt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountMode {
    /// First usable mount only
    #[default]
    Single,
    /// One line per usable mount
    Multiple,
}

/// How a Windows drive mount (`c:` or `c:\`) is combined with the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReplacer {
    /// `c:\hadoop\hdfs`
    #[default]
    Default,
    /// `file:///c:/hadoop/hdfs`
    File,
    /// `c:\\hadoop\\hdfs`
    Slashes,
}

impl WinReplacer {
    fn apply(self, drive: char, recommended: &str) -> String {
        match self {
            WinReplacer::Default => format!("{drive}:{}", recommended.replace('/', "\\")),
            WinReplacer::File => format!("file:///{drive}:{recommended}"),
            WinReplacer::Slashes => format!("{drive}:{}", recommended.replace('/', "\\\\")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPointRule {
    pub components: Vec<String>,
    #[serde(default)]
    pub mode: MountMode,
    #[serde(default)]
    pub win_replacer: WinReplacer,
}

impl MountPointRule {
    pub fn single(components: &[&str], win_replacer: WinReplacer) -> Self {
        Self::new(components, MountMode::Single, win_replacer)
    }

    pub fn multiple(components: &[&str], win_replacer: WinReplacer) -> Self {
        Self::new(components, MountMode::Multiple, win_replacer)
    }

    fn new(components: &[&str], mode: MountMode, win_replacer: WinReplacer) -> Self {
        Self {
            components: components.iter().map(|c| c.to_string()).collect(),
            mode,
            win_replacer,
        }
    }

    /// The initial value for a property recommended as `recommended`, or
    /// `None` when no known host runs the rule's components.
    pub fn initial_value(&self, topology: &ClusterTopologySnapshot, recommended: &str) -> Option<String> {
        let mut host_names = topology.hosts_with_components(&self.components);
        host_names.retain(|name| topology.hosts.contains_key(*name));
        if host_names.is_empty() {
            return None;
        }

        let mounts = usable_mount_points(topology, &host_names);
        debug!(components = ?self.components, ?mounts, "usable mount points");

        let value = match self.mode {
            MountMode::Single => self.prefix(mounts[0], recommended),
            MountMode::Multiple => mounts
                .iter()
                .map(|mount| self.prefix(mount, recommended) + "\n")
                .collect(),
        };
        Some(value)
    }

    fn prefix(&self, mount: &str, recommended: &str) -> String {
        if mount == ROOT {
            return recommended.to_string();
        }
        match windows_drive(mount) {
            Some(drive) => self.win_replacer.apply(drive, recommended),
            None => format!("{mount}{recommended}"),
        }
    }
}

/// Drive letter of a mount named like `c:` or `C:\`.
fn windows_drive(mount: &str) -> Option<char> {
    let lower = mount.to_lowercase();
    let mut chars = lower.chars();
    let drive = chars.next().filter(char::is_ascii_lowercase)?;
    match (chars.next(), chars.next(), chars.next()) {
        (Some(':'), None, None) | (Some(':'), Some('\\'), None) => Some(drive),
        _ => None,
    }
}

pub fn is_usable_mount_point(mount: &DiskMount) -> bool {
    let path = mount.mountpoint.as_str();
    mount.available_bytes != 0
        && !path.is_empty()
        && !EXCLUDED_MOUNTPOINTS.contains(&path)
        && !EXCLUDED_PREFIXES.iter().any(|p| path.starts_with(p))
        && !mount.is_pseudo_filesystem()
}

/// Distinct usable mountpoints of `host_names` in discovery order, or just
/// `/` when none qualifies. Unknown hosts and hosts without disk facts
/// contribute nothing.
pub fn usable_mount_points<'a>(topology: &'a ClusterTopologySnapshot, host_names: &[&str]) -> Vec<&'a str> {
    let mut mounts: Vec<&str> = Vec::new();
    let disks = host_names
        .iter()
        .filter_map(|name| topology.host(name))
        .filter_map(|host| host.disk_info.as_deref())
        .flatten();

    for disk in disks.filter(|d| is_usable_mount_point(d)) {
        if !mounts.contains(&disk.mountpoint.as_str()) {
            mounts.push(&disk.mountpoint);
        }
    }

    if mounts.is_empty() {
        mounts.push(ROOT);
    }
    mounts
}
