//! Deployment planning helpers for Hadoop-style clusters.
//!
//! - [`defaults`]: YARN/MapReduce container sizing from host capacity
//! - [`blueprint`]: host-group blueprint construction, filtering and merging
//! - [`configs`]: blueprint `configurations` from wizard config records
//! - [`mount_points`]: directory properties placed on data mounts
//! - [`component_hosts`]: properties naming the hosts of a component
//!
//! Everything here is a pure function of its inputs. Missing facts yield
//! `None` and lookup misses yield empty collections; only the file-reading
//! entry points return [`Error`].

pub mod blueprint;
pub mod component_hosts;
pub mod configs;
pub mod defaults;
pub mod error;
pub mod mount_points;
pub mod settings;
pub mod types;

pub use blueprint::{Blueprint, GroupMatch, HostGroup, HostGroupBinding};
pub use component_hosts::{HostModifier, HostPattern, HostRule, HostsValue};
pub use configs::{ConfigProperty, Configurations, ServiceConfigTypes, ServiceStepConfigs, build_configs_json};
pub use defaults::{ClusterData, ContainerSizing, PropertyValue, YarnProperty, recommend};
pub use error::{Error, Result};
pub use mount_points::{MountMode, MountPointRule, WinReplacer};
pub use settings::Settings;
pub use types::{ClusterTopologySnapshot, ComponentPlacement, DiskMount, HostFacts, MasterPlacement, SlavePlacement};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Reads a YAML (or JSON, which is valid YAML) document from `path`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&buf)?)
}

/// Renders `value` as pretty JSON, or as YAML.
pub fn render_document<T: Serialize>(value: &T, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_yaml::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    #[test]
    fn read_document_reports_path_and_parse_errors() {
        let missing = Path::new("does/not/exist.yaml");
        match read_document::<Blueprint>(missing) {
            Err(Error::Io { path, .. }) => assert_eq!(path, "does/not/exist.yaml"),
            other => panic!("unexpected {other:?}"),
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hosts: [not, a, map]").unwrap();
        let result = read_document::<ClusterTopologySnapshot>(file.path());
        assert!(matches!(result, Err(Error::Yaml(_))), "{result:?}");
    }

    #[test]
    fn render_document_in_both_formats() {
        let value = BTreeMap::from([("cpu", 8)]);
        assert_eq!(render_document(&value, true).unwrap(), "{\n  \"cpu\": 8\n}");
        assert_eq!(render_document(&value, false).unwrap(), "cpu: 8\n");

        let tuple_keys = BTreeMap::from([((1, 2), 3)]);
        let result = render_document(&tuple_keys, true);
        assert!(matches!(result, Err(Error::Json(_))), "{result:?}");
    }
}
