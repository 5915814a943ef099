//! Component names the calculators key their lookups on.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const ENV_PREFIX: &str = "CLUSTERPLAN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Master components whose host is preferred as the sizing reference
    #[serde(default = "default_master_dependencies")]
    pub master_dependencies: Vec<String>,

    /// Slave components consulted when no master dependency is placed
    #[serde(default = "default_slave_dependencies")]
    pub slave_dependencies: Vec<String>,

    /// Master component whose presence reserves memory for the region servers
    #[serde(default = "default_hbase_master")]
    pub hbase_master: String,
}

fn default_master_dependencies() -> Vec<String> {
    vec!["RESOURCEMANAGER".to_string()]
}

fn default_slave_dependencies() -> Vec<String> {
    vec!["NODEMANAGER".to_string()]
}

fn default_hbase_master() -> String {
    "HBASE_MASTER".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_dependencies: default_master_dependencies(),
            slave_dependencies: default_slave_dependencies(),
            hbase_master: default_hbase_master(),
        }
    }
}

impl Settings {
    /// Load settings from an optional YAML file, overridden by
    /// `CLUSTERPLAN_*` environment variables.
    ///
    /// List values in the environment are comma separated, e.g.
    /// `CLUSTERPLAN_SLAVE_DEPENDENCIES=NODEMANAGER,TASKTRACKER`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("master_dependencies")
                    .with_list_parse_key("slave_dependencies"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
