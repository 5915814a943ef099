//! Reshapes flat wizard config records into the blueprint `configurations`
//! document: `{ "<type>": { "properties": { "<name>": "<value>" } } }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// An installed service and the config types (`core-site`, `hdfs-site`, ...) it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfigTypes {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "configTypes", default)]
    pub config_types: Vec<String>,
}

/// Config properties edited for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStepConfigs {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(default)]
    pub configs: Vec<ConfigProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProperty {
    pub name: String,
    pub value: String,
    /// File the property lives in, e.g. `hdfs-site.xml`
    pub filename: String,
}

impl ConfigProperty {
    /// The config type named by the filename, without its extension.
    pub fn config_type(&self) -> &str {
        self.filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.filename)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationType {
    pub properties: BTreeMap<String, String>,
}

pub type Configurations = BTreeMap<String, ConfigurationType>;

/// Collects the property values of every installed service, keyed by config type.
///
/// Every config type of a service with step configs is present, even when
/// empty. Duplicate property names keep the last value seen.
pub fn build_configs_json(
    services: &[ServiceConfigTypes],
    step_configs: &[ServiceStepConfigs],
) -> Configurations {
    let mut configurations = Configurations::new();

    for service in services {
        let Some(step) = step_configs
            .iter()
            .find(|s| s.service_name == service.service_name)
        else {
            continue;
        };

        for config_type in &service.config_types {
            configurations.entry(config_type.clone()).or_default();
        }

        for property in &step.configs {
            match configurations.get_mut(property.config_type()) {
                Some(config_type) => {
                    config_type
                        .properties
                        .insert(property.name.clone(), property.value.clone());
                }
                None => warn!(
                    service = %service.service_name,
                    property = %property.name,
                    filename = %property.filename,
                    "property belongs to no known config type"
                ),
            }
        }
    }

    configurations
}
