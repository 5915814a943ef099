//! Initial values for properties that name the hosts of a component, such as
//! `fs.defaultFS`, `hive_master_hosts` or `zookeeper.connect`.
//!
//! Only master placements are consulted, and placements on hosts missing from
//! the snapshot are ignored. `None` from [`HostRule::initial_value`] means the
//! recommended value stays as it is.

use crate::types::ClusterTopologySnapshot;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

pub const ZOOKEEPER_SERVER: &str = "ZOOKEEPER_SERVER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostRule {
    /// The first host running `component`, either as the whole value or
    /// spliced into the recommended value by `modifier`.
    HostWithComponent {
        component: String,
        #[serde(default)]
        modifier: Option<HostModifier>,
    },
    /// Every host running one of `components`.
    HostsWithComponents {
        components: Vec<String>,
        #[serde(default)]
        as_array: bool,
    },
    /// `host:port` for each ZooKeeper server, reusing the recommended port.
    ZookeeperBased,
}

/// Where the host goes in the recommended value, and what surrounds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostModifier {
    pub pattern: HostPattern,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPattern {
    /// The name right before the first `:`, as in `localhost:8020`
    HostWithPort,
    /// `://name` followed by `:`, as in `hdfs://localhost:8020`
    SchemeHost,
    /// A fixed placeholder such as `localhost`
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostsValue {
    Text(String),
    List(Vec<String>),
}

impl HostRule {
    /// The host name itself.
    pub fn host(component: &str) -> Self {
        HostRule::HostWithComponent {
            component: component.to_string(),
            modifier: None,
        }
    }

    /// Replaces the host of a `host:port` value.
    pub fn host_with_port(component: &str) -> Self {
        HostRule::HostWithComponent {
            component: component.to_string(),
            modifier: Some(HostModifier {
                pattern: HostPattern::HostWithPort,
                prefix: String::new(),
                suffix: String::new(),
            }),
        }
    }

    /// Replaces `://host` of a URL value with `prefix`, the host and `suffix`.
    pub fn host_with_affixes(component: &str, prefix: &str, suffix: &str) -> Self {
        HostRule::HostWithComponent {
            component: component.to_string(),
            modifier: Some(HostModifier {
                pattern: HostPattern::SchemeHost,
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }),
        }
    }

    pub fn hosts(components: &[&str], as_array: bool) -> Self {
        HostRule::HostsWithComponents {
            components: components.iter().map(|c| c.to_string()).collect(),
            as_array,
        }
    }

    pub fn initial_value(&self, topology: &ClusterTopologySnapshot, recommended: &str) -> Option<HostsValue> {
        let value = match self {
            HostRule::HostWithComponent {
                component,
                modifier,
            } => {
                let host = master_hosts(topology, |c| c == component.as_str()).next()?;
                match modifier {
                    Some(modifier) => HostsValue::Text(modifier.apply(host, recommended)?),
                    None => HostsValue::Text(host.to_string()),
                }
            }
            HostRule::HostsWithComponents {
                components,
                as_array,
            } => {
                let hosts = master_hosts(topology, |c| components.iter().any(|w| w == c));
                if *as_array {
                    HostsValue::List(hosts.map(str::to_string).collect())
                } else {
                    let mut unique: Vec<&str> = Vec::new();
                    for host in hosts {
                        if !unique.contains(&host) {
                            unique.push(host);
                        }
                    }
                    HostsValue::Text(unique.join(","))
                }
            }
            HostRule::ZookeeperBased => {
                let port = port(recommended)?;
                let servers: Vec<String> = master_hosts(topology, |c| c == ZOOKEEPER_SERVER)
                    .map(|host| format!("{host}:{port}"))
                    .collect();
                // Only the first line of the recommended value is replaced.
                let rest = recommended.find('\n').map_or("", |i| &recommended[i..]);
                HostsValue::Text(servers.join(",") + rest)
            }
        };
        debug!(rule = ?self, ?value, "component host value");
        Some(value)
    }
}

impl HostModifier {
    /// `recommended` with the first pattern match replaced, or `None` when
    /// nothing matches.
    fn apply(&self, host: &str, recommended: &str) -> Option<String> {
        let span = match &self.pattern {
            HostPattern::HostWithPort => host_before_port(recommended)?,
            HostPattern::SchemeHost => scheme_host(recommended)?,
            HostPattern::Literal(literal) => {
                let start = recommended.find(literal.as_str())?;
                start..start + literal.len()
            }
        };
        let mut value = recommended.to_string();
        value.replace_range(span, &format!("{}{host}{}", self.prefix, self.suffix));
        Some(value)
    }
}

fn master_hosts<'a>(
    topology: &'a ClusterTopologySnapshot,
    is_wanted: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = &'a str> + 'a {
    topology
        .master_placements
        .iter()
        .filter(move |m| is_wanted(&m.component) && topology.hosts.contains_key(&m.host_name))
        .map(|m| m.host_name.as_str())
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '|')
}

fn host_before_port(value: &str) -> Option<Range<usize>> {
    let colon = value.find(':')?;
    let start = value[..colon].trim_end_matches(is_host_char).len();
    Some(start..colon)
}

fn scheme_host(value: &str) -> Option<Range<usize>> {
    value.match_indices("://").find_map(|(i, separator)| {
        let rest = &value[i + separator.len()..];
        let end = value.len() - rest.trim_start_matches(is_host_char).len();
        value[end..].starts_with(':').then_some(i..end)
    })
}

/// The first run of digits right after a `:`.
fn port(value: &str) -> Option<&str> {
    value.match_indices(':').find_map(|(i, _)| {
        let rest = &value[i + 1..];
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        (digits > 0).then(|| &rest[..digits])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> ClusterTopologySnapshot {
        serde_yaml::from_str(
            r#"
hosts:
  nn1: { hostName: nn1 }
  zk1: { hostName: zk1 }
  zk2: { hostName: zk2 }
masterComponentHosts:
  - { component: NAMENODE, hostName: ghost }
  - { component: NAMENODE, hostName: nn1 }
  - { component: ZOOKEEPER_SERVER, hostName: zk1 }
  - { component: ZOOKEEPER_SERVER, hostName: ghost }
  - { component: ZOOKEEPER_SERVER, hostName: zk2 }
  - { component: HIVE_METASTORE, hostName: zk1 }
  - { component: HIVE_SERVER, hostName: zk1 }
  - { component: HIVE_SERVER, hostName: nn1 }
  - { component: OOZIE_SERVER, hostName: ghost }
"#,
        )
        .unwrap()
    }

    fn text(value: &str) -> Option<HostsValue> {
        Some(HostsValue::Text(value.to_string()))
    }

    #[test]
    fn host_replaces_whole_value() {
        let rule = HostRule::host("NAMENODE");
        assert_eq!(rule.initial_value(&topology(), "localhost"), text("nn1"));
    }

    #[test]
    fn host_with_port_keeps_port() {
        let rule = HostRule::host_with_port("NAMENODE");
        assert_eq!(rule.initial_value(&topology(), "localhost:50070"), text("nn1:50070"));
        assert_eq!(rule.initial_value(&topology(), "0.0.0.0:8020"), text("nn1:8020"));
        assert_eq!(rule.initial_value(&topology(), "/no/port"), None);
    }

    #[test]
    fn affixes_replace_url_host() {
        let rule = HostRule::host_with_affixes("NAMENODE", "://", "");
        assert_eq!(
            rule.initial_value(&topology(), "hdfs://localhost:8020"),
            text("hdfs://nn1:8020")
        );
        assert_eq!(
            rule.initial_value(&topology(), "hdfs://localhost:8020/apps/hbase/data"),
            text("hdfs://nn1:8020/apps/hbase/data")
        );
        assert_eq!(rule.initial_value(&topology(), "hdfs://localhost"), None);
    }

    #[test]
    fn literal_placeholder_is_replaced_once() {
        let rule = HostRule::HostWithComponent {
            component: "NAMENODE".into(),
            modifier: Some(HostModifier {
                pattern: HostPattern::Literal("localhost".into()),
                prefix: String::new(),
                suffix: String::new(),
            }),
        };
        assert_eq!(
            rule.initial_value(&topology(), "tcp://localhost:61616?localhost"),
            text("tcp://nn1:61616?localhost")
        );
    }

    #[test]
    fn unknown_hosts_are_absent() {
        let rule = HostRule::host("OOZIE_SERVER");
        assert_eq!(rule.initial_value(&topology(), "localhost"), None);
        let rule = HostRule::host_with_affixes("OOZIE_SERVER", "://", "");
        assert_eq!(rule.initial_value(&topology(), "http://localhost:11000/oozie"), None);
        let rule = HostRule::hosts(&["OOZIE_SERVER"], false);
        assert_eq!(rule.initial_value(&topology(), ""), text(""));
    }

    #[test]
    fn hosts_join_unique_or_list_all() {
        let rule = HostRule::hosts(&["HIVE_METASTORE", "HIVE_SERVER"], false);
        assert_eq!(rule.initial_value(&topology(), "localhost"), text("zk1,nn1"));

        let rule = HostRule::hosts(&["HIVE_METASTORE", "HIVE_SERVER"], true);
        assert_eq!(
            rule.initial_value(&topology(), "localhost"),
            Some(HostsValue::List(vec!["zk1".into(), "zk1".into(), "nn1".into()]))
        );
    }

    #[test]
    fn zookeeper_servers_reuse_recommended_port() {
        let rule = HostRule::ZookeeperBased;
        assert_eq!(rule.initial_value(&topology(), "localhost:2181"), text("zk1:2181,zk2:2181"));
        assert_eq!(
            rule.initial_value(&topology(), "localhost:2181\nsecond"),
            text("zk1:2181,zk2:2181\nsecond")
        );
        assert_eq!(rule.initial_value(&topology(), "localhost"), None);
        assert_eq!(rule.initial_value(&topology(), "a:b,c:2182"), text("zk1:2182,zk2:2182"));
    }

    #[test]
    fn rules_read_from_yaml() {
        let rule: HostRule = serde_yaml::from_str(
            "{ type: host_with_component, component: NAMENODE, modifier: { pattern: scheme_host, prefix: '://' } }",
        )
        .unwrap();
        assert_eq!(rule, HostRule::host_with_affixes("NAMENODE", "://", ""));

        let rule: HostRule = serde_yaml::from_str("type: zookeeper_based").unwrap();
        assert_eq!(rule, HostRule::ZookeeperBased);

        let rule: HostRule =
            serde_yaml::from_str("{ type: hosts_with_components, components: [NIMBUS], as_array: true }").unwrap();
        assert_eq!(rule, HostRule::hosts(&["NIMBUS"], true));
    }
}
