//! Host-group blueprints: building, filtering and merging.
//!
//! Every operation takes blueprints by reference and returns a new value.
//! Group order is significant: merged and generated groups are numbered
//! `host-group-1`, `host-group-2`, ... in the order they are produced.

use crate::types::ComponentPlacement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostGroup {
    pub name: String,
    /// Component names without duplicates, in insertion order
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostGroupBinding {
    pub name: String,
    pub hosts: Vec<String>,
}

/// A topology description in the cluster manager's blueprint format.
///
/// (De)serializes losslessly as
/// `{ blueprint: { host_groups: [{ name, components: [{ name }] }] },
///    blueprint_cluster_binding: { host_groups: [{ name, hosts: [{ fqdn }] }] } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "wire::Document", into = "wire::Document")]
pub struct Blueprint {
    pub host_groups: Vec<HostGroup>,
    pub bindings: Vec<HostGroupBinding>,
}

/// Pairing of one group from each of two blueprints with the same hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMatch {
    Both { first: String, second: String },
    FirstOnly(String),
    SecondOnly(String),
}

pub fn group_name(index: usize) -> String {
    format!("host-group-{}", index + 1)
}

fn push_unique(target: &mut Vec<String>, items: impl IntoIterator<Item = impl AsRef<str>>) {
    for item in items {
        let item = item.as_ref();
        if !target.iter().any(|existing| existing == item) {
            target.push(item.to_string());
        }
    }
}

impl Blueprint {
    /// Every bound host once, in the order bindings list them.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts = Vec::new();
        for binding in &self.bindings {
            push_unique(&mut hosts, &binding.hosts);
        }
        hosts
    }

    pub fn hosts_by_group_name(&self, name: &str) -> &[String] {
        self.binding(name)
            .map(|b| b.hosts.as_slice())
            .unwrap_or_default()
    }

    pub fn components_by_group_name(&self, name: &str) -> &[String] {
        self.group(name)
            .map(|g| g.components.as_slice())
            .unwrap_or_default()
    }

    /// Every component named by any group, once each.
    pub fn components(&self) -> Vec<String> {
        let mut components = Vec::new();
        for group in &self.host_groups {
            push_unique(&mut components, &group.components);
        }
        components
    }

    fn group(&self, name: &str) -> Option<&HostGroup> {
        self.host_groups.iter().find(|g| g.name == name)
    }

    fn binding(&self, name: &str) -> Option<&HostGroupBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    fn host_set(&self, name: &str) -> BTreeSet<&str> {
        self.hosts_by_group_name(name)
            .iter()
            .map(String::as_str)
            .collect()
    }

    /// Pairs groups of `self` with groups of `other` bound to exactly the
    /// same set of hosts, regardless of group names.
    ///
    /// Matches follow `self`'s group order, then `other`'s leftovers in
    /// their own order. Each group of `other` is matched at most once. A
    /// group without a binding has an empty host set.
    pub fn match_groups(&self, other: &Blueprint) -> Vec<GroupMatch> {
        let mut taken = vec![false; other.host_groups.len()];
        let mut matches = Vec::with_capacity(self.host_groups.len() + other.host_groups.len());

        for group in &self.host_groups {
            let hosts = self.host_set(&group.name);
            let found = other.host_groups.iter().enumerate().find(|(i, candidate)| {
                !taken[*i] && other.host_set(&candidate.name) == hosts
            });
            match found {
                Some((i, candidate)) => {
                    taken[i] = true;
                    matches.push(GroupMatch::Both {
                        first: group.name.clone(),
                        second: candidate.name.clone(),
                    });
                }
                None => matches.push(GroupMatch::FirstOnly(group.name.clone())),
            }
        }

        matches.extend(
            other
                .host_groups
                .iter()
                .zip(taken)
                .filter(|(_, taken)| !taken)
                .map(|(group, _)| GroupMatch::SecondOnly(group.name.clone())),
        );
        matches
    }

    /// Keeps only components named in `allowed`; groups left without any
    /// component are dropped together with their bindings.
    pub fn filter_by_components<S: AsRef<str>>(&self, allowed: &[S]) -> Blueprint {
        let is_allowed = |c: &String| allowed.iter().any(|a| a.as_ref() == c.as_str());

        let host_groups: Vec<HostGroup> = self
            .host_groups
            .iter()
            .map(|group| HostGroup {
                name: group.name.clone(),
                components: group.components.iter().filter(|c| is_allowed(*c)).cloned().collect(),
            })
            .filter(|group| !group.components.is_empty())
            .collect();

        let bindings = self
            .bindings
            .iter()
            .filter(|b| host_groups.iter().any(|g| g.name == b.name))
            .cloned()
            .collect();

        Blueprint {
            host_groups,
            bindings,
        }
    }

    /// Adds every component of `components` to each group, skipping those
    /// already present.
    pub fn add_components<S: AsRef<str>>(&self, components: &[S]) -> Blueprint {
        let mut result = self.clone();
        for group in &mut result.host_groups {
            push_unique(&mut group.components, components);
        }
        result
    }

    /// Combines two blueprints, merging groups that cover the same hosts.
    ///
    /// Merged groups list `self`'s components first, then `other`'s new ones.
    /// All groups are renamed `host-group-N` in match order. Every output
    /// group gets a binding, empty when neither side bound it to hosts.
    pub fn merge(&self, other: &Blueprint) -> Blueprint {
        let mut merged = Blueprint::default();

        for (i, matched) in self.match_groups(other).into_iter().enumerate() {
            let mut components = Vec::new();
            let mut hosts = Vec::new();
            let sides: [(&Blueprint, Option<&str>); 2] = match &matched {
                GroupMatch::Both { first, second } => {
                    [(self, Some(first.as_str())), (other, Some(second.as_str()))]
                }
                GroupMatch::FirstOnly(first) => [(self, Some(first.as_str())), (other, None)],
                GroupMatch::SecondOnly(second) => [(self, None), (other, Some(second.as_str()))],
            };
            for (blueprint, name) in sides {
                if let Some(name) = name {
                    push_unique(&mut components, blueprint.components_by_group_name(name));
                    push_unique(&mut hosts, blueprint.hosts_by_group_name(name));
                }
            }
            debug!(?matched, group = %group_name(i), "merged host group");

            merged.host_groups.push(HostGroup {
                name: group_name(i),
                components,
            });
            merged.bindings.push(HostGroupBinding {
                name: group_name(i),
                hosts,
            });
        }

        info!(groups = merged.host_groups.len(), "merged blueprints");
        merged
    }

    /// Partitions `host_names` by identical installed-component sets.
    ///
    /// Groups are numbered in the order their first host appears in
    /// `host_names`; components keep the order of that host's placements.
    pub fn generate_host_groups<S: AsRef<str>>(
        host_names: &[S],
        placements: &[ComponentPlacement],
    ) -> Blueprint {
        let mut signatures: Vec<BTreeSet<&str>> = Vec::new();
        let mut blueprint = Blueprint::default();

        for host in host_names {
            let host = host.as_ref();
            let mut components = Vec::new();
            push_unique(
                &mut components,
                placements
                    .iter()
                    .filter(|p| p.host_name == host)
                    .map(|p| p.component.as_str()),
            );
            let signature: BTreeSet<&str> = placements
                .iter()
                .filter(|p| p.host_name == host)
                .map(|p| p.component.as_str())
                .collect();

            match signatures.iter().position(|s| *s == signature) {
                Some(i) => push_unique(&mut blueprint.bindings[i].hosts, [host]),
                None => {
                    let name = group_name(signatures.len());
                    signatures.push(signature);
                    blueprint.host_groups.push(HostGroup {
                        name: name.clone(),
                        components,
                    });
                    blueprint.bindings.push(HostGroupBinding {
                        name,
                        hosts: vec![host.to_string()],
                    });
                }
            }
        }
        blueprint
    }
}

/// The cluster manager's JSON shape.
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct Document {
        #[serde(default)]
        pub blueprint: Groups<HostGroup>,
        #[serde(default)]
        pub blueprint_cluster_binding: Groups<Binding>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(bound(deserialize = "T: Deserialize<'de>"))]
    pub struct Groups<T> {
        #[serde(default)]
        pub host_groups: Vec<T>,
    }

    impl<T> Default for Groups<T> {
        fn default() -> Self {
            Self {
                host_groups: Vec::new(),
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HostGroup {
        pub name: String,
        #[serde(default)]
        pub components: Vec<Component>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Component {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Binding {
        pub name: String,
        #[serde(default)]
        pub hosts: Vec<Host>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Host {
        pub fqdn: String,
    }

    impl From<Document> for super::Blueprint {
        fn from(doc: Document) -> Self {
            Self {
                host_groups: doc
                    .blueprint
                    .host_groups
                    .into_iter()
                    .map(|g| super::HostGroup {
                        name: g.name,
                        components: g.components.into_iter().map(|c| c.name).collect(),
                    })
                    .collect(),
                bindings: doc
                    .blueprint_cluster_binding
                    .host_groups
                    .into_iter()
                    .map(|b| super::HostGroupBinding {
                        name: b.name,
                        hosts: b.hosts.into_iter().map(|h| h.fqdn).collect(),
                    })
                    .collect(),
            }
        }
    }

    impl From<super::Blueprint> for Document {
        fn from(bp: super::Blueprint) -> Self {
            Self {
                blueprint: Groups {
                    host_groups: bp
                        .host_groups
                        .into_iter()
                        .map(|g| HostGroup {
                            name: g.name,
                            components: g.components.into_iter().map(|name| Component { name }).collect(),
                        })
                        .collect(),
                },
                blueprint_cluster_binding: Groups {
                    host_groups: bp
                        .bindings
                        .into_iter()
                        .map(|b| Binding {
                            name: b.name,
                            hosts: b.hosts.into_iter().map(|fqdn| Host { fqdn }).collect(),
                        })
                        .collect(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint(groups: &[(&str, &[&str], &[&str])]) -> Blueprint {
        Blueprint {
            host_groups: groups
                .iter()
                .map(|(name, components, _)| HostGroup {
                    name: name.to_string(),
                    components: components.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
            bindings: groups
                .iter()
                .map(|(name, _, hosts)| HostGroupBinding {
                    name: name.to_string(),
                    hosts: hosts.iter().map(|h| h.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn masters() -> Blueprint {
        blueprint(&[
            (
                "host-group-1",
                &["ZOOKEEPER_SERVER", "NAMENODE", "HBASE_MASTER"],
                &["host1", "host2"],
            ),
            ("host-group-2", &["SECONDARY_NAMENODE"], &["host3"]),
        ])
    }

    fn slaves() -> Blueprint {
        blueprint(&[
            ("host-group-1", &["DATANODE"], &["host3"]),
            (
                "host-group-2",
                &["DATANODE", "HDFS_CLIENT", "ZOOKEEPER_CLIENT"],
                &["host4", "host5"],
            ),
        ])
    }

    #[test]
    fn hosts_are_deduplicated_in_discovery_order() {
        let bp = blueprint(&[
            ("a", &["X"], &["host2", "host1"]),
            ("b", &["Y"], &["host1", "host3"]),
        ]);
        assert_eq!(bp.hosts(), ["host2", "host1", "host3"]);
    }

    #[test]
    fn group_lookups_miss_with_empty_results() {
        let bp = masters();
        assert_eq!(bp.hosts_by_group_name("host-group-2"), ["host3"]);
        assert!(bp.hosts_by_group_name("host-group-9").is_empty());
        assert_eq!(bp.components_by_group_name("host-group-2"), ["SECONDARY_NAMENODE"]);
        assert!(bp.components_by_group_name("").is_empty());
    }

    #[test]
    fn match_groups_pairs_by_host_set_not_name() {
        let matches = masters().match_groups(&slaves());
        assert_eq!(
            matches,
            [
                GroupMatch::FirstOnly("host-group-1".into()),
                GroupMatch::Both {
                    first: "host-group-2".into(),
                    second: "host-group-1".into()
                },
                GroupMatch::SecondOnly("host-group-2".into()),
            ]
        );
    }

    #[test]
    fn match_groups_ignores_host_order() {
        let a = blueprint(&[("g", &["X"], &["host2", "host1"])]);
        let b = blueprint(&[("other", &["Y"], &["host1", "host2"])]);
        assert_eq!(
            a.match_groups(&b),
            [GroupMatch::Both {
                first: "g".into(),
                second: "other".into()
            }]
        );
    }

    #[test]
    fn match_groups_with_itself_pairs_every_group() {
        let bp = masters();
        for matched in bp.match_groups(&bp) {
            match matched {
                GroupMatch::Both { first, second } => assert_eq!(first, second),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn merge_combines_groups_on_same_hosts() {
        let merged = masters().merge(&slaves());
        let expected = blueprint(&[
            (
                "host-group-1",
                &["ZOOKEEPER_SERVER", "NAMENODE", "HBASE_MASTER"],
                &["host1", "host2"],
            ),
            ("host-group-2", &["SECONDARY_NAMENODE", "DATANODE"], &["host3"]),
            (
                "host-group-3",
                &["DATANODE", "HDFS_CLIENT", "ZOOKEEPER_CLIENT"],
                &["host4", "host5"],
            ),
        ]);
        assert_eq!(merged, expected);
    }

    #[test]
    fn merge_with_empty_renumbers_groups() {
        let bp = blueprint(&[("masters", &["NAMENODE"], &["host1"])]);
        let merged = Blueprint::default().merge(&bp);
        assert_eq!(merged, blueprint(&[("host-group-1", &["NAMENODE"], &["host1"])]));
    }

    #[test]
    fn same_named_groups_on_different_hosts_stay_apart() {
        let a = blueprint(&[("host-group-1", &["NAMENODE"], &["host1"])]);
        let b = blueprint(&[("host-group-1", &["DATANODE"], &["host2"])]);
        let merged = a.merge(&b);
        assert_eq!(merged.host_groups.len(), 2);
        assert_eq!(merged.hosts_by_group_name("host-group-2"), ["host2"]);
    }

    #[test]
    fn unbound_groups_survive_merge() {
        let mut a = blueprint(&[("masters", &["NAMENODE"], &["host1"])]);
        a.host_groups.push(HostGroup {
            name: "clients".into(),
            components: vec!["HDFS_CLIENT".into()],
        });
        let b = blueprint(&[("slaves", &["DATANODE"], &["host1"])]);

        assert_eq!(
            a.match_groups(&b),
            [
                GroupMatch::Both {
                    first: "masters".into(),
                    second: "slaves".into()
                },
                GroupMatch::FirstOnly("clients".into()),
            ]
        );
        assert_eq!(
            a.merge(&b),
            blueprint(&[
                ("host-group-1", &["NAMENODE", "DATANODE"], &["host1"]),
                ("host-group-2", &["HDFS_CLIENT"], &[]),
            ])
        );
    }

    #[test]
    fn unbound_groups_on_both_sides_pair_up() {
        let group = |name: &str, component: &str| HostGroup {
            name: name.into(),
            components: vec![component.into()],
        };
        let a = Blueprint {
            host_groups: vec![group("a", "X")],
            bindings: Vec::new(),
        };
        let b = Blueprint {
            host_groups: vec![group("b", "Y")],
            bindings: Vec::new(),
        };
        assert_eq!(a.merge(&b), blueprint(&[("host-group-1", &["X", "Y"], &[])]));
    }

    #[test]
    fn filter_by_every_component_is_identity() {
        let bp = masters().merge(&slaves());
        assert_eq!(bp.filter_by_components(&bp.components()), bp);
    }

    #[test]
    fn filter_drops_emptied_groups_and_bindings() {
        let filtered = masters().filter_by_components(&["NAMENODE", "DATANODE"]);
        assert_eq!(filtered, blueprint(&[("host-group-1", &["NAMENODE"], &["host1", "host2"])]));
    }

    #[test]
    fn add_components_is_idempotent() {
        let once = slaves().add_components(&["HDFS_CLIENT", "YARN_CLIENT"]);
        assert_eq!(
            once.components_by_group_name("host-group-1"),
            ["DATANODE", "HDFS_CLIENT", "YARN_CLIENT"]
        );
        assert_eq!(
            once.components_by_group_name("host-group-2"),
            ["DATANODE", "HDFS_CLIENT", "ZOOKEEPER_CLIENT", "YARN_CLIENT"]
        );
        assert_eq!(once.add_components(&["HDFS_CLIENT", "YARN_CLIENT"]), once);
    }

    #[test]
    fn generate_host_groups_partitions_by_component_set() {
        let placements = [
            ComponentPlacement::new("C1", "host1"),
            ComponentPlacement::new("C2", "host1"),
            ComponentPlacement::new("C1", "host2"),
            ComponentPlacement::new("C3", "host2"),
        ];
        let bp = Blueprint::generate_host_groups(&["host1", "host2"], &placements);
        assert_eq!(
            bp,
            blueprint(&[
                ("host-group-1", &["C1", "C2"], &["host1"]),
                ("host-group-2", &["C1", "C3"], &["host2"]),
            ])
        );
    }

    #[test]
    fn generate_host_groups_shares_group_for_equal_sets() {
        let placements = [
            ComponentPlacement::new("DATANODE", "host1"),
            ComponentPlacement::new("NAMENODE", "host2"),
            ComponentPlacement::new("NODEMANAGER", "host1"),
            ComponentPlacement::new("NODEMANAGER", "host3"),
            ComponentPlacement::new("DATANODE", "host3"),
        ];
        let bp = Blueprint::generate_host_groups(&["host1", "host2", "host3"], &placements);
        assert_eq!(
            bp,
            blueprint(&[
                ("host-group-1", &["DATANODE", "NODEMANAGER"], &["host1", "host3"]),
                ("host-group-2", &["NAMENODE"], &["host2"]),
            ])
        );
    }

    #[test]
    fn wire_format_matches_cluster_manager_schema() {
        let json = r#"{
            "blueprint": {"host_groups": [
                {"name": "host-group-1", "components": [{"name": "NAMENODE"}, {"name": "ZOOKEEPER_SERVER"}]}
            ]},
            "blueprint_cluster_binding": {"host_groups": [
                {"name": "host-group-1", "hosts": [{"fqdn": "host1"}, {"fqdn": "host2"}]}
            ]}
        }"#;
        let bp: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(
            bp,
            blueprint(&[("host-group-1", &["NAMENODE", "ZOOKEEPER_SERVER"], &["host1", "host2"])])
        );

        let value = serde_json::to_value(&bp).unwrap();
        let expected: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value, expected);
    }

    #[test]
    fn wire_format_tolerates_missing_sections() {
        let json = r#"{"blueprint": {"host_groups": [{"name": "host-group-1"}]}}"#;
        let bp: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(
            bp,
            Blueprint {
                host_groups: vec![HostGroup {
                    name: "host-group-1".into(),
                    components: Vec::new(),
                }],
                bindings: Vec::new(),
            }
        );

        let bp: Blueprint = serde_yaml::from_str("{}").unwrap();
        assert_eq!(bp, Blueprint::default());
    }
}
