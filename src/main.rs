use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clusterplan::{
    Blueprint, ClusterTopologySnapshot, ComponentPlacement, HostRule, MountMode, MountPointRule,
    ServiceConfigTypes, ServiceStepConfigs, Settings, WinReplacer, build_configs_json, defaults,
    read_document, render_document,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Cluster deployment planner
#[derive(Parser)]
#[command(name = "clusterplan")]
#[command(author, version, about = "Recommend YARN sizing and build host-group blueprints", long_about = None)]
struct Cli {
    /// Settings file (YAML); CLUSTERPLAN_* environment variables override it
    #[arg(long, env = "CLUSTERPLAN_SETTINGS")]
    settings: Option<PathBuf>,

    /// Print JSON instead of YAML
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend container sizing for a topology snapshot
    Defaults {
        topology: PathBuf,

        /// Print the configuration property map instead of the raw sizing
        #[arg(long)]
        properties: bool,
    },

    /// Merge two blueprints, combining groups bound to the same hosts
    Merge { first: PathBuf, second: PathBuf },

    /// Keep only the listed components
    Filter {
        blueprint: PathBuf,
        #[arg(long = "component", short, required = true)]
        components: Vec<String>,
    },

    /// Add the listed components to every host group
    Add {
        blueprint: PathBuf,
        #[arg(long = "component", short, required = true)]
        components: Vec<String>,
    },

    /// Generate host groups from host names and component placements
    Groups { placements: PathBuf },

    /// Recommend a directory property from the mounts of component hosts
    MountPoints {
        topology: PathBuf,
        #[arg(long = "component", short, required = true)]
        components: Vec<String>,
        /// Recommended path appended to each mount, e.g. /hadoop/hdfs/data
        #[arg(long)]
        value: String,
        #[arg(long, value_enum, default_value_t = Mode::Single)]
        mode: Mode,
        #[arg(long, value_enum, default_value_t = Replacer::Default)]
        win_replacer: Replacer,
    },

    /// Recommend a property naming the hosts of a component
    ComponentHosts {
        topology: PathBuf,
        /// Rule file, e.g. `{ type: host_with_component, component: NAMENODE }`
        #[arg(long)]
        rule: PathBuf,
        /// Recommended value to rewrite, e.g. localhost:8020
        #[arg(long, default_value = "")]
        value: String,
    },

    /// Build the blueprint configurations document from wizard configs
    Configs { input: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Multiple,
}

#[derive(Clone, Copy, ValueEnum)]
enum Replacer {
    Default,
    File,
    Slashes,
}

#[derive(Deserialize)]
struct GroupsInput {
    hosts: Vec<String>,
    #[serde(rename = "hostComponents")]
    placements: Vec<ComponentPlacement>,
}

#[derive(Deserialize)]
struct ConfigsInput {
    services: Vec<ServiceConfigTypes>,
    #[serde(rename = "stepConfigs")]
    step_configs: Vec<ServiceStepConfigs>,
}

fn emit<T: Serialize>(value: &T, json: bool) -> clusterplan::Result<()> {
    println!("{}", render_document(value, json)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Defaults {
            topology,
            properties,
        } => {
            let topology: ClusterTopologySnapshot = read_document(&topology)?;
            if properties {
                emit(&defaults::recommended_properties(&topology, &settings), cli.json)?;
            } else {
                emit(&defaults::recommend(&topology, &settings), cli.json)?;
            }
        }
        Commands::Merge { first, second } => {
            let first: Blueprint = read_document(&first)?;
            let second: Blueprint = read_document(&second)?;
            emit(&first.merge(&second), cli.json)?;
        }
        Commands::Filter {
            blueprint,
            components,
        } => {
            let blueprint: Blueprint = read_document(&blueprint)?;
            emit(&blueprint.filter_by_components(&components), cli.json)?;
        }
        Commands::Add {
            blueprint,
            components,
        } => {
            let blueprint: Blueprint = read_document(&blueprint)?;
            emit(&blueprint.add_components(&components), cli.json)?;
        }
        Commands::Groups { placements } => {
            let input: GroupsInput = read_document(&placements)?;
            emit(
                &Blueprint::generate_host_groups(&input.hosts, &input.placements),
                cli.json,
            )?;
        }
        Commands::MountPoints {
            topology,
            components,
            value,
            mode,
            win_replacer,
        } => {
            let topology: ClusterTopologySnapshot = read_document(&topology)?;
            let rule = MountPointRule {
                components,
                mode: match mode {
                    Mode::Single => MountMode::Single,
                    Mode::Multiple => MountMode::Multiple,
                },
                win_replacer: match win_replacer {
                    Replacer::Default => WinReplacer::Default,
                    Replacer::File => WinReplacer::File,
                    Replacer::Slashes => WinReplacer::Slashes,
                },
            };
            emit(&rule.initial_value(&topology, &value), cli.json)?;
        }
        Commands::ComponentHosts {
            topology,
            rule,
            value,
        } => {
            let topology: ClusterTopologySnapshot = read_document(&topology)?;
            let rule: HostRule = read_document(&rule)?;
            emit(&rule.initial_value(&topology, &value), cli.json)?;
        }
        Commands::Configs { input } => {
            let input: ConfigsInput = read_document(&input)?;
            emit(&build_configs_json(&input.services, &input.step_configs), cli.json)?;
        }
    }
    Ok(())
}
