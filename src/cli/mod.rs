//! # Command Line Interface
//!
//! Compiles proxy configuration from a registry snapshot file. Useful for inspecting
//! what a node would receive without running a discovery server.

pub mod output;

use crate::config::{load_config, AppConfig};
use crate::domain::{NodeRole, Proxy};
use crate::observability::{init_logging, log_config_info};
use crate::registry::MemoryRegistry;
use crate::xds::conversion::{to_envoy_cluster, to_envoy_route_configuration};
use crate::xds::{ConfigCompiler, Environment};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use output::{print_output, print_protos, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "flowmesh")]
#[command(about = "Flowmesh proxy configuration compiler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Registry snapshot with services, instances and rules
    #[arg(short, long, global = true, default_value = "registry.yaml")]
    pub snapshot: PathBuf,

    /// Output format (json or yaml)
    #[arg(short, long, global = true, default_value = "json")]
    pub output: OutputFormat,

    /// Print Envoy v3 resources instead of the compiled model
    #[arg(long, global = true)]
    pub v3: bool,

    /// Emit JSON logs
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Identity of the node being compiled for
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Node role (sidecar, ingress, router, management)
    #[arg(long = "node-role", default_value = "sidecar")]
    pub role: NodeRole,

    /// Node identifier, usually `pod.namespace`
    #[arg(long = "node-id")]
    pub id: String,

    /// Node IP address
    #[arg(long = "node-ip")]
    pub ip: String,

    /// DNS search domain of the node
    #[arg(long, default_value = "")]
    pub domain: String,
}

impl NodeArgs {
    fn proxy(&self) -> Proxy {
        Proxy::new(self.role, self.id.clone(), self.domain.clone(), self.ip.clone())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile listeners and clusters for a node
    Compile {
        #[command(flatten)]
        node: NodeArgs,
    },

    /// Build one route table for a node
    Routes {
        #[command(flatten)]
        node: NodeArgs,

        /// Route table name: a port number or `*`
        #[arg(long, default_value = "*")]
        name: String,
    },

    /// Print the discovery and tracing clusters every proxy bootstraps with
    ControlPlaneClusters,
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.json_logs {
        config.observability.json_logging = true;
    }
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    init_logging(&config.observability);
    log_config_info(&config);

    let compiler = build_compiler(&config, &cli)?;

    match cli.command {
        Commands::Compile { node } => {
            let compiled = compiler.compile(&node.proxy(), &config.compile)?;
            if cli.v3 {
                let clusters =
                    compiled.clusters.iter().map(to_envoy_cluster).collect::<crate::Result<Vec<_>>>()?;
                print_protos(&clusters);
            } else {
                print_output(&compiled, cli.output)?;
            }
        }
        Commands::Routes { node, name } => {
            let table = compiler.build_rds_route(&node.proxy(), &name, &config.compile)?;
            if cli.v3 {
                print_protos(&[to_envoy_route_configuration(&name, &table)?]);
            } else {
                print_output(&table, cli.output)?;
            }
        }
        Commands::ControlPlaneClusters => {
            let clusters = compiler.control_plane_clusters();
            if cli.v3 {
                let clusters = clusters.iter().map(to_envoy_cluster).collect::<crate::Result<Vec<_>>>()?;
                print_protos(&clusters);
            } else {
                print_output(&clusters, cli.output)?;
            }
        }
    }

    Ok(())
}

fn build_compiler(config: &AppConfig, cli: &Cli) -> anyhow::Result<ConfigCompiler> {
    let registry = if matches!(cli.command, Commands::ControlPlaneClusters) && !cli.snapshot.exists() {
        MemoryRegistry::new()
    } else {
        MemoryRegistry::from_path(&cli.snapshot)
            .with_context(|| format!("Failed to load registry snapshot {}", cli.snapshot.display()))?
    };

    let authn = Arc::new(registry.authn_resolver());
    let registry = Arc::new(registry);
    let env = Environment::new(config.mesh.clone(), registry.clone(), registry).with_authn(authn);
    Ok(ConfigCompiler::new(env))
}
