//! `triplegate` server binary.
//!
//! Loads a dataset setup file, runs startup once, and serves HTTP until
//! Ctrl-C.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use triplegate_server::network::{NetworkConfig, NetworkModule};
use triplegate_server::service::{ServerConfig, StaticDiscovery};
use triplegate_server::{Bootstrap, ServerSetup};

#[derive(Parser, Debug)]
#[command(name = "triplegate")]
#[command(about = "Multi-dataset RDF server with graph-level access control")]
struct Args {
    /// JSON dataset setup file
    #[arg(short, long, env = "TRIPLEGATE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, env = "TRIPLEGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "TRIPLEGATE_PORT", default_value_t = 3030)]
    port: u16,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Suppress the startup summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log every endpoint in the startup summary
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, env = "TRIPLEGATE_NODE_NAME")]
    node_name: Option<String>,

    /// Header naming the authenticated user
    #[arg(long, env = "TRIPLEGATE_USER_HEADER")]
    user_header: Option<String>,

    /// Identity allowed to add and remove datasets (repeatable)
    #[arg(long = "admin-user", value_name = "USER")]
    admin_users: Vec<String>,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            quiet: self.quiet,
            verbose: self.verbose,
            admin_users: self.admin_users.iter().cloned().collect(),
            ..ServerConfig::default()
        };
        if let Some(node_name) = &self.node_name {
            config.node_name.clone_from(node_name);
        }
        if let Some(header) = &self.user_header {
            config.user_header = header.to_ascii_lowercase();
        }
        config
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolves once `signal` does. A signal that cannot be registered is logged
/// and also ends serving.
async fn shutdown_signal(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => error!(error = %e, "failed to listen for Ctrl-C; shutting down"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let setup = match &args.config {
        Some(path) => ServerSetup::from_file(path)?,
        None => {
            info!("no setup file given; starting without datasets");
            ServerSetup::default()
        }
    };

    let bootstrap = Bootstrap::new(args.server_config(), Arc::new(StaticDiscovery::new()));
    let context = bootstrap
        .initialize(&setup)
        .await
        .context("server startup failed")?;

    let mut network = NetworkModule::new(args.network_config(), Arc::clone(&context));
    let port = network.start().await?;
    info!(port, "triplegate listening");

    network
        .serve(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    context.shutdown().await;
    Ok(())
}
