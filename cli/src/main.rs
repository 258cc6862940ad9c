// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ovpnp - OpenVPN Client Provisioner
//!
//! One binary for every role in a deployment:
//!
//! - `ovpnp gateway [--with-worker]` - HTTP gateway polled by routers in the field
//! - `ovpnp worker` - certificate issuing worker (shared PostgreSQL job store)
//! - `ovpnp job submit|status` - drive a running gateway
//! - `ovpnp clients|profiles` - inspect the VPN host
//! - `ovpnp config show|validate|generate`, `ovpnp secret derive`, `ovpnp migrate`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ovpn_provisioner::commands::{self, ConfigCommand, JobCommand, MigrateCommand, SecretCommand};
use ovpn_provisioner::daemon;

/// OpenVPN client provisioner
#[derive(Parser)]
#[command(name = "ovpnp")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "OVPN_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Gateway port used by `job` commands
    #[arg(long, global = true, env = "OVPN_PORT", default_value = "5000")]
    port: u16,

    /// Gateway host used by `job` commands
    #[arg(long, global = true, env = "OVPN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "OVPN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    #[command(name = "gateway")]
    Gateway {
        /// Also run the worker pool in this process
        #[arg(long)]
        with_worker: bool,
    },

    /// Run a standalone worker
    #[command(name = "worker")]
    Worker,

    /// Provisioning jobs on a running gateway
    #[command(name = "job")]
    Job {
        #[command(subcommand)]
        command: JobCommand,
    },

    /// List clients connected to the VPN server
    #[command(name = "clients")]
    Clients {
        /// Resolve the live address of one identity
        #[arg(long)]
        identity: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored client profiles
    #[command(name = "profiles")]
    Profiles {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Retrieval secrets
    #[command(name = "secret")]
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },

    /// Apply job store migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Gateway { with_worker }) => daemon::start_gateway(cli.config, with_worker).await,
        Some(Commands::Worker) => daemon::start_worker(cli.config).await,
        Some(Commands::Job { command }) => commands::job::handle_command(command, &cli.host, cli.port).await,
        Some(Commands::Clients { identity, json }) => commands::inspect::clients(cli.config, identity, json).await,
        Some(Commands::Profiles { json }) => commands::inspect::profiles(cli.config, json).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Secret { command }) => commands::secret::handle_command(command, cli.config).await,
        Some(Commands::Migrate { command }) => commands::migrate::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
