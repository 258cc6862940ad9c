// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use provisioner_core::domain::config::{ProvisionerConfig, StatusConfig};

pub const SAMPLE_CONFIG: &str = include_str!("../../templates/ovpn-provisioner.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./ovpn-provisioner.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ProvisionerConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. OVPN_CONFIG_PATH: {}",
            std::env::var("OVPN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./ovpn-provisioner.yaml");
        println!("  4. ~/.ovpn-provisioner/config.yaml");
        println!("  5. /etc/ovpn-provisioner/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Gateway:".bold());
    println!("  Listen: {}:{}", spec.gateway.host, spec.gateway.port);
    match spec.secret.resolve() {
        Ok(key) => println!("  Secret key: {} bytes (fingerprint {})", key.len(), key.fingerprint()),
        Err(e) => println!("  Secret key: {}", format!("unavailable ({e})").red()),
    }
    println!();

    println!("{}", "Job Store:".bold());
    println!("  Backend: {:?}", spec.store.backend);
    println!("  Submission guard: {:?}", spec.store.submission_guard);
    println!("  Job retention: {}", humanize(spec.store.job_ttl));
    println!();

    println!("{}", "Worker:".bold());
    println!("  Concurrency: {}", spec.worker.concurrency);
    println!("  Timeout: {}", humanize(spec.worker.timeout));
    println!(
        "  Stale after: {} (max {} attempts)",
        humanize(spec.worker.stale_after),
        spec.worker.max_attempts
    );
    println!();

    println!("{}", "Issuer:".bold());
    println!("  EasyRSA: {}", spec.issuer.easyrsa_path.display());
    println!("  PKI: {}", spec.issuer.pki_dir.display());
    println!("  Profiles: {}", spec.issuer.client_dir.display());
    match &spec.issuer.common_file {
        Some(path) => println!("  Profile header: {}", path.display()),
        None => println!(
            "  Profile header: built-in (remote {} {})",
            spec.issuer.remote_host, spec.issuer.remote_port
        ),
    }
    println!();

    println!("{}", "Status Feed:".bold());
    match &spec.status {
        StatusConfig::File { path } => println!("  File: {}", path.display()),
        StatusConfig::Management { host, port, .. } => println!("  Management: {}:{}", host, port),
    }
    if let Some(port) = spec.observability.as_ref().and_then(|o| o.metrics_port) {
        println!();
        println!("{}", "Observability:".bold());
        println!("  Metrics port: {}", port);
    }

    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ProvisionerConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    std::fs::write(&output, SAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioner_core::domain::config::{StoreBackendKind, SubmissionGuard};

    #[test]
    fn test_sample_config_parses() {
        let config = ProvisionerConfig::from_yaml_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.spec.gateway.port, 5000);
        assert_eq!(config.spec.store.backend, StoreBackendKind::Memory);
        assert_eq!(config.spec.store.submission_guard, SubmissionGuard::Exclusive);
        assert_eq!(config.spec.worker.timeout, std::time::Duration::from_secs(300));
        assert_eq!(config.spec.issuer.remote_host, "vpn.example.net");
    }

    #[tokio::test]
    async fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ovpn-provisioner.yaml");

        generate(output.clone(), false).await.unwrap();
        assert!(generate(output.clone(), false).await.is_err());
        generate(output.clone(), true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), SAMPLE_CONFIG);
    }
}
