// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Long-running processes
//!
//! Handles:
//! - Gateway HTTP server (optionally with an embedded worker pool)
//! - Standalone worker process
//! - Prometheus exporter
//! - Graceful shutdown on Ctrl+C / SIGTERM

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use provisioner_core::{
    application::{
        repository_factory::{create_job_repository, storage_backend},
        worker::ProvisioningWorker,
    },
    domain::{
        config::ProvisionerConfig, issuer::ProfileTemplate, repository::JobRepository,
        secret::SecretDeriver,
    },
    infrastructure::{easyrsa::EasyRsaIssuer, profile_store::ProfileStore},
};

pub mod client;
pub mod server;
pub mod worker;

pub use client::GatewayClient;
pub use server::start_gateway;
pub use worker::start_worker;

/// Load, override and validate the configuration for a long-running process.
pub fn load_config(config_path: Option<PathBuf>) -> Result<ProvisionerConfig> {
    let config = ProvisionerConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Services shared by the gateway and the worker.
pub struct Components {
    pub repository: Arc<dyn JobRepository>,
    pub deriver: SecretDeriver,
    pub profiles: ProfileStore,
}

impl Components {
    pub async fn build(config: &ProvisionerConfig) -> Result<Self> {
        let backend = storage_backend(&config.spec.store)?;
        let repository = create_job_repository(&backend)
            .await
            .context("Failed to initialize job store")?;
        let deriver = SecretDeriver::new(config.spec.secret.resolve()?);
        info!(key_fingerprint = %deriver.key_fingerprint(), "Secret derivation key loaded");

        Ok(Self {
            repository,
            deriver,
            profiles: ProfileStore::new(&config.spec.issuer.client_dir),
        })
    }

    pub fn worker(&self, config: &ProvisionerConfig) -> Result<ProvisioningWorker> {
        let issuer = &config.spec.issuer;
        Ok(ProvisioningWorker::new(
            self.repository.clone(),
            Arc::new(EasyRsaIssuer::new(issuer)),
            self.profiles.clone(),
            profile_template(config)?,
            config.spec.worker.clone(),
            config.spec.store.job_ttl,
        ))
    }
}

fn profile_template(config: &ProvisionerConfig) -> Result<ProfileTemplate> {
    let issuer = &config.spec.issuer;
    match &issuer.common_file {
        Some(path) => {
            let common = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read profile header {:?}", path))?;
            Ok(ProfileTemplate::from_common(common))
        }
        None => Ok(ProfileTemplate::builtin(
            &issuer.remote_host,
            issuer.remote_port,
            issuer.proto,
        )),
    }
}

/// Install the Prometheus exporter when `spec.observability.metrics_port` is set.
pub fn install_metrics_exporter(config: &ProvisionerConfig) -> Result<()> {
    let Some(port) = config.spec.observability.as_ref().and_then(|o| o.metrics_port) else {
        return Ok(());
    };

    let addr: SocketAddr = format!("{}:{}", config.spec.gateway.host, port)
        .parse()
        .with_context(|| format!("Invalid metrics address {}:{}", config.spec.gateway.host, port))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

/// Cancel `token` on the first Ctrl+C or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
