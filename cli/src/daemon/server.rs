// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway HTTP server

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use provisioner_core::{
    application::provisioning::StandardProvisioningService,
    domain::config::StoreBackendKind,
    infrastructure::status_source,
    presentation::api,
};

use super::{cancel_on_signal, install_metrics_exporter, load_config, Components};

pub async fn start_gateway(config_path: Option<PathBuf>, with_worker: bool) -> Result<()> {
    let config = load_config(config_path)?;
    install_metrics_exporter(&config)?;

    info!("Configuration loaded: name={}", config.metadata.name);

    let components = Components::build(&config).await?;
    let status = status_source::from_config(&config.spec.status);
    info!("Status feed: {}", status.describe());

    if !with_worker && config.spec.store.backend == StoreBackendKind::Memory {
        warn!("In-memory job store without --with-worker: submitted jobs will never run");
    }

    let service = Arc::new(StandardProvisioningService::new(
        components.repository.clone(),
        components.deriver.clone(),
        components.profiles.clone(),
        Arc::from(status),
        config.spec.store.submission_guard,
    ));

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let worker_task = if with_worker {
        let worker = Arc::new(components.worker(&config)?);
        Some(tokio::spawn(worker.run_forever(shutdown.clone())))
    } else {
        None
    };

    let addr = format!("{}:{}", config.spec.gateway.host, config.spec.gateway.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Gateway listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, api::app(service))
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    // The server can also stop on its own; make sure the worker follows.
    shutdown.cancel();
    if let Some(task) = worker_task {
        if let Err(e) = task.await {
            warn!("Worker task ended abnormally: {}", e);
        }
    }

    info!("Gateway shut down");

    Ok(())
}
