// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Standalone worker process

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use provisioner_core::domain::config::StoreBackendKind;

use super::{cancel_on_signal, install_metrics_exporter, load_config, Components};

pub async fn start_worker(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    // A separate process cannot see another process's in-memory queue.
    if config.spec.store.backend == StoreBackendKind::Memory {
        anyhow::bail!(
            "The standalone worker needs a shared job store. Set spec.store.backend to 'postgres' \
             or run 'ovpnp gateway --with-worker'"
        );
    }

    install_metrics_exporter(&config)?;

    let components = Components::build(&config).await?;
    let worker = Arc::new(components.worker(&config)?);

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    info!("Worker starting: name={}", config.metadata.name);
    worker.run_forever(shutdown).await;

    Ok(())
}
