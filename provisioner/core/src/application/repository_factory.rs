// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete job store for the configured backend, keeping the
//! domain layer free of infrastructure dependencies.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Select and construct the job store implementation

use anyhow::Context;
use std::sync::Arc;

use crate::domain::config::{StoreBackendKind, StoreConfig};
use crate::domain::repository::{JobRepository, PostgresConfig, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_job::PostgresJobRepository;
use crate::infrastructure::repositories::InMemoryJobRepository;

/// Resolve the store section of the configuration into a backend choice.
pub fn storage_backend(config: &StoreConfig) -> anyhow::Result<StorageBackend> {
    match config.backend {
        StoreBackendKind::Memory => Ok(StorageBackend::InMemory),
        StoreBackendKind::Postgres => {
            let connection_string = config
                .resolved_url()?
                .context("spec.store.url is required for the postgres backend")?;
            Ok(StorageBackend::PostgreSQL(PostgresConfig {
                connection_string,
                max_connections: config.max_connections,
            }))
        }
    }
}

/// Creates a JobRepository implementation based on the configured backend.
/// PostgreSQL connections run pending migrations before the store is used.
pub async fn create_job_repository(backend: &StorageBackend) -> anyhow::Result<Arc<dyn JobRepository>> {
    match backend {
        StorageBackend::InMemory => {
            tracing::warn!("Using in-memory job store; jobs are lost on restart and not shared between processes");
            Ok(Arc::new(InMemoryJobRepository::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(config).await?;
            db.migrate().await?;
            tracing::info!("Connected to PostgreSQL job store");
            Ok(Arc::new(PostgresJobRepository::new(db.get_pool().clone())))
        }
    }
}
