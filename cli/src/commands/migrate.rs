// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Job Store Migration Command
//!
//! Applies the embedded SQL migrations to the PostgreSQL job store. The
//! gateway and worker also migrate on startup; this command lets operators do
//! it ahead of a rollout and preview what is pending.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! ovpnp migrate
//!
//! # Preview migrations without applying
//! ovpnp migrate --dry-run
//! ```
//!
//! The connection string comes from `spec.store.url` or `OVPN_DATABASE_URL`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use provisioner_core::application::repository_factory::storage_backend;
use provisioner_core::domain::config::ProvisionerConfig;
use provisioner_core::domain::repository::{PostgresConfig, StorageBackend};
use provisioner_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_override: Option<PathBuf>) -> Result<()> {
    println!("{}", "Job store migration".bold().green());

    let config = ProvisionerConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let StorageBackend::PostgreSQL(pg) = storage_backend(&config.spec.store)? else {
        anyhow::bail!("spec.store.backend is 'memory'; nothing to migrate. Set OVPN_DATABASE_URL or spec.store.url.");
    };

    println!("Connecting to database...");
    let db = Database::new(&PostgresConfig {
        max_connections: 1,
        ..pg
    })
    .await?;

    let applied_count = db.applied_migrations().await;
    let total_migrations = MIGRATOR.iter().count();

    println!("Migration status: {} applied, {} total available.", applied_count, total_migrations);

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        db.migrate().await?;
        println!("{}", "✓ Job store updated successfully.".green());
    } else {
        println!("{}", "✓ Job store is up to date.".green());
    }

    Ok(())
}
