// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secret commands

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use provisioner_core::domain::config::ProvisionerConfig;
use provisioner_core::domain::identity::Identity;
use provisioner_core::domain::secret::SecretDeriver;

#[derive(Subcommand)]
pub enum SecretCommand {
    /// Print the retrieval secret of an identity (requires the derivation key)
    Derive {
        identity: String,
    },
}

pub async fn handle_command(command: SecretCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        SecretCommand::Derive { identity } => {
            let config = ProvisionerConfig::load_or_default(config_override)
                .context("Failed to load configuration")?;
            println!("{}", derive(&config, &identity)?);
            Ok(())
        }
    }
}

fn derive(config: &ProvisionerConfig, identity: &str) -> Result<String> {
    let identity = Identity::parse(identity).context("Invalid provision identity")?;
    let deriver = SecretDeriver::new(config.spec.secret.resolve()?);
    Ok(deriver.derive(&identity).into_inner())
}
