// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local inspection commands for operators on the VPN host
//!
//! Commands: clients, profiles. Both read the configured status feed and
//! profile directory directly; no gateway or secret is involved.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use provisioner_core::domain::config::ProvisionerConfig;
use provisioner_core::domain::identity::Identity;
use provisioner_core::domain::status_feed::{MatchTier, StatusSnapshot};
use provisioner_core::infrastructure::profile_store::{ProfileEntry, ProfileStore};
use provisioner_core::infrastructure::status_source;

pub async fn clients(config_override: Option<PathBuf>, identity: Option<String>, json: bool) -> Result<()> {
    let config = ProvisionerConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let source = status_source::from_config(&config.spec.status);
    let snapshot = source
        .snapshot()
        .await
        .with_context(|| format!("Failed to read status feed ({})", source.describe()))?;

    match identity {
        Some(raw) => {
            let identity = Identity::parse(&raw).context("Invalid provision identity")?;
            show_client(&snapshot, &identity, json)
        }
        None => list_clients(&snapshot, json),
    }
}

fn list_clients(snapshot: &StatusSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot.clients)?);
        return Ok(());
    }

    if snapshot.clients.is_empty() {
        println!("{}", "No clients connected".yellow());
    } else {
        println!(
            "{:<32} {:<16} {:<28} {:>12} {:>12}  {}",
            "COMMON NAME".bold(),
            "VIRTUAL".bold(),
            "REAL".bold(),
            "RECEIVED".bold(),
            "SENT".bold(),
            "CONNECTED SINCE".bold()
        );
        for client in &snapshot.clients {
            println!(
                "{:<32} {:<16} {:<28} {:>12} {:>12}  {}",
                client.common_name,
                client.virtual_address.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                client.real_address.as_deref().unwrap_or("-"),
                client.bytes_received.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
                client.bytes_sent.map(|b| b.to_string()).unwrap_or_else(|| "-".into()),
                client.connected_since.as_deref().unwrap_or("-"),
            );
        }
    }

    for section in &snapshot.skipped_sections {
        println!("{}", format!("warning: skipped {:?} section with unusable header", section).yellow());
    }
    Ok(())
}

fn show_client(snapshot: &StatusSnapshot, identity: &Identity, json: bool) -> Result<()> {
    let live = snapshot.lookup(identity);
    let record = snapshot.client(identity);

    if json {
        let body = serde_json::json!({
            "identity": identity,
            "ip": live.map(|l| l.address.to_string()),
            "tier": live.map(|l| l.tier),
            "client": record,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let Some(live) = live else {
        anyhow::bail!("{} is not connected", identity);
    };
    let tier = match live.tier {
        MatchTier::ClientList => "client list",
        MatchTier::RoutingTable => "routing table",
        MatchTier::Heuristic => "heuristic scan",
    };
    println!("{} {} ({})", identity.as_str().bold(), live.address.to_string().green(), tier);
    if let Some(record) = record {
        if let Some(real) = &record.real_address {
            println!("  Real address:    {}", real);
        }
        if let Some(since) = &record.connected_since {
            println!("  Connected since: {}", since);
        }
    }
    Ok(())
}

pub async fn profiles(config_override: Option<PathBuf>, json: bool) -> Result<()> {
    let config = ProvisionerConfig::load_or_default(config_override).context("Failed to load configuration")?;
    let store = ProfileStore::new(&config.spec.issuer.client_dir);
    let entries = store
        .list()
        .await
        .with_context(|| format!("Failed to list profiles in {}", store.dir().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    print_profiles(store.dir(), &entries);
    Ok(())
}

fn print_profiles(dir: &std::path::Path, entries: &[ProfileEntry]) {
    if entries.is_empty() {
        println!("{}", format!("No profiles in {}", dir.display()).yellow());
        return;
    }

    println!("{:<32} {:>8}  {}", "IDENTITY".bold(), "BYTES".bold(), "CREATED".bold());
    for entry in entries {
        let created = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<32} {:>8}  {}", entry.identity.as_str(), entry.size, created);
    }
    println!();
    println!("{} profile(s) in {}", entries.len(), dir.display());
}
