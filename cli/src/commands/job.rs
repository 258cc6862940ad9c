// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning job commands (talk to a running gateway)
//!
//! Commands: submit, status

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::time::Duration;

use crate::daemon::client::{GatewayClient, TaskStatus};

#[derive(Subcommand)]
pub enum JobCommand {
    /// Request provisioning of a new client
    Submit {
        /// Client identity (1-32 ASCII letters and digits)
        identity: String,

        /// Poll until the job finishes
        #[arg(long)]
        wait: bool,

        /// Seconds between polls
        #[arg(long, default_value = "2")]
        interval: u64,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
    },

    /// Show the state of a job
    Status {
        /// Task id returned by `job submit`
        task_id: String,
    },
}

pub async fn handle_command(command: JobCommand, host: &str, port: u16) -> Result<()> {
    let client = GatewayClient::new(host, port)?;

    match command {
        JobCommand::Submit {
            identity,
            wait,
            interval,
            timeout,
        } => {
            let submitted = client.submit(&identity).await?;
            println!("{}", "✓ Provisioning accepted".green());
            println!("  Identity: {}", submitted.provision_identity.bold());
            println!("  Task ID:  {}", submitted.task_id);
            println!("  Secret:   {}", submitted.secret);

            if wait {
                println!();
                println!("Waiting for certificate generation...");
                let status = client
                    .wait_for(
                        &submitted.task_id,
                        Duration::from_secs(interval.max(1)),
                        Duration::from_secs(timeout),
                    )
                    .await?;
                print_status(&status);
                if !status.is_success() {
                    anyhow::bail!("Provisioning failed");
                }
            }
            Ok(())
        }
        JobCommand::Status { task_id } => {
            let status = client.task_status(&task_id).await?;
            print_status(&status);
            Ok(())
        }
    }
}

fn print_status(status: &TaskStatus) {
    let state = match status.state.as_str() {
        "completed" => status.state.green(),
        "failed" => status.state.red(),
        _ => status.state.yellow(),
    };
    println!("  State:    {}", state);
    if let Some(identity) = &status.provision_identity {
        println!("  Identity: {}", identity);
    }
    if let Some(message) = &status.message {
        println!("  Message:  {}", message);
    }
}
