// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Status feed sources.
//!
//! Neither source caches: every [`StatusSource::snapshot`] call reads the
//! current document and parses it from scratch.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::domain::config::StatusConfig;
use crate::domain::status_feed::{StatusFeedError, StatusSnapshot, StatusSource};

/// Build the source selected by configuration.
pub fn from_config(config: &StatusConfig) -> Box<dyn StatusSource> {
    match config {
        StatusConfig::File { path } => Box::new(FileStatusSource::new(path.clone())),
        StatusConfig::Management { host, port, timeout } => {
            Box::new(ManagementStatusSource::new(host.clone(), *port, *timeout))
        }
    }
}

/// Snapshot file rewritten by the VPN server's `status` directive.
#[derive(Debug, Clone)]
pub struct FileStatusSource {
    path: PathBuf,
}

impl FileStatusSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatusSource for FileStatusSource {
    async fn snapshot(&self) -> Result<StatusSnapshot, StatusFeedError> {
        let document = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Status feed could not be read");
            StatusFeedError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(StatusSnapshot::parse(&document))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// OpenVPN management interface (`management <host> <port>` directive).
#[derive(Debug, Clone)]
pub struct ManagementStatusSource {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ManagementStatusSource {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    async fn fetch(&self) -> std::io::Result<String> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"status 3\n").await?;

        let mut document = String::new();
        while let Some(line) = lines.next_line().await? {
            // Real-time notifications (`>INFO:`, `>CLIENT:` ...) are interleaved
            // with command output.
            if line.starts_with('>') {
                continue;
            }
            if let Some(error) = line.strip_prefix("ERROR:") {
                return Err(std::io::Error::other(error.trim().to_string()));
            }
            let done = line.trim() == "END";
            document.push_str(&line);
            document.push('\n');
            if done {
                let _ = write_half.write_all(b"quit\n").await;
                return Ok(document);
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "management interface closed before END",
        ))
    }
}

#[async_trait]
impl StatusSource for ManagementStatusSource {
    async fn snapshot(&self) -> Result<StatusSnapshot, StatusFeedError> {
        let document = match tokio::time::timeout(self.timeout, self.fetch()).await {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                tracing::warn!(source = %self.describe(), error = %e, "Status query failed");
                return Err(StatusFeedError::Unavailable(format!("{}: {}", self.describe(), e)));
            }
            Err(_) => {
                tracing::warn!(source = %self.describe(), timeout = ?self.timeout, "Status query timed out");
                return Err(StatusFeedError::Unavailable(format!(
                    "{}: no reply within {:?}",
                    self.describe(),
                    self.timeout
                )));
            }
        };
        Ok(StatusSnapshot::parse(&document))
    }

    fn describe(&self) -> String {
        format!("management {}:{}", self.host, self.port)
    }
}
