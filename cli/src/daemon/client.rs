// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the gateway API

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub provision_identity: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    pub status: String,
    pub state: String,
    pub task_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub provision_identity: Option<String>,
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, port)
        } else {
            format!("http://{}:{}", host, port)
        };
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn submit(&self, identity: &str) -> Result<SubmitResponse> {
        let response = self
            .client
            .post(format!(
                "{}/mikrotik/openvpn/create_provision/{}",
                self.base_url, identity
            ))
            .send()
            .await
            .context("Failed to reach gateway")?;

        if response.status() != StatusCode::ACCEPTED {
            anyhow::bail!("Provisioning rejected: {}", error_text(response).await);
        }

        response
            .json()
            .await
            .context("Failed to parse submit response")
    }

    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let response = self
            .client
            .get(format!("{}/mikrotik/openvpn/task/{}", self.base_url, task_id))
            .send()
            .await
            .context("Failed to reach gateway")?;

        // 202 pending, 200 succeeded and 400 failed all carry a task body.
        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::BAD_REQUEST => response
                .json()
                .await
                .context("Failed to parse task status response"),
            StatusCode::NOT_FOUND => anyhow::bail!("Task {} not found (unknown or expired)", task_id),
            _ => anyhow::bail!("Failed to get task status: {}", error_text(response).await),
        }
    }

    /// Poll until the task leaves `pending` or `timeout` elapses.
    pub async fn wait_for(&self, task_id: &str, interval: Duration, timeout: Duration) -> Result<TaskStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.task_status(task_id).await?;
            if !status.is_pending() {
                return Ok(status);
            }
            if tokio::time::Instant::now() + interval > deadline {
                anyhow::bail!("Task {} still pending after {:?}", task_id, timeout);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

async fn error_text(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { error: Some(error), .. }) => error,
        Ok(ErrorBody { status: Some(s), .. }) => format!("HTTP {} ({})", status, s),
        _ => format!("HTTP {} {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/mikrotik/openvpn/create_provision/client1")
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"processing","task_id":"7d3c1a52-3b8e-4c1e-9a55-0f3b8f3f5c11","provision_identity":"client1","secret":"ab12"}"#,
            )
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        let submitted = client.submit("client1").await.unwrap();
        assert_eq!(submitted.provision_identity, "client1");
        assert_eq!(submitted.secret, "ab12");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_rejected_reports_reason() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mikrotik/openvpn/create_provision/client1")
            .with_status(400)
            .with_body(r#"{"status":"error","error":"Client already exists"}"#)
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        let err = client.submit("client1").await.unwrap_err();
        assert!(err.to_string().contains("Client already exists"));
    }

    #[tokio::test]
    async fn test_failed_task_is_a_status_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mikrotik/openvpn/task/t1")
            .with_status(400)
            .with_body(
                r#"{"status":"error","message":"Error generating certificate: boom","provision_identity":"client1","task_id":"t1","state":"failed"}"#,
            )
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        let status = client.task_status("t1").await.unwrap();
        assert!(!status.is_pending());
        assert!(!status.is_success());
        assert_eq!(status.state, "failed");
        assert_eq!(status.message.as_deref(), Some("Error generating certificate: boom"));
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mikrotik/openvpn/task/t404")
            .with_status(404)
            .with_body(r#"{"status":"error","error":"job t404 not found"}"#)
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        assert!(client.task_status("t404").await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_returns_terminal_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mikrotik/openvpn/task/t2")
            .with_status(200)
            .with_body(
                r#"{"status":"success","message":"Certificate generated successfully","provision_identity":"client2","task_id":"t2","state":"completed"}"#,
            )
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        let status = client
            .wait_for("t2", Duration::from_millis(10), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(status.is_success());
        assert_eq!(status.provision_identity.as_deref(), Some("client2"));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/mikrotik/openvpn/task/t3")
            .with_status(202)
            .with_body(r#"{"status":"pending","message":"Certificate generation in progress","task_id":"t3","state":"pending"}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let client = GatewayClient::with_base_url(server.url()).unwrap();
        let err = client
            .wait_for("t3", Duration::from_millis(20), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("still pending"));
    }
}
