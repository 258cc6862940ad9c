// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP Gateway
//!
//! Route table consumed by the routers in the field. Paths and response
//! bodies are fixed: provisioned devices poll these exact URLs.
//!
//! | Method | Path                                          | Success |
//! |--------|-----------------------------------------------|---------|
//! | POST   | `/mikrotik/openvpn/create_provision/{identity}` | 202   |
//! | GET    | `/mikrotik/openvpn/task/{task_id}`              | 200/202 |
//! | GET    | `/mikrotik/openvpn/{identity}/{secret}`         | 200   |
//! | GET    | `/server/ip/?provision_identity=&secret=`       | 200   |

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::application::provisioning::{ProvisioningError, ProvisioningService};
use crate::domain::job::{JobId, JobStatus};

pub const PROFILE_CONTENT_TYPE: &str = "application/x-openvpn-profile";

pub struct AppState {
    pub provisioning_service: Arc<dyn ProvisioningService>,
    pub started_at: Instant,
}

pub fn app(service: Arc<dyn ProvisioningService>) -> Router {
    let state = Arc::new(AppState {
        provisioning_service: service,
        started_at: Instant::now(),
    });

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/mikrotik/openvpn/create_provision/{identity}", post(create_provision))
        .route("/mikrotik/openvpn/task/{task_id}", get(task_status))
        .route("/mikrotik/openvpn/{identity}/{secret}", get(download_profile))
        .route("/server/ip/", get(live_address))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn record(endpoint: &'static str, status: StatusCode) {
    metrics::counter!(
        "ovpn_provision_requests_total",
        "endpoint" => endpoint,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}

fn reply(endpoint: &'static str, status: StatusCode, body: Value) -> Response {
    record(endpoint, status);
    (status, Json(body)).into_response()
}

/// The one body every authorization failure gets.
fn unauthorized(endpoint: &'static str) -> Response {
    reply(endpoint, StatusCode::UNAUTHORIZED, json!({ "status": "unauthorized" }))
}

fn error_reply(endpoint: &'static str, err: ProvisioningError) -> Response {
    let status = match &err {
        ProvisioningError::InvalidIdentity(_) | ProvisioningError::AlreadyExists(_) => StatusCode::BAD_REQUEST,
        ProvisioningError::Unauthorized => return unauthorized(endpoint),
        ProvisioningError::NotFound(_) => StatusCode::NOT_FOUND,
        ProvisioningError::FeedUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ProvisioningError::Repository(_) | ProvisioningError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(endpoint, error = %err, "Request failed");
        "Internal server error".to_string()
    } else {
        err.to_string()
    };
    reply(endpoint, status, json!({ "status": "error", "error": message }))
}

async fn root_handler() -> Response {
    unauthorized("root")
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

async fn create_provision(State(state): State<Arc<AppState>>, Path(identity): Path<String>) -> Response {
    const ENDPOINT: &str = "create_provision";

    match state.provisioning_service.submit_provisioning(&identity).await {
        Ok(submission) => reply(
            ENDPOINT,
            StatusCode::ACCEPTED,
            json!({
                "status": "processing",
                "task_id": submission.job_id.to_string(),
                "provision_identity": submission.identity,
                "secret": submission.secret.as_str(),
            }),
        ),
        Err(e) => error_reply(ENDPOINT, e),
    }
}

async fn task_status(State(state): State<Arc<AppState>>, Path(task_id): Path<String>) -> Response {
    const ENDPOINT: &str = "task";

    // A malformed id can never have been issued.
    let Ok(job_id) = task_id.parse::<JobId>() else {
        return error_reply(ENDPOINT, ProvisioningError::NotFound(format!("job {task_id}")));
    };

    let view = match state.provisioning_service.query_status(job_id).await {
        Ok(view) => view,
        Err(e) => return error_reply(ENDPOINT, e),
    };

    match view.status {
        JobStatus::Pending => reply(
            ENDPOINT,
            StatusCode::ACCEPTED,
            json!({
                "status": "pending",
                "message": "Certificate generation in progress",
                "task_id": task_id,
                "state": "pending",
            }),
        ),
        JobStatus::Succeeded => reply(
            ENDPOINT,
            StatusCode::OK,
            json!({
                "status": "success",
                "message": view.message,
                "provision_identity": view.identity,
                "task_id": task_id,
                "state": "completed",
            }),
        ),
        JobStatus::Failed => reply(
            ENDPOINT,
            StatusCode::BAD_REQUEST,
            json!({
                "status": "error",
                "message": view.message,
                "provision_identity": view.identity,
                "task_id": task_id,
                "state": "failed",
            }),
        ),
    }
}

async fn download_profile(
    State(state): State<Arc<AppState>>,
    Path((identity, secret)): Path<(String, String)>,
) -> Response {
    const ENDPOINT: &str = "profile";

    let document = match state.provisioning_service.retrieve_credential(&identity, &secret).await {
        Ok(document) => document,
        Err(e) => return error_reply(ENDPOINT, e),
    };

    // The file name is derived from a validated identity.
    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    let Ok(disposition) = HeaderValue::from_str(&disposition) else {
        return error_reply(ENDPOINT, ProvisioningError::Internal("unencodable file name".to_string()));
    };

    record(ENDPOINT, StatusCode::OK);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PROFILE_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LiveAddressQuery {
    pub provision_identity: Option<String>,
    pub secret: Option<String>,
}

async fn live_address(State(state): State<Arc<AppState>>, Query(query): Query<LiveAddressQuery>) -> Response {
    const ENDPOINT: &str = "server_ip";

    let (Some(identity), Some(secret)) = (query.provision_identity, query.secret) else {
        return unauthorized(ENDPOINT);
    };

    match state.provisioning_service.lookup_live_address(&identity, &secret).await {
        Ok(live) => reply(
            ENDPOINT,
            StatusCode::OK,
            json!({ "ip": live.address.to_string(), "tier": live.tier }),
        ),
        Err(e) => error_reply(ENDPOINT, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::provisioning::{CredentialDocument, Submission};
    use crate::domain::job::JobView;
    use crate::domain::status_feed::{LiveAddress, MatchTier};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    /// Answers every call with a canned error, to exercise status mapping.
    struct Failing(fn() -> ProvisioningError);

    #[async_trait]
    impl ProvisioningService for Failing {
        async fn submit_provisioning(&self, _: &str) -> Result<Submission, ProvisioningError> {
            Err((self.0)())
        }
        async fn query_status(&self, _: JobId) -> Result<JobView, ProvisioningError> {
            Err((self.0)())
        }
        async fn retrieve_credential(&self, _: &str, _: &str) -> Result<CredentialDocument, ProvisioningError> {
            Err((self.0)())
        }
        async fn lookup_live_address(&self, _: &str, _: &str) -> Result<LiveAddress, ProvisioningError> {
            Err((self.0)())
        }
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_root_is_unauthorized() {
        let router = app(Arc::new(Failing(|| ProvisioningError::Unauthorized)));
        let (status, body) = call(router, "GET", "/").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "status": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_health() {
        let router = app(Arc::new(Failing(|| ProvisioningError::Unauthorized)));
        let (status, body) = call(router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let router = app(Arc::new(Failing(|| ProvisioningError::Internal("disk on fire".into()))));
        let (status, body) = call(router, "POST", "/mikrotik/openvpn/create_provision/client1").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_feed_unavailable_is_503() {
        let router = app(Arc::new(Failing(|| ProvisioningError::FeedUnavailable("gone".into()))));
        let (status, _) = call(router, "GET", "/server/ip/?provision_identity=routerA&secret=abc").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_query_parameters_are_unauthorized() {
        let router = app(Arc::new(Failing(|| ProvisioningError::Internal("unreachable".into()))));
        let (status, body) = call(router, "GET", "/server/ip/?provision_identity=routerA").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "status": "unauthorized" }));
    }

    #[tokio::test]
    async fn test_malformed_task_id_is_not_found() {
        let router = app(Arc::new(Failing(|| ProvisioningError::Internal("unreachable".into()))));
        let (status, _) = call(router, "GET", "/mikrotik/openvpn/task/not-a-uuid").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_live_address_body_shape() {
        let live = LiveAddress {
            address: "10.8.0.5".parse().unwrap(),
            tier: MatchTier::RoutingTable,
        };
        let body = json!({ "ip": live.address.to_string(), "tier": live.tier });
        assert_eq!(body, json!({ "ip": "10.8.0.5", "tier": "routing_table" }));
    }
}
