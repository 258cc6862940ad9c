// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Service
//!
//! Everything the gateway does synchronously: validate, authorize, enqueue and
//! read. No operation here waits for a job to progress; callers poll
//! [`ProvisioningService::query_status`].
//!
//! Authorization failures are deliberately uniform: a malformed identity, an
//! unknown identity and a wrong secret all surface as
//! [`ProvisioningError::Unauthorized`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Request gateway use cases

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::config::SubmissionGuard;
use crate::domain::identity::{Identity, IdentityError};
use crate::domain::job::{JobId, JobView};
use crate::domain::repository::{JobRepository, RepositoryError};
use crate::domain::secret::{Secret, SecretDeriver};
use crate::domain::status_feed::{LiveAddress, StatusFeedError, StatusSource};
use crate::infrastructure::profile_store::{ProfileStore, ProfileStoreError};

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("Invalid provision identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("Client already exists")]
    AlreadyExists(Identity),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Status feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Job store error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StatusFeedError> for ProvisioningError {
    fn from(err: StatusFeedError) -> Self {
        match err {
            StatusFeedError::Unavailable(reason) => ProvisioningError::FeedUnavailable(reason),
        }
    }
}

impl From<ProfileStoreError> for ProvisioningError {
    fn from(err: ProfileStoreError) -> Self {
        ProvisioningError::Internal(err.to_string())
    }
}

/// Accepted provisioning request.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: JobId,
    pub identity: Identity,
    pub secret: Secret,
}

/// A stored client profile released to an authorized caller.
#[derive(Debug, Clone)]
pub struct CredentialDocument {
    pub identity: Identity,
    pub bytes: Vec<u8>,
}

impl CredentialDocument {
    pub fn file_name(&self) -> String {
        self.identity.profile_file_name()
    }
}

#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Validate the identity and enqueue a provisioning job.
    async fn submit_provisioning(&self, identity: &str) -> Result<Submission, ProvisioningError>;

    /// Current state of a job. Unknown and purged ids are `NotFound`.
    async fn query_status(&self, job_id: JobId) -> Result<JobView, ProvisioningError>;

    /// Profile bytes for `identity`, gated by its secret.
    async fn retrieve_credential(&self, identity: &str, secret: &str) -> Result<CredentialDocument, ProvisioningError>;

    /// Live tunnel address for `identity`, gated by its secret.
    async fn lookup_live_address(&self, identity: &str, secret: &str) -> Result<LiveAddress, ProvisioningError>;
}

pub struct StandardProvisioningService {
    repository: Arc<dyn JobRepository>,
    deriver: SecretDeriver,
    profiles: ProfileStore,
    status: Arc<dyn StatusSource>,
    guard: SubmissionGuard,
}

impl StandardProvisioningService {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        deriver: SecretDeriver,
        profiles: ProfileStore,
        status: Arc<dyn StatusSource>,
        guard: SubmissionGuard,
    ) -> Self {
        Self {
            repository,
            deriver,
            profiles,
            status,
            guard,
        }
    }

    /// Parse and verify in one step so every failure looks the same.
    fn authorize(&self, identity: &str, secret: &str) -> Result<Identity, ProvisioningError> {
        let Ok(identity) = Identity::parse(identity) else {
            self.deriver.verify_rejected(secret);
            return Err(ProvisioningError::Unauthorized);
        };
        if !self.deriver.verify(&identity, secret) {
            tracing::warn!(identity = %identity, "Rejected request with invalid secret");
            return Err(ProvisioningError::Unauthorized);
        }
        Ok(identity)
    }

    async fn enqueue(&self, identity: &Identity) -> Result<JobId, ProvisioningError> {
        match self.guard {
            SubmissionGuard::Advisory => {
                if let Some(existing) = self.repository.find_in_flight(identity).await? {
                    tracing::info!(identity = %identity, job_id = %existing.id, "Provisioning already in flight");
                    return Err(ProvisioningError::AlreadyExists(identity.clone()));
                }
                Ok(self.repository.submit(identity).await?)
            }
            SubmissionGuard::Exclusive => match self.repository.submit_exclusive(identity).await {
                Ok(job_id) => Ok(job_id),
                Err(RepositoryError::Conflict(reason)) => {
                    tracing::info!(identity = %identity, reason = %reason, "Provisioning already in flight");
                    Err(ProvisioningError::AlreadyExists(identity.clone()))
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

#[async_trait]
impl ProvisioningService for StandardProvisioningService {
    async fn submit_provisioning(&self, identity: &str) -> Result<Submission, ProvisioningError> {
        let identity = Identity::parse(identity)?;

        if self.profiles.exists(&identity).await? {
            tracing::info!(identity = %identity, "Profile already exists, rejecting submission");
            return Err(ProvisioningError::AlreadyExists(identity));
        }

        let job_id = self.enqueue(&identity).await?;
        let secret = self.deriver.derive(&identity);
        tracing::info!(identity = %identity, job_id = %job_id, "Provisioning job submitted");

        Ok(Submission {
            job_id,
            identity,
            secret,
        })
    }

    async fn query_status(&self, job_id: JobId) -> Result<JobView, ProvisioningError> {
        self.repository
            .find_by_id(job_id)
            .await?
            .map(|job| job.view())
            .ok_or_else(|| ProvisioningError::NotFound(format!("job {job_id}")))
    }

    async fn retrieve_credential(&self, identity: &str, secret: &str) -> Result<CredentialDocument, ProvisioningError> {
        let identity = self.authorize(identity, secret)?;
        let bytes = self
            .profiles
            .read(&identity)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("profile for {identity}")))?;
        tracing::info!(identity = %identity, "Profile retrieved");
        Ok(CredentialDocument { identity, bytes })
    }

    async fn lookup_live_address(&self, identity: &str, secret: &str) -> Result<LiveAddress, ProvisioningError> {
        let identity = self.authorize(identity, secret)?;
        let snapshot = self.status.snapshot().await?;
        let live = snapshot
            .lookup(&identity)
            .ok_or_else(|| ProvisioningError::NotFound(format!("live address for {identity}")))?;
        tracing::debug!(identity = %identity, address = %live.address, tier = ?live.tier, "Live address resolved");
        Ok(live)
    }
}
