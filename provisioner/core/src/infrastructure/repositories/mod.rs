// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Job Store Implementations
//!
//! Infrastructure implementations of [`JobRepository`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve provisioning jobs
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresJobRepository** - durable store shared by every gateway replica
//!   and worker process
//! - **InMemoryJobRepository** - single-process store for development, tests
//!   and `gateway --with-worker`. Every operation takes one write lock, so the
//!   compare-and-swap guarantees hold trivially.

pub mod postgres_job;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::identity::Identity;
use crate::domain::job::{Job, JobId, JobOutcome, JobState, TerminalState, Transition};
use crate::domain::repository::{JobRepository, ReclaimedJobs, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryJobRepository {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn in_flight<'a>(jobs: &'a HashMap<JobId, Job>, identity: &Identity) -> Option<&'a Job> {
        jobs.values()
            .filter(|job| job.is_in_flight() && &job.identity == identity)
            .max_by_key(|job| job.submitted_at)
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn submit(&self, identity: &Identity) -> Result<JobId, RepositoryError> {
        let job = Job::new(identity.clone());
        let id = job.id;
        self.jobs.write().insert(id, job);
        Ok(id)
    }

    async fn submit_exclusive(&self, identity: &Identity) -> Result<JobId, RepositoryError> {
        let mut jobs = self.jobs.write();
        if let Some(existing) = Self::in_flight(&jobs, identity) {
            return Err(RepositoryError::Conflict(format!(
                "identity {} already has job {} in flight",
                identity, existing.id
            )));
        }
        let job = Job::new(identity.clone());
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.read().get(&id).cloned())
    }

    async fn find_in_flight(&self, identity: &Identity) -> Result<Option<Job>, RepositoryError> {
        Ok(Self::in_flight(&self.jobs.read(), identity).cloned())
    }

    async fn claim_next(&self) -> Result<Option<Job>, RepositoryError> {
        let mut jobs = self.jobs.write();
        let Some(id) = jobs
            .values()
            .filter(|job| job.state == JobState::Pending)
            .min_by_key(|job| job.submitted_at)
            .map(|job| job.id)
        else {
            return Ok(None);
        };

        match jobs.get_mut(&id) {
            Some(job) => {
                job.start(Utc::now())?;
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn transition(&self, id: JobId, terminal: TerminalState) -> Result<Transition, RepositoryError> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {id}")))?;
        Ok(job.finish(terminal, Utc::now()))
    }

    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<ReclaimedJobs, RepositoryError> {
        let now = Utc::now();
        let mut reclaimed = ReclaimedJobs::default();
        let mut jobs = self.jobs.write();

        for job in jobs.values_mut() {
            let stale = job.state == JobState::Started
                && job.started_at.is_some_and(|started| started < started_before);
            if !stale {
                continue;
            }

            if job.attempts >= max_attempts {
                let outcome = JobOutcome::failure(
                    &job.identity,
                    format!("Abandoned after {} attempts without completing", job.attempts),
                );
                job.finish(TerminalState::Failed(outcome), now);
                reclaimed.abandoned.push(job.id);
            } else {
                job.restart(now)?;
                reclaimed.requeued.push(job.clone());
            }
        }

        Ok(reclaimed)
    }

    async fn purge_expired(&self, ttl: chrono::Duration) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_expired(ttl, now));
        Ok((before - jobs.len()) as u64)
    }
}
