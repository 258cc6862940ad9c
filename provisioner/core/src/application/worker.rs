// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Worker
//!
//! Claims pending jobs from the job store, issues credentials, writes the
//! client profile and records exactly one terminal state per job.
//!
//! - [`ProvisioningWorker::run`] executes one claimed job under the wall-clock
//!   budget. Issuer failures, profile conflicts and timeouts all end in
//!   `Failed`; nothing is propagated to a caller.
//! - [`ProvisioningWorker::run_forever`] drives a bounded pool of such runs
//!   and performs store maintenance: `Started` jobs abandoned by a dead worker
//!   are picked up again (or failed after `max_attempts`), and terminal jobs
//!   past their retention are purged.
//!
//! Execution is at-least-once. A re-run finds the certificate already in the
//! PKI and the identical profile already on disk, and the terminal write is a
//! compare-and-swap that cannot overwrite an earlier result.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Job execution and crash recovery

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::domain::config::WorkerConfig;
use crate::domain::identity::{Identity, IdentityError};
use crate::domain::issuer::{CredentialIssuer, IssuerError, ProfileTemplate};
use crate::domain::job::{Job, JobOutcome, TerminalState, Transition};
use crate::domain::repository::{JobRepository, RepositoryError};
use crate::infrastructure::profile_store::{ProfileStore, ProfileStoreError, WriteOutcome};

/// Clamp for durations chrono cannot represent.
fn clamp_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Why a single execution failed. Recorded into the job, never returned.
#[derive(Debug, Error)]
enum ExecutionError {
    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    Issuer(#[from] IssuerError),

    #[error("{0}")]
    Profile(#[from] ProfileStoreError),
}

pub struct ProvisioningWorker {
    repository: Arc<dyn JobRepository>,
    issuer: Arc<dyn CredentialIssuer>,
    profiles: ProfileStore,
    template: ProfileTemplate,
    config: WorkerConfig,
    job_ttl: Duration,
}

impl ProvisioningWorker {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        issuer: Arc<dyn CredentialIssuer>,
        profiles: ProfileStore,
        template: ProfileTemplate,
        config: WorkerConfig,
        job_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            issuer,
            profiles,
            template,
            config,
            job_ttl,
        }
    }

    /// Execute one claimed job and record its terminal state.
    ///
    /// A store error on the final write leaves the job `Started`; the stale
    /// sweep picks it up again.
    pub async fn run(&self, job: &Job) -> Result<Transition, RepositoryError> {
        let started = Instant::now();
        tracing::info!(job_id = %job.id, identity = %job.identity, attempt = job.attempts, "Provisioning job started");

        let terminal = match tokio::time::timeout(self.config.timeout, self.execute(&job.identity)).await {
            Ok(Ok(())) => TerminalState::Succeeded(JobOutcome::success(&job.identity)),
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job.id, identity = %job.identity, error = %e, "Provisioning job failed");
                TerminalState::Failed(JobOutcome::failure(
                    &job.identity,
                    format!("Error generating certificate: {e}"),
                ))
            }
            Err(_) => {
                tracing::warn!(job_id = %job.id, identity = %job.identity, timeout = ?self.config.timeout, "Provisioning job timed out");
                TerminalState::Failed(JobOutcome::failure(
                    &job.identity,
                    format!(
                        "Certificate generation timed out after {}s",
                        self.config.timeout.as_secs()
                    ),
                ))
            }
        };

        let outcome = terminal.state();
        let transition = self.repository.transition(job.id, terminal).await.inspect_err(|e| {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome");
        })?;

        if transition == Transition::Applied {
            metrics::counter!("ovpn_jobs_completed_total", "outcome" => outcome.as_str()).increment(1);
            metrics::histogram!("ovpn_job_duration_seconds").record(started.elapsed().as_secs_f64());
            tracing::info!(job_id = %job.id, identity = %job.identity, state = %outcome, "Provisioning job finished");
        } else {
            tracing::info!(job_id = %job.id, "Job already terminal, outcome of this run discarded");
        }
        Ok(transition)
    }

    async fn execute(&self, identity: &Identity) -> Result<(), ExecutionError> {
        // Re-validate: the identity reaches a child process and a file path.
        let identity = Identity::parse(identity.as_str())?;

        let bundle = self.issuer.issue(&identity).await?;
        let profile = self.template.render(&bundle);

        match self.profiles.write_idempotent(&identity, profile.as_bytes()).await? {
            WriteOutcome::Created => {}
            WriteOutcome::AlreadyPresent => {
                tracing::info!(identity = %identity, "Identical profile already stored");
            }
        }
        Ok(())
    }

    /// Fail or re-run `Started` jobs older than `stale_after`.
    pub async fn reclaim_stale(&self) -> Result<Vec<Job>, RepositoryError> {
        let stale_after = clamp_duration(self.config.stale_after);
        let reclaimed = self
            .repository
            .reclaim_stale(chrono::Utc::now() - stale_after, self.config.max_attempts)
            .await?;

        for id in &reclaimed.abandoned {
            tracing::warn!(job_id = %id, max_attempts = self.config.max_attempts, "Abandoned job after repeated attempts");
            metrics::counter!("ovpn_jobs_completed_total", "outcome" => "failed").increment(1);
        }
        for job in &reclaimed.requeued {
            tracing::warn!(job_id = %job.id, identity = %job.identity, attempt = job.attempts, "Re-running orphaned job");
        }
        Ok(reclaimed.requeued)
    }

    /// Delete terminal jobs past their retention.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let ttl = clamp_duration(self.job_ttl);
        let purged = self.repository.purge_expired(ttl).await?;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired jobs");
        }
        Ok(purged)
    }

    /// Run until `shutdown` is cancelled, then wait for in-flight jobs.
    pub async fn run_forever(self: Arc<Self>, shutdown: CancellationToken) {
        let concurrency = self.config.concurrency.max(1);
        let slots = Arc::new(Semaphore::new(concurrency));

        let reclaim_every = (self.config.stale_after / 2).max(Duration::from_secs(1));
        let mut reclaim_tick = tokio::time::interval(reclaim_every);
        let mut purge_tick = tokio::time::interval(self.config.purge_interval.max(Duration::from_secs(1)));

        tracing::info!(
            concurrency,
            timeout = ?self.config.timeout,
            stale_after = ?self.config.stale_after,
            "Provisioning worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                _ = reclaim_tick.tick() => match self.reclaim_stale().await {
                    Ok(requeued) => {
                        for job in requeued {
                            let worker = self.clone();
                            let slots = slots.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                let Ok(_permit) = slots.acquire_owned().await else { return };
                                // Left `Started`; the next sweep after restart picks it up.
                                if shutdown.is_cancelled() {
                                    return;
                                }
                                let _ = worker.run(&job).await;
                            });
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Stale job sweep failed"),
                },

                _ = purge_tick.tick() => {
                    if let Err(e) = self.purge_expired().await {
                        tracing::error!(error = %e, "Job purge failed");
                    }
                }

                permit = slots.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    match self.repository.claim_next().await {
                        Ok(Some(job)) => {
                            let worker = self.clone();
                            tokio::spawn(async move {
                                let _ = worker.run(&job).await;
                                drop(permit);
                            });
                        }
                        Ok(None) => {
                            drop(permit);
                            self.idle(&shutdown).await;
                        }
                        Err(e) => {
                            drop(permit);
                            tracing::error!(error = %e, "Failed to claim next job");
                            self.idle(&shutdown).await;
                        }
                    }
                }
            }
        }

        tracing::info!("Provisioning worker stopping, waiting for in-flight jobs");
        let drain = slots.acquire_many(concurrency as u32);
        if tokio::time::timeout(self.config.timeout + Duration::from_secs(5), drain).await.is_err() {
            tracing::warn!("In-flight jobs did not finish in time; they will be reclaimed after restart");
        }
        tracing::info!("Provisioning worker stopped");
    }

    async fn idle(&self, shutdown: &CancellationToken) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.config.poll_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::issuer::{CredentialBundle, TransportProto};
    use crate::domain::job::JobState;
    use crate::infrastructure::repositories::InMemoryJobRepository;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Succeed,
        Fail,
        Hang,
    }

    struct FakeIssuer {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeIssuer {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialIssuer for FakeIssuer {
        async fn issue(&self, identity: &Identity) -> Result<CredentialBundle, IssuerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(CredentialBundle {
                    ca_cert: "CA".to_string(),
                    client_cert: format!("CERT {identity}"),
                    client_key: "KEY".to_string(),
                    tls_crypt: None,
                }),
                Behaviour::Fail => Err(IssuerError::ToolNotFound("/nonexistent/easyrsa".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        repo: Arc<InMemoryJobRepository>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                repo: Arc::new(InMemoryJobRepository::new()),
            }
        }

        fn profiles(&self) -> ProfileStore {
            ProfileStore::new(self.dir.path())
        }

        fn worker(&self, issuer: Arc<FakeIssuer>, timeout: Duration) -> ProvisioningWorker {
            let config = WorkerConfig {
                timeout,
                poll_interval: Duration::from_millis(10),
                ..WorkerConfig::default()
            };
            ProvisioningWorker::new(
                self.repo.clone(),
                issuer,
                self.profiles(),
                ProfileTemplate::builtin("vpn.example.net", 1194, TransportProto::Tcp),
                config,
                Duration::from_secs(3600),
            )
        }

        async fn claimed(&self, raw: &str) -> Job {
            self.repo.submit(&Identity::parse(raw).unwrap()).await.unwrap();
            self.repo.claim_next().await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn test_success_writes_profile_and_succeeds() {
        let fx = Fixture::new();
        let worker = fx.worker(FakeIssuer::new(Behaviour::Succeed), Duration::from_secs(5));
        let job = fx.claimed("client1").await;

        assert_eq!(worker.run(&job).await.unwrap(), Transition::Applied);

        let stored = fx.repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Succeeded);
        let profile = fx.profiles().read(&job.identity).await.unwrap().unwrap();
        let profile = String::from_utf8(profile).unwrap();
        assert!(profile.contains("<cert>\nCERT client1\n</cert>"));
    }

    #[tokio::test]
    async fn test_issuer_failure_is_recorded() {
        let fx = Fixture::new();
        let worker = fx.worker(FakeIssuer::new(Behaviour::Fail), Duration::from_secs(5));
        let job = fx.claimed("client1").await;

        worker.run(&job).await.unwrap();

        let view = fx.repo.find_by_id(job.id).await.unwrap().unwrap().view();
        assert_eq!(view.status, crate::domain::job::JobStatus::Failed);
        assert!(view.message.unwrap().contains("CA tool not found"));
        assert!(!fx.profiles().exists(&job.identity).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_job() {
        let fx = Fixture::new();
        let worker = fx.worker(FakeIssuer::new(Behaviour::Hang), Duration::from_secs(300));
        let job = fx.claimed("client1").await;

        worker.run(&job).await.unwrap();

        let stored = fx.repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(
            stored.outcome.unwrap().message,
            "Certificate generation timed out after 300s"
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let fx = Fixture::new();
        let issuer = FakeIssuer::new(Behaviour::Succeed);
        let worker = fx.worker(issuer.clone(), Duration::from_secs(5));
        let job = fx.claimed("client1").await;

        assert_eq!(worker.run(&job).await.unwrap(), Transition::Applied);
        let first = fx.repo.find_by_id(job.id).await.unwrap().unwrap();

        // Duplicate delivery of the same job.
        assert_eq!(worker.run(&job).await.unwrap(), Transition::NoOp);
        assert_eq!(fx.repo.find_by_id(job.id).await.unwrap().unwrap(), first);
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conflicting_profile_fails_job() {
        let fx = Fixture::new();
        let worker = fx.worker(FakeIssuer::new(Behaviour::Succeed), Duration::from_secs(5));
        let job = fx.claimed("client1").await;
        fx.profiles().write_idempotent(&job.identity, b"someone else's profile").await.unwrap();

        worker.run(&job).await.unwrap();
        let stored = fx.repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_run_forever_processes_queue_and_stops() {
        let fx = Fixture::new();
        let worker = Arc::new(fx.worker(FakeIssuer::new(Behaviour::Succeed), Duration::from_secs(5)));
        let a = fx.repo.submit(&Identity::parse("routerA").unwrap()).await.unwrap();
        let b = fx.repo.submit(&Identity::parse("routerB").unwrap()).await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.clone().run_forever(shutdown.clone()));

        let repo = fx.repo.clone();
        let finished = tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                let done_a = repo.find_by_id(a).await.unwrap().unwrap().state.is_terminal();
                let done_b = repo.find_by_id(b).await.unwrap().unwrap().state.is_terminal();
                if done_a && done_b {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(finished.is_ok());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(fx.profiles().list().await.unwrap().len(), 2);
    }
}
