// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL job store.
//!
//! Every state change is a single conditional `UPDATE`, so the row itself is
//! the compare-and-swap cell:
//! - dequeue: `FOR UPDATE SKIP LOCKED` on the oldest pending row
//! - terminal write: `WHERE state IN ('pending', 'started')`
//! - exclusive submission: transaction-scoped advisory lock keyed by identity

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::identity::Identity;
use crate::domain::job::{Job, JobId, JobOutcome, JobState, TerminalState, Transition};
use crate::domain::repository::{JobRepository, ReclaimedJobs, RepositoryError};

/// Advisory lock namespace for per-identity submission locks.
const SUBMISSION_LOCK_CLASS: i32 = 7501;

const JOB_COLUMNS: &str = "id, identity, state, message, attempts, submitted_at, started_at, finished_at";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, RepositoryError> {
    let id: Uuid = row.try_get("id")?;
    let identity = Identity::parse(row.try_get::<String, _>("identity")?.as_str())?;
    let state: JobState = row.try_get::<String, _>("state")?.parse()?;
    let message: Option<String> = row.try_get("message")?;
    let attempts: i32 = row.try_get("attempts")?;

    let outcome = match (state.is_terminal(), message) {
        (true, Some(message)) => Some(JobOutcome {
            message,
            identity: identity.clone(),
        }),
        _ => None,
    };

    Ok(Job {
        id: JobId(id),
        identity,
        state,
        outcome,
        attempts: u32::try_from(attempts).unwrap_or_default(),
        submitted_at: row.try_get("submitted_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

async fn insert_pending<'e, E>(executor: E, job: &Job) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO provision_jobs (id, identity, state, attempts, submitted_at)
        VALUES ($1, $2, $3, 0, $4)
        "#,
    )
    .bind(job.id.0)
    .bind(job.identity.as_str())
    .bind(job.state.as_str())
    .bind(job.submitted_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn submit(&self, identity: &Identity) -> Result<JobId, RepositoryError> {
        let job = Job::new(identity.clone());
        insert_pending(&self.pool, &job).await?;
        Ok(job.id)
    }

    async fn submit_exclusive(&self, identity: &Identity) -> Result<JobId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
            .bind(SUBMISSION_LOCK_CLASS)
            .bind(identity.as_str())
            .execute(&mut *tx)
            .await?;

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM provision_jobs
            WHERE identity = $1 AND state IN ('pending', 'started')
            LIMIT 1
            "#,
        )
        .bind(identity.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = existing {
            return Err(RepositoryError::Conflict(format!(
                "identity {identity} already has job {existing} in flight"
            )));
        }

        let job = Job::new(identity.clone());
        insert_pending(&mut *tx, &job).await?;
        tx.commit().await?;
        Ok(job.id)
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM provision_jobs WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn find_in_flight(&self, identity: &Identity) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM provision_jobs
            WHERE identity = $1 AND state IN ('pending', 'started')
            ORDER BY submitted_at DESC
            LIMIT 1
            "#
        ))
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn claim_next(&self) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE provision_jobs
            SET state = 'started', attempts = attempts + 1, started_at = $1
            WHERE id = (
                SELECT id FROM provision_jobs
                WHERE state = 'pending'
                ORDER BY submitted_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn transition(&self, id: JobId, terminal: TerminalState) -> Result<Transition, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE provision_jobs
            SET state = $2, message = $3, finished_at = $4
            WHERE id = $1 AND state IN ('pending', 'started')
            "#,
        )
        .bind(id.0)
        .bind(terminal.state().as_str())
        .bind(terminal.outcome().message.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Transition::Applied);
        }

        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM provision_jobs WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Ok(Transition::NoOp),
            None => Err(RepositoryError::NotFound(format!("job {id}"))),
        }
    }

    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<ReclaimedJobs, RepositoryError> {
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let abandoned: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE provision_jobs
            SET state = 'failed',
                message = 'Abandoned after ' || attempts || ' attempts without completing',
                finished_at = $3
            WHERE state = 'started' AND started_at < $1 AND attempts >= $2
            RETURNING id
            "#,
        )
        .bind(started_before)
        .bind(max_attempts)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let requeued = sqlx::query(&format!(
            r#"
            UPDATE provision_jobs
            SET attempts = attempts + 1, started_at = $3
            WHERE state = 'started' AND started_at < $1 AND attempts < $2
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(started_before)
        .bind(max_attempts)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(job_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        Ok(ReclaimedJobs {
            requeued,
            abandoned: abandoned.into_iter().map(JobId).collect(),
        })
    }

    async fn purge_expired(&self, ttl: chrono::Duration) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM provision_jobs
            WHERE state IN ('succeeded', 'failed') AND finished_at <= $1
            "#,
        )
        .bind(Utc::now() - ttl)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
