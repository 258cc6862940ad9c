// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Job Aggregate
//!
//! One [`Job`] tracks one attempt to provision an [`Identity`]. The lifecycle is
//!
//! ```text
//! Pending ──► Started ──► Succeeded
//!    │           │
//!    └───────────┴──────► Failed
//! ```
//!
//! `Succeeded` and `Failed` are terminal and immutable. Writing a terminal
//! state onto a job that is already terminal is a [`Transition::NoOp`], never
//! an error, so a re-delivered worker execution cannot clobber a recorded
//! result.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Job state machine and its caller-facing projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(JobId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Started,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Started => "started",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "started" => Ok(JobState::Started),
            "succeeded" => Ok(JobState::Succeeded),
            "failed" => Ok(JobState::Failed),
            other => Err(JobError::UnknownState(other.to_string())),
        }
    }
}

/// Result payload attached atomically with a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub message: String,
    pub identity: Identity,
}

impl JobOutcome {
    pub fn success(identity: &Identity) -> Self {
        Self {
            message: "Certificate generated successfully".to_string(),
            identity: identity.clone(),
        }
    }

    pub fn failure(identity: &Identity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            identity: identity.clone(),
        }
    }
}

/// A terminal state together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    Succeeded(JobOutcome),
    Failed(JobOutcome),
}

impl TerminalState {
    pub fn state(&self) -> JobState {
        match self {
            TerminalState::Succeeded(_) => JobState::Succeeded,
            TerminalState::Failed(_) => JobState::Failed,
        }
    }

    pub fn outcome(&self) -> &JobOutcome {
        match self {
            TerminalState::Succeeded(outcome) | TerminalState::Failed(outcome) => outcome,
        }
    }
}

/// Whether a state change was recorded or ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    NoOp,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {id} cannot move from {from} to {to}")]
    IllegalTransition { id: JobId, from: JobState, to: JobState },

    #[error("unknown job state '{0}'")]
    UnknownState(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub identity: Identity,
    pub state: JobState,
    pub outcome: Option<JobOutcome>,
    /// Number of times a worker has claimed this job.
    pub attempts: u32,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(identity: Identity) -> Self {
        Self {
            id: JobId::new(),
            identity,
            state: JobState::Pending,
            outcome: None,
            attempts: 0,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Claim the job for execution (`Pending -> Started`).
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        match self.state {
            JobState::Pending => {
                self.state = JobState::Started;
                self.attempts += 1;
                self.started_at = Some(now);
                Ok(())
            }
            from => Err(JobError::IllegalTransition {
                id: self.id,
                from,
                to: JobState::Started,
            }),
        }
    }

    /// Re-claim a `Started` job whose worker disappeared.
    pub fn restart(&mut self, now: DateTime<Utc>) -> Result<(), JobError> {
        match self.state {
            JobState::Started => {
                self.attempts += 1;
                self.started_at = Some(now);
                Ok(())
            }
            from => Err(JobError::IllegalTransition {
                id: self.id,
                from,
                to: JobState::Started,
            }),
        }
    }

    /// Record a terminal state. Already-terminal jobs are left untouched.
    pub fn finish(&mut self, terminal: TerminalState, now: DateTime<Utc>) -> Transition {
        if self.state.is_terminal() {
            return Transition::NoOp;
        }
        self.state = terminal.state();
        self.outcome = Some(terminal.outcome().clone());
        self.finished_at = Some(now);
        Transition::Applied
    }

    /// Terminal jobs become eligible for deletion `ttl` after finishing.
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        match (self.state.is_terminal(), self.finished_at) {
            (true, Some(finished_at)) => finished_at + ttl <= now,
            _ => false,
        }
    }

    pub fn view(&self) -> JobView {
        JobView::from(self)
    }
}

/// State as reported to callers: `Started` is folded into `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl From<JobState> for JobStatus {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Pending | JobState::Started => JobStatus::Pending,
            JobState::Succeeded => JobStatus::Succeeded,
            JobState::Failed => JobStatus::Failed,
        }
    }
}

/// Read-only projection answered by status queries. In-flight jobs carry no
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub message: Option<String>,
    pub identity: Option<Identity>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let status = JobStatus::from(job.state);
        let (message, identity) = match (status, &job.outcome) {
            (JobStatus::Pending, _) | (_, None) => (None, None),
            (_, Some(outcome)) => (Some(outcome.message.clone()), Some(outcome.identity.clone())),
        };
        Self {
            id: job.id,
            status,
            message,
            identity,
        }
    }
}
