//! Jobs, outcomes and batch reports

use credential_pool::Credential;
use provider::{GenerationRequest, InlineImage};

use crate::error::JobError;

/// What the caller asks for: one prompt, one destination.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Destination identifier for the artifact (file stem, slug, ...)
    pub target: String,
    pub request: GenerationRequest,
}

impl JobSpec {
    pub fn new(target: impl Into<String>, request: GenerationRequest) -> Self {
        Self {
            target: target.into(),
            request,
        }
    }
}

/// A submitted job. Only its own invoker mutates it.
#[derive(Debug)]
pub struct Job {
    pub id: usize,
    pub target: String,
    pub request: GenerationRequest,
    /// Key for the next attempt
    pub credential: Credential,
    pub attempts: u32,
    pub rotations: u32,
}

impl Job {
    pub fn new(id: usize, spec: JobSpec, credential: Credential) -> Self {
        Self {
            id,
            target: spec.target,
            request: spec.request,
            credential,
            attempts: 0,
            rotations: 0,
        }
    }
}

/// Terminal result of a job.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(InlineImage),
    Failure(JobError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Label for metrics: "success" or "failure".
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Failure(_) => "failure",
        }
    }
}

/// A finished job as seen by the caller.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub id: usize,
    pub target: String,
    pub attempts: u32,
    pub rotations: u32,
    pub outcome: Outcome,
}

impl JobReport {
    pub fn new(job: Job, outcome: Outcome) -> Self {
        Self {
            id: job.id,
            target: job.target,
            attempts: job.attempts,
            rotations: job.rotations,
            outcome,
        }
    }

    /// Report for a job whose worker died before it could report.
    pub fn lost(id: usize, target: String) -> Self {
        Self {
            id,
            target,
            attempts: 0,
            rotations: 0,
            outcome: Outcome::Failure(JobError::WorkerLost),
        }
    }
}

/// All job reports of one batch, ordered by job id.
#[derive(Debug, Default)]
pub struct BatchReport {
    reports: Vec<JobReport>,
}

impl BatchReport {
    pub fn new(mut reports: Vec<JobReport>) -> Self {
        reports.sort_by_key(|r| r.id);
        Self { reports }
    }

    pub fn reports(&self) -> &[JobReport] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<JobReport> {
        self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &JobReport> {
        self.reports.iter().filter(|r| r.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }

    /// True only for a non-empty batch without a single success.
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.succeeded().next().is_none()
    }
}
