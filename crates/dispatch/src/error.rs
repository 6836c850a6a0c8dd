//! Per-job failure reasons
//!
//! Every variant ends up as a `Outcome::Failure` in the batch report. None of
//! them propagate beyond the worker that produced them.

/// Why a job ended without an artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// Every key in the pool reported quota exhaustion for this job
    #[error("all credentials exhausted after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },

    /// The provider rejected the call for a reason retrying will not fix
    #[error("non-retryable error: {0}")]
    NonRetryable(String),

    /// The call succeeded but carried no image
    #[error("response contained no image")]
    EmptyResponse,

    /// The worker running this job stopped before reporting
    #[error("worker terminated before the job reported")]
    WorkerLost,

    /// The attempt state machine received an event it has no transition for
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobError::RetryBudgetExhausted { .. } => "retry_budget_exhausted",
            JobError::NonRetryable(_) => "non_retryable",
            JobError::EmptyResponse => "empty_response",
            JobError::WorkerLost => "worker_lost",
            JobError::Internal(_) => "internal",
        }
    }
}
