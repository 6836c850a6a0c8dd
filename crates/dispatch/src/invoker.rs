//! Retrying invoker: one logical generation request
//!
//! Pure state machine: `handle_event` receives an event and returns
//! (new_state, action). `RetryingInvoker::invoke` executes the I/O implied by
//! each action (calling the provider, rotating keys, sleeping).
//!
//! Transitions:
//! - Attempting → Succeeded (response with an image)
//! - Attempting → Failed (response without an image, or non-retryable error)
//! - Attempting → Rotating (quota exhausted, attempts left)
//! - Attempting → Exhausted (quota exhausted on the last allowed attempt)
//! - Rotating → Attempting (backoff elapsed, next key drawn)
//!
//! The attempt budget equals the pool size, so a job tries each key at most
//! once per invocation and the machine takes at most `2 * budget` transitions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use credential_pool::CredentialPool;
use provider::{ErrorClassification, GenerationResponse, ImageProvider, ProviderError};
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::job::{Job, Outcome};

/// Pluggable quota classifier. Defaults to the provider's own.
pub type Classifier = Arc<dyn Fn(&ProviderError) -> ErrorClassification + Send + Sync>;

/// Attempt states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// A call with the current key is (about to be) in flight
    Attempting { attempt: u32 },
    /// Quota hit; switching to the next key and backing off
    Rotating { attempt: u32 },
    /// Terminal: image produced
    Succeeded,
    /// Terminal: every allowed attempt hit quota
    Exhausted { attempts: u32 },
    /// Terminal: non-retryable error or empty response
    Failed,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded | AttemptState::Exhausted { .. } | AttemptState::Failed
        )
    }
}

/// Events that drive transitions.
#[derive(Debug)]
pub enum AttemptEvent {
    /// The provider call returned a response
    Completed(GenerationResponse),
    /// The provider call failed with quota exhaustion
    QuotaExhausted(String),
    /// The provider call failed for any other reason
    Errored(String),
    /// Rotation backoff finished
    BackoffElapsed,
}

/// Actions the invoker executes after a transition.
#[derive(Debug)]
pub enum AttemptAction {
    /// Call the provider with the job's current key
    Call,
    /// Draw the next key from the pool, then sleep the backoff
    RotateAndWait,
    /// Stop with this outcome
    Finish(Outcome),
}

/// Handle a transition. Pure function: no I/O.
pub fn handle_event(
    state: AttemptState,
    event: AttemptEvent,
    budget: u32,
) -> (AttemptState, AttemptAction) {
    match (state, event) {
        (AttemptState::Attempting { .. }, AttemptEvent::Completed(response)) => {
            match response.into_first_image() {
                Some(image) => (
                    AttemptState::Succeeded,
                    AttemptAction::Finish(Outcome::Success(image)),
                ),
                None => (
                    AttemptState::Failed,
                    AttemptAction::Finish(Outcome::Failure(JobError::EmptyResponse)),
                ),
            }
        }

        (AttemptState::Attempting { attempt }, AttemptEvent::QuotaExhausted(_))
            if attempt < budget =>
        {
            (AttemptState::Rotating { attempt }, AttemptAction::RotateAndWait)
        }

        (AttemptState::Attempting { attempt }, AttemptEvent::QuotaExhausted(last_error)) => (
            AttemptState::Exhausted { attempts: attempt },
            AttemptAction::Finish(Outcome::Failure(JobError::RetryBudgetExhausted {
                attempts: attempt,
                last_error,
            })),
        ),

        (AttemptState::Attempting { .. }, AttemptEvent::Errored(reason)) => (
            AttemptState::Failed,
            AttemptAction::Finish(Outcome::Failure(JobError::NonRetryable(reason))),
        ),

        (AttemptState::Rotating { attempt }, AttemptEvent::BackoffElapsed) => (
            AttemptState::Attempting {
                attempt: attempt + 1,
            },
            AttemptAction::Call,
        ),

        (state, event) => {
            let message = format!("no transition from {state:?} on {event:?}");
            (
                AttemptState::Failed,
                AttemptAction::Finish(Outcome::Failure(JobError::Internal(message))),
            )
        }
    }
}

/// Runs one job to a terminal outcome, rotating keys on quota exhaustion.
pub struct RetryingInvoker {
    provider: Arc<dyn ImageProvider>,
    pool: Arc<CredentialPool>,
    backoff: Duration,
    classifier: Option<Classifier>,
}

impl RetryingInvoker {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        pool: Arc<CredentialPool>,
        backoff: Duration,
    ) -> Self {
        Self {
            provider,
            pool,
            backoff,
            classifier: None,
        }
    }

    /// Replace the provider's quota classification.
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&ProviderError) -> ErrorClassification + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Maximum attempts per job: one per distinct key.
    pub fn budget(&self) -> u32 {
        u32::try_from(self.pool.len()).unwrap_or(u32::MAX)
    }

    fn classify(&self, error: &ProviderError) -> ErrorClassification {
        match &self.classifier {
            Some(classifier) => classifier(error),
            None => self.provider.classify_error(error),
        }
    }

    /// Drive the job through the attempt state machine.
    ///
    /// Never returns an error: every failure becomes `Outcome::Failure`.
    pub async fn invoke(&self, job: &mut Job) -> Outcome {
        let budget = self.budget();
        let mut state = AttemptState::Attempting { attempt: 1 };
        let mut action = AttemptAction::Call;

        loop {
            let event = match action {
                AttemptAction::Finish(outcome) => {
                    match &outcome {
                        Outcome::Success(_) => info!(
                            attempts = job.attempts,
                            rotations = job.rotations,
                            "job succeeded"
                        ),
                        Outcome::Failure(e) => warn!(
                            attempts = job.attempts,
                            rotations = job.rotations,
                            error = %e,
                            "job failed"
                        ),
                    }
                    return outcome;
                }
                AttemptAction::Call => self.attempt(job).await,
                AttemptAction::RotateAndWait => {
                    job.credential = self.pool.next();
                    job.rotations += 1;
                    crate::metrics::record_rotation();
                    debug!(
                        slot = job.credential.slot(),
                        key = %job.credential.hint(),
                        backoff_ms = self.backoff.as_millis() as u64,
                        "rotated to next credential"
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    AttemptEvent::BackoffElapsed
                }
            };
            (state, action) = handle_event(state, event, budget);
        }
    }

    /// One provider call with the job's current key, classified into an event.
    async fn attempt(&self, job: &mut Job) -> AttemptEvent {
        job.attempts += 1;
        let slot = job.credential.slot();
        debug!(attempt = job.attempts, slot, provider = self.provider.id(), "calling provider");

        let started = Instant::now();
        let result = self
            .provider
            .generate(&job.request, job.credential.expose())
            .await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(response) => {
                crate::metrics::record_attempt("success", elapsed);
                AttemptEvent::Completed(response)
            }
            Err(error) => match self.classify(&error) {
                ErrorClassification::QuotaExhausted => {
                    crate::metrics::record_attempt("quota_exhausted", elapsed);
                    warn!(attempt = job.attempts, slot, error = %error, "credential quota exhausted");
                    AttemptEvent::QuotaExhausted(error.to_string())
                }
                ErrorClassification::NonRetryable => {
                    crate::metrics::record_attempt("non_retryable", elapsed);
                    warn!(attempt = job.attempts, slot, error = %error, "non-retryable provider error");
                    AttemptEvent::Errored(error.to_string())
                }
            },
        }
    }
}
