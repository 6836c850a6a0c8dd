//! Concurrent, key-rotating generation dispatcher
//!
//! Runs a batch of independent image generation jobs over a bounded worker
//! pool. Each job gets an API key from the shared `CredentialPool` when it is
//! submitted; when that key reports quota exhaustion the job rotates to the
//! next key from the pool, backs off, and tries again, at most once per key.
//!
//! Job lifecycle:
//! 1. `Dispatcher::spawn` turns each `JobSpec` into a `Job` and assigns a key
//! 2. A worker pops the job and hands it to `RetryingInvoker::invoke`
//! 3. The invoker walks its attempt state machine to a terminal `Outcome`
//! 4. The worker sends a `JobReport` and, after a success, paces itself
//! 5. The caller drains reports from the `BatchHandle` as they arrive

pub mod dispatcher;
pub mod error;
pub mod invoker;
pub mod job;
pub mod metrics;
pub mod pacing;

#[cfg(test)]
mod test_support;

pub use dispatcher::{BatchHandle, Dispatcher, MAX_WORKERS};
pub use error::JobError;
pub use invoker::{AttemptAction, AttemptEvent, AttemptState, Classifier, RetryingInvoker};
pub use job::{BatchReport, Job, JobReport, JobSpec, Outcome};
pub use pacing::Pacer;
