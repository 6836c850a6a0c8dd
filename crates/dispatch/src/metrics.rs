//! Metric recording for attempts, rotations and finished jobs
//!
//! - `image_batch_attempts_total` (counter): label `result`
//!   (`success`, `quota_exhausted`, `non_retryable`)
//! - `image_batch_attempt_duration_seconds` (histogram): label `result`
//! - `image_batch_credential_rotations_total` (counter)
//! - `image_batch_jobs_total` (counter): label `outcome`, plus `reason` on failures
//!
//! Without an installed recorder every call is a no-op.

/// Record one generation call and how long it took.
pub fn record_attempt(result: &'static str, duration_secs: f64) {
    metrics::counter!("image_batch_attempts_total", "result" => result).increment(1);
    metrics::histogram!("image_batch_attempt_duration_seconds", "result" => result)
        .record(duration_secs);
}

/// Record a switch to the next key after quota exhaustion.
pub fn record_rotation() {
    metrics::counter!("image_batch_credential_rotations_total").increment(1);
}

/// Record a job reaching a terminal outcome.
pub fn record_job(outcome: &'static str, reason: Option<&'static str>) {
    match reason {
        Some(reason) => {
            metrics::counter!("image_batch_jobs_total", "outcome" => outcome, "reason" => reason)
                .increment(1)
        }
        None => metrics::counter!("image_batch_jobs_total", "outcome" => outcome).increment(1),
    }
}
