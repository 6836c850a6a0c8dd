//! Quota detection for generation API failures
//!
//! A 429 status is always quota exhaustion. Other statuses are inspected for
//! the provider's quota markers (Gemini reports `RESOURCE_EXHAUSTED` in the
//! error body). Anything else is non-retryable.

use crate::{ErrorClassification, ProviderError};

/// Quota exhaustion markers, matched case-insensitively against error text.
const QUOTA_MARKERS: &[&str] = &[
    "resource_exhausted",
    "resource exhausted",
    "rate limit",
    "rate-limit",
    "quota exceeded",
    "exceeded your current quota",
];

/// Classify error text by looking for quota markers.
pub fn classify_body(body: &str) -> ErrorClassification {
    let lower = body.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ErrorClassification::QuotaExhausted
    } else {
        ErrorClassification::NonRetryable
    }
}

/// Classify an upstream error by HTTP status and response body.
pub fn classify_status(status: u16, body: &str) -> ErrorClassification {
    match status {
        429 => ErrorClassification::QuotaExhausted,
        _ => classify_body(body),
    }
}

/// Default classification for any `ProviderError`.
///
/// Transport failures and unparseable responses never count as quota
/// exhaustion, even if their message happens to mention a marker.
pub fn classify_error(error: &ProviderError) -> ErrorClassification {
    match error {
        ProviderError::Upstream { status, body } => classify_status(*status, body),
        ProviderError::Http(_) | ProviderError::InvalidResponse(_) => {
            ErrorClassification::NonRetryable
        }
    }
}
