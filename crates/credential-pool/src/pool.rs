//! Credential pool and round-robin selection
//!
//! The pool owns the key list and a single `AtomicUsize` cursor. Every call to
//! `next()` performs one `fetch_add`, so concurrent workers each get a distinct
//! position and a full cycle visits every key exactly once.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::Secret;
use tracing::{debug, info};

use crate::error::Result;

/// One API key plus its position in the pool.
///
/// The slot is what gets logged; the key itself stays redacted.
#[derive(Clone)]
pub struct Credential {
    slot: usize,
    key: Secret<String>,
}

impl Credential {
    /// Position of this key in the configured order (0-based).
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Raw key for building a request.
    pub fn expose(&self) -> &str {
        self.key.expose()
    }

    /// Redacted tail of the key, for telling keys apart in reports.
    pub fn hint(&self) -> String {
        self.key.hint()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("slot", &self.slot)
            .field("key", &self.key)
            .finish()
    }
}

/// Shared round-robin pool of API keys.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    next_index: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from already-parsed keys. Fails on an empty list.
    pub fn new(keys: Vec<Secret<String>>) -> Result<Self> {
        if keys.is_empty() {
            return Err(common::Error::Config(
                "credential pool requires at least one api key".into(),
            )
            .into());
        }
        let credentials: Vec<Credential> = keys
            .into_iter()
            .enumerate()
            .map(|(slot, key)| Credential { slot, key })
            .collect();
        info!(keys = credentials.len(), "credential pool initialized");
        Ok(Self {
            credentials,
            next_index: AtomicUsize::new(0),
        })
    }

    /// Build a pool from a JSON array of key strings.
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::new(common::parse_api_keys(raw)?)
    }

    /// Next key in round-robin order.
    ///
    /// The cursor only ever moves forward; wrapping is done on read.
    pub fn next(&self) -> Credential {
        let position = self.next_index.fetch_add(1, Ordering::Relaxed);
        let credential = &self.credentials[position % self.credentials.len()];
        debug!(slot = credential.slot, "credential drawn");
        credential.clone()
    }

    /// Number of distinct keys. Also the per-job attempt budget.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false; construction rejects empty key lists.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Total number of `next()` calls so far.
    pub fn draws(&self) -> usize {
        self.next_index.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("keys", &self.credentials.len())
            .field("draws", &self.draws())
            .finish()
    }
}
