//! Round-robin pool of API keys
//!
//! Holds an ordered, non-empty set of API keys and hands them out through a
//! shared atomic cursor. Keys are never removed or disabled: a key that hit
//! its quota simply comes around again after a full rotation, by which time
//! its window may have reset.
//!
//! Key lifecycle:
//! 1. Keys are parsed from configuration (JSON array) and wrapped in `Secret`
//! 2. The dispatcher draws one key per job at submission time
//! 3. A job whose key is exhausted draws the next key directly from the pool
//! 4. The pool is dropped with the batch; secrets are zeroed on drop

pub mod error;
pub mod pool;

pub use error::{Error, Result};
pub use pool::{Credential, CredentialPool};
