//! API key list parsing
//!
//! Keys arrive as a JSON array of strings, usually through the
//! `GEMINI_API_KEYS` environment variable (or a `.env` file). An empty list,
//! a blank entry, or anything that is not a JSON array of strings is a fatal
//! configuration error.

use crate::error::{Error, Result};
use crate::secret::Secret;

/// Environment variable holding the JSON array of API keys.
pub const API_KEYS_ENV: &str = "GEMINI_API_KEYS";

/// Parse a JSON array of API keys into redacted secrets.
///
/// Order is preserved; it defines the round-robin order of the pool.
pub fn parse_api_keys(raw: &str) -> Result<Vec<Secret<String>>> {
    let keys: Vec<String> = serde_json::from_str(raw.trim()).map_err(|e| {
        Error::Config(format!(
            "{API_KEYS_ENV} must be a JSON array of strings, e.g. [\"key1\",\"key2\"]: {e}"
        ))
    })?;

    if keys.is_empty() {
        return Err(Error::Config(format!("{API_KEYS_ENV} contains no keys")));
    }

    keys.into_iter()
        .enumerate()
        .map(|(i, key)| {
            let key = key.trim().to_owned();
            if key.is_empty() {
                Err(Error::Config(format!("api key at index {i} is blank")))
            } else {
                Ok(Secret::new(key))
            }
        })
        .collect()
}
