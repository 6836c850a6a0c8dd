//! Common types for the image-batch workspace

mod credentials;
mod error;
mod secret;

pub use credentials::{API_KEYS_ENV, parse_api_keys};
pub use error::{Error, Result};
pub use secret::Secret;
