//! Error types for pool construction

/// Errors from pool construction. Selection itself cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty or malformed key configuration
    #[error(transparent)]
    Config(#[from] common::Error),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
