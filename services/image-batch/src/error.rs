//! Service-specific error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised before or around a batch run.
///
/// Per-job failures (quota, upstream errors, empty responses) never surface
/// here; they are carried in the batch report instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("prompt file not found: {}", .0.display())]
    PromptFileMissing(PathBuf),

    #[error("prompt file {} has no prompts", .0.display())]
    NoPrompts(PathBuf),

    #[error("prompt file {} is invalid: {reason}", .path.display())]
    PromptFile { path: PathBuf, reason: String },

    #[error("unsupported reference image {}: expected png, jpg, jpeg or webp", .0.display())]
    UnsupportedImage(PathBuf),

    #[error("failed to read reference image {}: {source}", .path.display())]
    ReferenceImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Common(#[from] common::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
