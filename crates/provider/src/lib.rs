//! Provider abstraction for remote image generation
//!
//! Defines the `ImageProvider` trait that decouples the dispatcher from the
//! concrete generation API. `GeminiProvider` talks to the Gemini REST API;
//! tests substitute scripted providers. Every provider also classifies its
//! own failures so the retry logic can tell quota exhaustion (rotate to the
//! next key) from everything else (give up on the job).

pub mod classify;
pub mod gemini;

pub use classify::{classify_body, classify_error, classify_status};
pub use gemini::GeminiProvider;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;

/// Classification of a failed generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// The key's quota or rate limit was hit; retry with the next key
    QuotaExhausted,
    /// Malformed request, content policy, auth, server error; never retried
    NonRetryable,
}

/// Errors from a single generation call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Image bytes with their MIME type, used both for reference images sent
/// with a request and for images returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// File extension matching the MIME type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// One generation request: the prompt plus optional reference images.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub images: Vec<InlineImage>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<InlineImage>) -> Self {
        self.images = images;
        self
    }
}

/// Successful response. May legitimately carry no image at all (the model
/// answered with text only), which callers treat as an empty result.
#[derive(Debug, Clone, Default)]
pub struct GenerationResponse {
    pub images: Vec<InlineImage>,
    pub text: Option<String>,
}

impl GenerationResponse {
    pub fn into_first_image(self) -> Option<InlineImage> {
        self.images.into_iter().next()
    }
}

/// MIME type for a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// File extension for a MIME type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Abstraction over remote image generation backends.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn ImageProvider>`).
pub trait ImageProvider: Send + Sync {
    /// Identifier for logging (e.g. "gemini")
    fn id(&self) -> &str;

    /// Perform one generation call with the given API key.
    ///
    /// No retries happen here; a single call maps to a single attempt.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationResponse>> + Send + 'a>>;

    /// Classify a failure from `generate` to pick rotate-and-retry vs give up.
    fn classify_error(&self, error: &ProviderError) -> ErrorClassification {
        classify_error(error)
    }
}
