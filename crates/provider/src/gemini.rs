//! Gemini provider: `generateContent` over reqwest.
//!
//! Sends the prompt (plus any reference images as inline parts) and pulls
//! every inline image out of the first candidate. The key travels in the
//! `x-goog-api-key` header so it never shows up in URLs or logs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, instrument};

use crate::{
    GenerationRequest, GenerationResponse, ImageProvider, InlineImage, ProviderError, Result,
};

/// Public Gemini API endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Image-capable model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GenerateContentBody<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: RequestInlineData<'a> },
}

#[derive(Serialize)]
struct RequestInlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
    data: String,
}

/// Gemini image generation client.
///
/// The reqwest client carries the per-call timeout; this type adds none.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            model: model.into(),
        }
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate_content(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<GenerationResponse> {
        let mut parts = vec![RequestPart::Text {
            text: &request.prompt,
        }];
        for image in &request.images {
            parts.push(RequestPart::Inline {
                inline_data: RequestInlineData {
                    mime_type: &image.mime_type,
                    data: STANDARD.encode(&image.data),
                },
            });
        }
        let body = GenerateContentBody {
            contents: vec![RequestContent { parts }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        into_generation_response(parsed)
    }
}

/// Flatten the first candidate's parts into images and concatenated text.
fn into_generation_response(parsed: GenerateContentResponse) -> Result<GenerationResponse> {
    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut images = Vec::new();
    let mut text = String::new();
    for part in parts {
        if let Some(inline) = part.inline_data {
            let data = STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| ProviderError::InvalidResponse(format!("bad inline image data: {e}")))?;
            images.push(InlineImage::new(inline.mime_type, data));
        }
        if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    debug!(images = images.len(), text_len = text.len(), "parsed generateContent response");
    Ok(GenerationResponse {
        images,
        text: (!text.is_empty()).then_some(text),
    })
}

impl ImageProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationResponse>> + Send + 'a>> {
        Box::pin(self.generate_content(request, api_key))
    }
}
