//! Scripted provider and helpers shared by the invoker and dispatcher tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credential_pool::CredentialPool;
use provider::{
    GenerationRequest, GenerationResponse, ImageProvider, InlineImage, ProviderError,
};

/// One recorded call: the prompt and the key it was sent with.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub key: String,
}

type Script =
    dyn Fn(&GenerationRequest, &str, usize) -> provider::Result<GenerationResponse> + Send + Sync;

/// Provider whose answers come from a closure.
///
/// The closure receives the request, the key, and the 1-based attempt number
/// for that prompt. Every call is logged and in-flight calls are counted.
pub struct ScriptedProvider {
    script: Box<Script>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&GenerationRequest, &str, usize) -> provider::Result<GenerationResponse>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ImageProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        api_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = provider::Result<GenerationResponse>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let previous = calls.iter().filter(|c| c.prompt == request.prompt).count();
                calls.push(Call {
                    prompt: request.prompt.clone(),
                    key: api_key.to_string(),
                });
                previous + 1
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            (self.script)(request, api_key, attempt)
        })
    }
}

pub fn pool_of(n: usize) -> Arc<CredentialPool> {
    let keys: Vec<String> = (0..n).map(|i| format!("\"key-{i}\"")).collect();
    Arc::new(CredentialPool::from_json(&format!("[{}]", keys.join(","))).unwrap())
}

pub fn image_response() -> GenerationResponse {
    GenerationResponse {
        images: vec![InlineImage::new("image/png", b"png".to_vec())],
        text: None,
    }
}

pub fn quota_error() -> ProviderError {
    ProviderError::Upstream {
        status: 429,
        body: r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#.into(),
    }
}

pub fn bad_request() -> ProviderError {
    ProviderError::Upstream {
        status: 400,
        body: r#"{"error":{"status":"INVALID_ARGUMENT"}}"#.into(),
    }
}
