//! The `generate` subcommand: build jobs, dispatch them, persist artifacts

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use credential_pool::CredentialPool;
use dispatch::{Dispatcher, JobSpec, Outcome, RetryingInvoker};
use provider::{GeminiProvider, GenerationRequest, ImageProvider, InlineImage};
use tracing::{info, warn};

use crate::cli::GenerateArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::save_artifact;
use crate::prompts::{PromptFile, slugify, unique_name};
use crate::report::{BatchSummary, JobResult, JobSummary};

/// Everything `execute` needs besides the provider and the pool.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub max_workers: usize,
    pub quota_backoff: Duration,
    pub pacing: Duration,
    pub out_dir: PathBuf,
}

impl RunSettings {
    pub fn resolve(config: &Config, args: &GenerateArgs) -> Self {
        Self {
            max_workers: args.max_workers.unwrap_or(config.dispatch.max_workers),
            quota_backoff: config.dispatch.quota_backoff(),
            pacing: config.dispatch.pacing(),
            out_dir: args.out.clone().unwrap_or_else(|| config.output.dir.clone()),
        }
    }
}

/// Read a local image to send along with every prompt.
pub fn load_reference_image(path: &Path) -> Result<InlineImage> {
    let mime = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(provider::mime_for_extension)
        .ok_or_else(|| Error::UnsupportedImage(path.to_path_buf()))?;
    let data = std::fs::read(path).map_err(|source| Error::ReferenceImage {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(InlineImage::new(mime, data))
}

/// Jobs for a run.
///
/// With `--prompt`, that prompt is repeated `--count` times (default 1) with
/// targets `image_001`, `image_002`, ... Otherwise the first `--count`
/// entries of the prompt file are used, or all of them.
pub fn build_specs(
    args: &GenerateArgs,
    prompt_file: &Path,
    images: &[InlineImage],
) -> Result<Vec<JobSpec>> {
    let request = |text: &str| GenerationRequest::new(text).with_images(images.to_vec());

    if let Some(ref prompt) = args.prompt {
        let count = args.count.unwrap_or(1);
        return Ok((1..=count)
            .map(|i| JobSpec::new(format!("image_{i:03}"), request(prompt)))
            .collect());
    }

    let file = PromptFile::load(prompt_file)?;
    if file.is_empty() {
        return Err(Error::NoPrompts(prompt_file.to_path_buf()));
    }
    let take = args.count.unwrap_or(file.len());

    let mut taken = HashSet::new();
    let specs = file
        .prompts
        .iter()
        .take(take)
        .enumerate()
        .map(|(i, entry)| {
            let mut base = slugify(&entry.name);
            if base.is_empty() {
                base = format!("image_{:03}", i + 1);
            }
            let target = unique_name(&base, &taken);
            taken.insert(target.clone());
            JobSpec::new(target, request(&entry.text))
        })
        .collect();
    Ok(specs)
}

/// `generate` subcommand.
///
/// Credentials are resolved first: a missing or malformed key list fails the
/// run before a single request is sent.
pub async fn run_generate(config: &Config, args: &GenerateArgs) -> anyhow::Result<BatchSummary> {
    let keys = config
        .resolve_api_keys()
        .context("failed to load API keys")?;
    let pool = Arc::new(CredentialPool::new(keys)?);
    info!(credentials = pool.len(), "credential pool ready");

    let images = args
        .images
        .iter()
        .map(|p| load_reference_image(p))
        .collect::<Result<Vec<_>>>()?;

    let prompt_file = args
        .prompt_file
        .clone()
        .unwrap_or_else(|| config.output.prompt_file.clone());
    let specs = build_specs(args, &prompt_file, &images)?;

    let settings = RunSettings::resolve(config, args);
    std::fs::create_dir_all(&settings.out_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            settings.out_dir.display()
        )
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.generation.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let provider: Arc<dyn ImageProvider> = Arc::new(GeminiProvider::new(
        client,
        config.generation.api_base.clone(),
        config.generation.model.clone(),
    ));

    info!(
        jobs = specs.len(),
        model = %config.generation.model,
        reference_images = images.len(),
        out_dir = %settings.out_dir.display(),
        "starting batch"
    );
    Ok(execute(provider, pool, &settings, specs).await)
}

/// Dispatch `specs` and save each artifact as its report arrives.
pub async fn execute(
    provider: Arc<dyn ImageProvider>,
    pool: Arc<CredentialPool>,
    settings: &RunSettings,
    specs: Vec<JobSpec>,
) -> BatchSummary {
    let invoker = RetryingInvoker::new(provider, pool, settings.quota_backoff);
    let dispatcher = Dispatcher::new(invoker, settings.max_workers, settings.pacing);

    let mut handle = dispatcher.spawn(specs);
    let mut jobs = Vec::with_capacity(handle.pending());
    while let Some(report) = handle.next_report().await {
        let result = match report.outcome {
            Outcome::Success(image) => {
                match save_artifact(&settings.out_dir, &report.target, &image).await {
                    Ok(path) => {
                        info!(artifact = %report.target, path = %path.display(), "artifact saved");
                        JobResult::Saved(path)
                    }
                    Err(e) => {
                        warn!(artifact = %report.target, error = %e, "failed to save artifact");
                        JobResult::Failed(format!("failed to write artifact: {e}"))
                    }
                }
            }
            Outcome::Failure(e) => JobResult::Failed(e.to_string()),
        };
        jobs.push(JobSummary {
            id: report.id,
            target: report.target,
            attempts: report.attempts,
            rotations: report.rotations,
            result,
        });
    }

    let summary = BatchSummary::new(jobs);
    info!(
        jobs = summary.jobs().len(),
        succeeded = summary.saved(),
        failed = summary.failed(),
        "batch finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::{ENV_MUTEX, lock_env, remove_env, set_env};
    use axum::body::Body;
    use axum::http::StatusCode;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    const PNG_BYTES: &[u8] = b"\x89PNG-batch";

    /// Mock generateContent endpoint counting every hit.
    ///
    /// Key "exhausted" always gets 429, prompts containing "reject" get 400,
    /// everything else gets one PNG.
    async fn start_mock_gemini() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let counter = hits.clone();
        tokio::spawn(async move {
            let app = axum::Router::new().fallback(
                move |request: axum::http::Request<Body>| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        let key = request
                            .headers()
                            .get("x-goog-api-key")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        let body_bytes =
                            axum::body::to_bytes(request.into_body(), 10 * 1024 * 1024)
                                .await
                                .unwrap();
                        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
                        let prompt = body["contents"][0]["parts"][0]["text"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();

                        if key == "exhausted" {
                            return (
                                StatusCode::TOO_MANY_REQUESTS,
                                axum::Json(serde_json::json!({
                                    "error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}
                                })),
                            );
                        }
                        if prompt.contains("reject") {
                            return (
                                StatusCode::BAD_REQUEST,
                                axum::Json(serde_json::json!({
                                    "error": {"code": 400, "status": "INVALID_ARGUMENT"}
                                })),
                            );
                        }
                        (
                            StatusCode::OK,
                            axum::Json(serde_json::json!({
                                "candidates": [{"content": {"parts": [
                                    {"inlineData": {"mimeType": "image/png", "data": STANDARD.encode(PNG_BYTES)}}
                                ]}}]
                            })),
                        )
                    }
                },
            );
            axum::serve(listener, app).await.unwrap();
        });

        (url, hits)
    }

    fn args() -> GenerateArgs {
        GenerateArgs {
            count: None,
            prompt: None,
            prompt_file: None,
            out: None,
            images: Vec::new(),
            max_workers: None,
        }
    }

    fn test_config(api_base: &str, dir: &tempfile::TempDir) -> Config {
        let mut config = Config::default();
        config.generation.api_base = api_base.to_string();
        config.dispatch.quota_backoff_secs = 0;
        config.dispatch.pacing_secs = 0;
        config.output.dir = dir.path().join("outputs");
        config.output.prompt_file = dir.path().join("prompt.json");
        config
    }

    fn write_prompts(dir: &tempfile::TempDir, json: &str) {
        std::fs::write(dir.path().join("prompt.json"), json).unwrap();
    }

    #[test]
    fn single_prompt_is_repeated_with_numbered_targets() {
        let mut a = args();
        a.prompt = Some("a pink bottle".into());
        a.count = Some(3);

        let specs = build_specs(&a, Path::new("unused.json"), &[]).unwrap();
        let targets: Vec<&str> = specs.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["image_001", "image_002", "image_003"]);
        assert!(specs.iter().all(|s| s.request.prompt == "a pink bottle"));
    }

    #[test]
    fn prompt_file_entries_become_unique_slug_targets() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(
            &dir,
            r#"{"prompts": [
                {"name": "Hero Shot", "text": "one"},
                {"name": "hero shot", "text": "two"},
                {"name": "", "text": "three"},
                {"name": "extra", "text": "four"}
            ]}"#,
        );
        let mut a = args();
        a.count = Some(3);

        let image = InlineImage::new("image/png", b"ref".to_vec());
        let specs = build_specs(&a, &dir.path().join("prompt.json"), &[image]).unwrap();
        let targets: Vec<&str> = specs.iter().map(|s| s.target.as_str()).collect();
        assert_eq!(targets, vec!["hero_shot", "hero_shot_2", "image_003"]);
        assert!(specs.iter().all(|s| s.request.images.len() == 1));
    }

    #[test]
    fn empty_prompt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(&dir, r#"{"prompts": []}"#);
        let err = build_specs(&args(), &dir.path().join("prompt.json"), &[]).unwrap_err();
        assert!(matches!(err, Error::NoPrompts(_)));
    }

    #[test]
    fn reference_image_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.JPEG");
        std::fs::write(&path, b"jpeg").unwrap();

        let image = load_reference_image(&path).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(&image.data[..], b"jpeg");
    }

    #[test]
    fn reference_image_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.gif");
        std::fs::write(&path, b"gif").unwrap();
        assert!(matches!(
            load_reference_image(&path).unwrap_err(),
            Error::UnsupportedImage(_)
        ));
    }

    #[test]
    fn reference_image_missing_file_rejected() {
        assert!(matches!(
            load_reference_image(Path::new("/nonexistent/product.png")).unwrap_err(),
            Error::ReferenceImage { .. }
        ));
    }

    #[tokio::test]
    async fn empty_key_list_fails_before_any_request() {
        let _lock = lock_env(&ENV_MUTEX);
        let (url, hits) = start_mock_gemini().await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&url, &dir);
        let mut a = args();
        a.prompt = Some("anything".into());

        unsafe { set_env(common::API_KEYS_ENV, "[]") };
        let result = run_generate(&config, &a).await;
        unsafe { remove_env(common::API_KEYS_ENV) };

        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("failed to load API keys"), "got: {err}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_rotates_past_exhausted_key_and_saves_files() {
        let _lock = lock_env(&ENV_MUTEX);
        let (url, hits) = start_mock_gemini().await;
        let dir = tempfile::tempdir().unwrap();
        write_prompts(
            &dir,
            r#"{"prompts": [
                {"name": "first", "text": "one"},
                {"name": "second", "text": "two"},
                {"name": "third", "text": "please reject"},
                {"name": "fourth", "text": "four"}
            ]}"#,
        );
        let config = test_config(&url, &dir);
        let mut a = args();
        a.max_workers = Some(1);

        // Submission hands out exhausted, good, good, exhausted; each
        // rotation then lands on a good key.
        unsafe { set_env(common::API_KEYS_ENV, r#"["exhausted", "good", "good"]"#) };
        let summary = run_generate(&config, &a).await.unwrap();
        unsafe { remove_env(common::API_KEYS_ENV) };

        assert_eq!(summary.jobs().len(), 4);
        assert_eq!(summary.saved(), 3);
        assert!(!summary.all_failed());

        let jobs = summary.jobs();
        assert_eq!((jobs[0].attempts, jobs[0].rotations), (2, 1));
        assert_eq!((jobs[1].attempts, jobs[1].rotations), (1, 0));
        assert_eq!(jobs[2].target, "third");
        assert!(matches!(&jobs[2].result, JobResult::Failed(r) if r.contains("non-retryable")));
        assert_eq!((jobs[3].attempts, jobs[3].rotations), (2, 1));

        let out = dir.path().join("outputs");
        for target in ["first", "second", "fourth"] {
            let bytes = std::fs::read(out.join(format!("{target}.png"))).unwrap();
            assert_eq!(bytes, PNG_BYTES);
        }
        assert!(!out.join("third.png").exists());
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn every_key_exhausted_fails_every_job() {
        let (url, hits) = start_mock_gemini().await;
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(CredentialPool::from_json(r#"["exhausted", "exhausted"]"#).unwrap());
        let provider: Arc<dyn ImageProvider> = Arc::new(GeminiProvider::new(
            reqwest::Client::new(),
            url,
            "test-model",
        ));
        let settings = RunSettings {
            max_workers: 2,
            quota_backoff: Duration::ZERO,
            pacing: Duration::ZERO,
            out_dir: dir.path().to_path_buf(),
        };
        let specs = vec![
            JobSpec::new("a", GenerationRequest::new("one")),
            JobSpec::new("b", GenerationRequest::new("two")),
        ];

        let summary = execute(provider, pool, &settings, specs).await;

        assert!(summary.all_failed());
        assert!(summary.jobs().iter().all(|j| j.attempts == 2));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(summary.render().contains("all credentials exhausted after 2 attempts"));
    }

    #[tokio::test]
    async fn unwritable_output_turns_success_into_failure() {
        let (url, _hits) = start_mock_gemini().await;
        let pool = Arc::new(CredentialPool::from_json(r#"["good"]"#).unwrap());
        let provider: Arc<dyn ImageProvider> = Arc::new(GeminiProvider::new(
            reqwest::Client::new(),
            url,
            "test-model",
        ));
        let settings = RunSettings {
            max_workers: 1,
            quota_backoff: Duration::ZERO,
            pacing: Duration::ZERO,
            out_dir: PathBuf::from("/nonexistent/outputs"),
        };

        let summary = execute(
            provider,
            pool,
            &settings,
            vec![JobSpec::new("a", GenerationRequest::new("one"))],
        )
        .await;

        assert!(summary.all_failed());
        assert!(
            matches!(&summary.jobs()[0].result, JobResult::Failed(r) if r.contains("failed to write artifact"))
        );
    }
}
