//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are loaded from the GEMINI_API_KEYS env var (a JSON array, also
//! picked up from `.env`) or from `generation.api_keys_file`, never from the
//! TOML itself to avoid leaking secrets.

use common::Secret;
use dispatch::MAX_WORKERS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Config file used when neither `--config` nor CONFIG_PATH is given.
pub const DEFAULT_CONFIG_PATH: &str = "image-batch.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub dispatch: DispatchConfig,
    pub output: OutputConfig,
}

/// Remote generation API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub api_base: String,
    pub model: String,
    /// Per-call HTTP timeout; the dispatcher itself adds none
    pub timeout_secs: u64,
    /// File holding a JSON array of keys (alternative to GEMINI_API_KEYS)
    pub api_keys_file: Option<PathBuf>,
}

/// Worker pool and pacing settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_workers: usize,
    pub quota_backoff_secs: u64,
    pub pacing_secs: u64,
}

/// Where prompts come from and artifacts go
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub prompt_file: PathBuf,
    /// Prometheus textfile written at the end of a run
    pub metrics_textfile: Option<PathBuf>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: provider::gemini::DEFAULT_API_BASE.to_string(),
            model: provider::gemini::DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            api_keys_file: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            quota_backoff_secs: 5,
            pacing_secs: 6,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
            prompt_file: PathBuf::from("prompt.json"),
            metrics_textfile: None,
        }
    }
}

impl DispatchConfig {
    pub fn quota_backoff(&self) -> Duration {
        Duration::from_secs(self.quota_backoff_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise fall back to validated defaults.
    pub fn load_or_default(path: Option<&Path>) -> common::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let mut config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Resolve config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file if it exists. `None` means run on built-in defaults.
    pub fn resolve_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    }

    fn validate(&mut self) -> common::Result<()> {
        if !self.generation.api_base.starts_with("http://")
            && !self.generation.api_base.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api_base must start with http:// or https://, got: {}",
                self.generation.api_base
            )));
        }

        if self.generation.model.trim().is_empty() {
            return Err(common::Error::Config("model must not be empty".into()));
        }

        if self.generation.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.dispatch.max_workers == 0 {
            return Err(common::Error::Config(
                "max_workers must be greater than 0".into(),
            ));
        }

        if self.dispatch.max_workers > MAX_WORKERS {
            warn!(
                configured = self.dispatch.max_workers,
                cap = MAX_WORKERS,
                "max_workers above cap, clamping"
            );
            self.dispatch.max_workers = MAX_WORKERS;
        }

        Ok(())
    }

    /// Resolve API keys: GEMINI_API_KEYS env var takes precedence over
    /// `api_keys_file`. Missing, empty or malformed keys are a config error.
    pub fn resolve_api_keys(&self) -> common::Result<Vec<Secret<String>>> {
        if let Ok(raw) = std::env::var(common::API_KEYS_ENV) {
            return common::parse_api_keys(&raw);
        }
        if let Some(ref keys_file) = self.generation.api_keys_file {
            let raw = std::fs::read_to_string(keys_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_keys_file {}: {e}",
                    keys_file.display()
                ))
            })?;
            return common::parse_api_keys(&raw);
        }
        Err(common::Error::Config(format!(
            "no api keys configured: set {} to a JSON array or set generation.api_keys_file",
            common::API_KEYS_ENV
        )))
    }
}
