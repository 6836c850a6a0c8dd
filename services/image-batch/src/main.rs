//! Gemini batch image generator
//!
//! Single-binary Rust tool that:
//! 1. Loads a pool of API keys from GEMINI_API_KEYS or a keys file
//! 2. Fans prompts out over at most 10 workers
//! 3. Rotates to the next key when one runs out of quota
//! 4. Saves every generated image and reports what failed and why

mod batch;
mod cli;
mod config;
mod error;
mod metrics;
mod output;
mod prompts;
mod report;
#[cfg(test)]
mod test_env;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Instrument, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::report::BatchSummary;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // .env is optional; real env vars win over it
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let run_id = Uuid::new_v4();
    run(cli).instrument(info_span!("run", %run_id)).await
}

/// Tracing with LOG_LEVEL / RUST_LOG support, human or JSON lines on stderr.
///
/// stdout is reserved for the final report.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting image-batch");

    let config_path = Config::resolve_path(cli.config.as_deref());
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file found, using defaults"),
    }
    let config = Config::load_or_default(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "invalid default configuration".to_string(),
    })?;

    match cli.command {
        Command::Generate(args) => {
            // Installed before any job runs so every attempt is recorded
            let prometheus = metrics::install_recorder()?;

            let summary = batch::run_generate(&config, &args).await?;
            println!("{}", summary.render());

            if let Some(ref path) = config.output.metrics_textfile {
                match metrics::write_textfile(&prometheus, path) {
                    Ok(()) => info!(path = %path.display(), "metrics written"),
                    Err(e) => warn!(error = %format!("{e:#}"), "failed to write metrics textfile"),
                }
            }

            Ok(ExitCode::from(exit_status(&summary)))
        }
        Command::ExpandPrompts(args) => {
            let path = args
                .prompt_file
                .unwrap_or_else(|| config.output.prompt_file.clone());
            let added = prompts::run_expand(&path, args.target_total, args.seed)
                .with_context(|| format!("failed to expand {}", path.display()))?;
            println!("Added {added} prompts to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 1 when there were jobs and every one failed, otherwise 0.
fn exit_status(summary: &BatchSummary) -> u8 {
    u8::from(summary.all_failed())
}
