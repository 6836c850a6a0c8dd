//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::prompts::{DEFAULT_SEED, DEFAULT_TARGET_TOTAL};

/// Batch image generation against the Gemini API with key rotation
#[derive(Debug, Parser)]
#[command(name = "image-batch", version)]
#[command(about = "Generates images in bulk, rotating API keys on quota exhaustion")]
pub struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./image-batch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate one image per job
    Generate(GenerateArgs),
    /// Grow the prompt file to a target size with seeded, generated prompts
    ExpandPrompts(ExpandArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Number of jobs (with --prompt: copies; otherwise: first N prompt file entries)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Single prompt used for every job instead of the prompt file
    #[arg(short, long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Prompt file (overrides output.prompt_file)
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Output directory (overrides output.dir)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Reference image attached to every request (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<PathBuf>,

    /// Concurrent workers (overrides dispatch.max_workers, capped at 10)
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_workers: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ExpandArgs {
    /// Prompt file to expand in place (overrides output.prompt_file)
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Desired number of prompts after expansion
    #[arg(long, default_value_t = DEFAULT_TARGET_TOTAL)]
    pub target_total: usize,

    /// RNG seed for prompt text
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}
