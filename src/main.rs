//! scenelink command-line entry point.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use scenelink::cli::{self, Cli, Commands};
use scenelink::config::SceneConfig;
use scenelink::{core, debug};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = SceneConfig::load(&cli)?;
    if let Some(path) = &config.config_path {
        debug!("config"; "loaded {}", path.display());
    }

    match &cli.command {
        Commands::Host { .. } => cli::host::run_host(&config),
        Commands::Resolve { args } => cli::resolve::run_resolve(args),
    }
}
