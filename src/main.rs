use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;

mod channel;
mod cli;
mod commands;
mod config;
mod error;
mod event;
mod notifier;
mod record;
mod session;
mod shutdown;
mod transport;

use cli::{Cli, Commands};
use config::{Config, LogLevel};

fn setup_logging(config: &Config, verbose: bool, quiet: bool) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    // RUST_LOG env var takes precedence, then CLI flags, then config log_level
    let from_env = std::env::var("RUST_LOG").is_ok();
    let level = if verbose {
        LogLevel::Debug
    } else if quiet {
        LogLevel::Error
    } else {
        config.log_level
    };
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level.as_filter());
    }

    // stdout carries the supervisor protocol, diagnostics never go there
    match config.log_file {
        Some(ref path) => {
            let log_file = Config::expand_path(path);
            if let Some(parent) = log_file.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let target = Box::new(
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
                    .context("Failed to open log file")?,
            );
            builder.target(env_logger::Target::Pipe(target)).init();
            info!("Logging initialized, writing to: {}", log_file.display());
        }
        None => {
            builder.target(env_logger::Target::Stderr).init();
        }
    }

    info!(
        "Log level: {} (from {})",
        if from_env { "RUST_LOG".to_string() } else { level.as_filter().to_string() },
        if from_env { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Listen(args) => commands::listen::run(args, &config),
        Commands::Config { action } => commands::config::run(action, &config),
        Commands::SendTest { process, event } => commands::send_test::run(&process, &event, &config),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments first
    let cli = Cli::parse();

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config, cli.verbose, cli.quiet).context("Failed to setup logging")?;

    info!("Starting logstash-notifier with config from: {:?}", cli.config);

    run(cli, config).context("Command failed")?;

    Ok(())
}
