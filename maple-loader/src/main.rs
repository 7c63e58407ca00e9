mod cli;
mod config;
mod progress;
mod serial;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, merge_config};
use maple_loader_lib::UploadOrchestrator;
use maple_loader_lib::progress::no_op_progress_callback;
use progress::create_progress_callback;
use serial::check_port_available;
use std::process;

fn main() {
    // Initialize tracing, set log level from environment variable
    // Log level can be controlled by setting the RUST_LOG environment variable, e.g.:
    // RUST_LOG=debug, RUST_LOG=maple_loader_lib=trace, RUST_LOG=info
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Cli::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: &Cli) -> Result<()> {
    let prefs = merge_config(args)?;
    let config = prefs
        .to_upload_config(&args.image)
        .context("Invalid upload settings")?;

    // A board that is already in its bootloader has no serial port, so only warn.
    if config.auto_reset()
        && let Err(e) = check_port_available(&config.port_name)
    {
        eprintln!("Warning: {:#}", e);
    }

    let callback = if args.quiet {
        no_op_progress_callback()
    } else {
        create_progress_callback()
    };

    let result = UploadOrchestrator::new(callback).upload(config);
    if !result.is_success() {
        bail!("{}", result);
    }
    Ok(())
}
