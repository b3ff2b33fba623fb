//! sysrev — hybrid data extraction and full-text screening for systematic reviews.
//! Entry point for the command-line binary.

mod cli;
mod commands;
mod config;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use sysrev_common::SysrevError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::{Config, Overrides};

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "sysrev=debug,info" } else { "sysrev=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Set on Ctrl-C: no new documents start, in-flight ones finish.
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing documents in flight");
            flag.store(true, Ordering::Relaxed);
        }
    });
    stop
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    match cli.command {
        Command::Fields => commands::fields(&config),
        Command::Extract(args) => {
            config.apply_overrides(&Overrides::from(&args));
            config.validate()?;
            info!(provider = %config.llm.provider, folder = %config.run.pdf_folder.display(), "Starting extraction");
            commands::extract(&config, stop_on_ctrl_c()).await
        }
        Command::Screen(args) => {
            config.apply_overrides(&Overrides::from(&args));
            config.validate()?;
            info!(provider = %config.llm.provider, folder = %config.run.pdf_folder.display(), "Starting screening");
            commands::screen(&config, stop_on_ctrl_c()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), "sysrev starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<SysrevError>() {
                Some(err) if err.is_fatal() => error!(error = %err, "Configuration error"),
                _ => error!(error = format!("{e:#}"), "Run failed"),
            }
            ExitCode::FAILURE
        }
    }
}
