// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use debsync::cancel::{CancelToken, watch_for_interrupt};
use debsync::config::{MirrorSourceSet, load_sources};
use debsync::sync::Mirror;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = cli.settings()?;
    let sources = load_sources(&cli.sources, &settings.architectures)
        .with_context(|| format!("Failed to read sources list {}", cli.sources.display()))?;
    let sources = MirrorSourceSet::resolve(sources).context("Invalid sources list")?;

    info!(
        "Mirroring {} into {}",
        cli.sources.display(),
        settings.mirror_root.display()
    );

    let cancel = CancelToken::new();
    let watcher = tokio::spawn(watch_for_interrupt(cancel.clone()));

    let mirror = Mirror::new(&settings, cancel.clone());
    let mut summary = tokio::task::spawn_blocking(move || mirror.run(&sources))
        .await
        .context("Mirror worker panicked")??;
    watcher.abort();

    // An interrupt that lands after the last group finished still counts
    summary.interrupted |= cancel.is_cancelled();

    print!("{summary}");
    Ok(summary.exit_code())
}
