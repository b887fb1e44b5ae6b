use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kernel_replay::{replay_manifest, Config, LibompRuntime};

/// Replay a captured OpenMP offload kernel launch.
#[derive(Debug, Parser)]
#[command(name = "kernel-replay", version, about)]
struct Cli {
    /// Manifest JSON written when the kernel was captured
    manifest: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the replay report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let config = Config::load();
    tracing::debug!(?config, "Loaded configuration");

    let outcome = replay_manifest(
        &cli.manifest,
        || LibompRuntime::load(&config),
        io::stdout().lock(),
    )
    .with_context(|| format!("Replay of {} failed", cli.manifest.display()))?;

    tracing::info!(kernel = %outcome.kernel, "Replay finished");
    Ok(())
}
