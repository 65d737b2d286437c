//! Runs one GPT-SoVITS server per voice character until interrupted.

use clap::Parser;
use sovits_ops::supervisor::MonitorExit;
use sovits_ops::{SupervisorConfig, VoiceServiceManager};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Start, monitor and stop the per-character TTS services.
#[derive(Parser)]
#[command(name = "sovits-characters", version, about)]
struct Cli {
    /// Path to a TOML file overriding launch settings, timings or the roster.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sovits_ops=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => SupervisorConfig::from_file(path)?,
        None => SupervisorConfig::default(),
    };
    config.validate()?;

    let mut manager = VoiceServiceManager::new(config);
    if let Err(e) = manager.check_entry_script() {
        eprintln!("Error: {e}");
        return Ok(ExitCode::FAILURE);
    }

    print_banner(&manager);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        sovits_ops::signal::shutdown_signal().await;
        info!("received stop signal, shutting down...");
        cancel_clone.cancel();
    });

    let started = manager.start_all(&cancel).await;
    if started == 0 {
        eprintln!("Error: no character service started");
        manager.shutdown_all().await;
        return Ok(ExitCode::FAILURE);
    }

    println!();
    println!("{started} character service(s) running");
    print!("{}", manager.endpoint_directory());

    if manager.monitor(&cancel).await == MonitorExit::Cancelled {
        println!("\nStopping all services...");
    }

    let report = manager.shutdown_all().await;
    if !report.is_clean() {
        for (name, error) in &report.failed {
            eprintln!("Failed to stop {name}: {error}");
        }
    }
    println!("Goodbye");
    Ok(ExitCode::SUCCESS)
}

fn print_banner(manager: &VoiceServiceManager) {
    println!("GPT-SoVITS character services");
    println!("{}", "=".repeat(50));
    let bind = &manager.config().launch.bind_address;
    for profile in &manager.config().characters {
        println!("  {:<20} {}", profile.to_string(), profile.base_url(bind));
    }
    println!("{}", "=".repeat(50));
}
