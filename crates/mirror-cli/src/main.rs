//! mirror-sync daemon
//!
//! Keeps a local directory mirrored to a branch or tag of a remote git
//! repository. Startup runs the initialization tick; if that succeeds the
//! update loop and the health endpoint run until a fatal error or a
//! shutdown signal.

mod cli;
mod error;
mod health;

use clap::Parser;
use colored::Colorize;
use mirror_core::{DriverRegistry, Phase, Scheduler, SyncConfiguration};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use error::Result;

const DEFAULT_FILTER: &str = "mirror_sync=info,mirror_core=info,mirror_git=info";
const VERBOSE_FILTER: &str = "mirror_sync=debug,mirror_core=debug,mirror_git=debug";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    eprintln!(
        "{} {}",
        "mirror-sync".green().bold(),
        env!("CARGO_PKG_VERSION")
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(cli))
}

async fn serve(cli: Cli) -> Result<()> {
    let config = cli.to_config()?;
    log_config(&config);

    mirror_fs::ensure_dir(config.destination())?;
    let driver = DriverRegistry::default().configure(&config)?;
    let scheduler = Scheduler::new(driver, config);

    scheduler.step(Phase::Initialize).await?;
    if cli.once {
        tracing::info!("Initialization finished, exiting");
        return Ok(());
    }

    tokio::select! {
        result = scheduler.run() => result?,
        result = health::serve(cli.port) => result?,
        () = shutdown_signal() => {}
    }
    Ok(())
}

fn log_config(config: &SyncConfiguration) {
    tracing::info!(
        source = config.source(),
        dest = %config.destination(),
        kind = %config.kind(),
        reference = %config.reference(),
        remote = config.upstream_remote(),
        interval = ?config.poll_interval(),
        reset_on_drift = config.reset_on_drift(),
        operation_timeout = ?config.operation_timeout(),
        ssh_key = config.key().map(|k| k.key_path.as_str()).unwrap_or("<agent>"),
        "Loaded configuration"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
