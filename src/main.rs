//! Record Loopback - play back the default recording device with a fixed latency.
//!
//! The recording device writes into a one second looping buffer while a playback
//! channel reads the same buffer a configurable distance behind. The playback rate
//! is nudged up or down so the two device clocks never drift apart, and eight
//! buttons switch between voice effects on the playback channel.

mod audio;
mod config;
mod effects;
mod error;
mod session;
mod ui;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use audio::CpalSystem;
use config::{AppConfig, UiMode};
use session::Session;
use ui::{LogSurface, TerminalSurface};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown(shutdown: CancellationToken) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        debug!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }

    shutdown.cancel();
}

/// Log level used when RUST_LOG is not set.
///
/// The terminal surface owns the screen and already shows disconnects and
/// pauses, so only errors reach stderr there.
fn default_log_level(verbose: bool, ui: UiMode) -> &'static str {
    match (verbose, ui) {
        (true, _) => "debug",
        (false, UiMode::Terminal) => "error",
        (false, UiMode::Log) => "info",
    }
}

/// Open the devices and drive the session loop until quit or shutdown.
///
/// Runs on a blocking thread: the cpal streams are created, used and dropped there.
fn run_session(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    let system = CpalSystem::new().context("Failed to open the audio host")?;
    let mut session = Session::start(system, config.session_config()).context("Failed to start recording")?;

    let result = match config.ui {
        UiMode::Terminal => {
            let mut surface = TerminalSurface::new()?;
            session.run(&mut surface, config.tick(), &shutdown)
        }
        UiMode::Log => {
            let mut surface = LogSurface::new(config.status_interval());
            session.run(&mut surface, config.tick(), &shutdown)
        }
    };

    // Release the devices even if the loop failed
    let stopped = session.shutdown().context("Failed to stop recording");
    result.and(stopped)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_level(config.verbose, config.ui)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🎙️  Record Loopback v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }
    config.log_config();

    let shutdown = CancellationToken::new();
    let session_shutdown = shutdown.clone();
    let mut session_handle = tokio::task::spawn_blocking(move || run_session(config, session_shutdown));

    // Either the session ends on its own (Quit button, fatal error) or a signal cancels it
    let joined = tokio::select! {
        joined = &mut session_handle => joined,
        _ = wait_for_shutdown(shutdown.clone()) => session_handle.await,
    };
    shutdown.cancel();

    match joined {
        Ok(Ok(())) => {
            info!("✅ Loopback stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("❌ {:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("❌ Session task failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_mode_logs_only_errors_by_default() {
        assert_eq!(default_log_level(false, UiMode::Terminal), "error");
        assert_eq!(default_log_level(false, UiMode::Log), "info");
        assert_eq!(default_log_level(true, UiMode::Terminal), "debug");
    }
}
