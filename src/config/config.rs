//! Application configuration and CLI argument parsing.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audio::util::print_input_devices;
use crate::effects::print_effects;
use crate::session::SessionConfig;
use crate::session::latency::DEFAULT_SMOOTHING;

/// Where button presses come from and status goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Full-screen status with keyboard buttons (default)
    #[default]
    Terminal,
    /// No keyboard; periodic status lines in the log, stop with Ctrl+C
    Log,
}

impl std::fmt::Display for UiMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiMode::Terminal => write!(f, "terminal"),
            UiMode::Log => write!(f, "log"),
        }
    }
}

/// Loopback application configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "record-loopback")]
#[command(author, version, about = "Record and play back the same audio with drift-compensated latency", long_about = None)]
pub struct AppConfig {
    /// List all recording devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// List the effect buttons and exit
    #[arg(long)]
    pub list_effects: bool,

    /// Recording device index (see --list-devices)
    #[arg(long, short = 'd', env = "LOOPBACK_DEVICE", default_value = "0")]
    pub device: usize,

    /// Latency between recording and playback in milliseconds.
    /// Some devices need a higher latency to avoid glitches
    #[arg(long, short = 'l', env = "LOOPBACK_LATENCY_MS", default_value = "50")]
    pub latency_ms: u32,

    /// Drift tolerance in milliseconds before the playback rate is corrected
    #[arg(long, env = "LOOPBACK_DRIFT_MS", default_value = "1")]
    pub drift_ms: u32,

    /// Low-pass coefficient for the measured latency (0.0 - 1.0, exclusive)
    #[arg(long, default_value_t = DEFAULT_SMOOTHING, value_parser = parse_smoothing)]
    pub smoothing: f64,

    /// Session loop tick interval in milliseconds
    #[arg(long, default_value = "10")]
    pub tick_ms: u64,

    /// Control surface: 'terminal' for the interactive screen, 'log' for headless runs
    #[arg(long, value_enum, default_value = "terminal")]
    pub ui: UiMode,

    /// Interval between status lines in 'log' mode (ms)
    #[arg(long, default_value = "1000")]
    pub status_interval_ms: u64,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        let config = Self::parse();

        if config.list_effects {
            print_effects();
            std::process::exit(0);
        }

        if config.list_devices {
            match print_input_devices() {
                Ok(_) => std::process::exit(0),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Session parameters derived from the CLI.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig { device_index: self.device, latency_ms: self.latency_ms, drift_ms: self.drift_ms, smoothing: self.smoothing }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.latency_ms == 0 {
            anyhow::bail!("Latency must be at least 1ms");
        }

        if self.latency_ms > 1000 {
            anyhow::bail!("Latency must fit in the one second ring buffer (got {}ms)", self.latency_ms);
        }

        if self.drift_ms >= self.latency_ms {
            anyhow::bail!("Drift tolerance ({}ms) must be smaller than the latency ({}ms)", self.drift_ms, self.latency_ms);
        }

        if self.tick_ms == 0 {
            anyhow::bail!("Tick interval must be positive");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Recording device: {}", self.device);
        info!("  Latency: {}ms", self.latency_ms);
        info!("  Drift tolerance: {}ms", self.drift_ms);
        info!("  Smoothing: {}", self.smoothing);
        info!("  Tick: {}ms", self.tick_ms);
        info!("  UI: {}", self.ui);
        if matches!(self.ui, UiMode::Log) {
            info!("  Status interval: {}ms", self.status_interval_ms);
        }
    }
}

/// Parse and validate the smoothing coefficient (0.0 <= value < 1.0).
fn parse_smoothing(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a valid float", s))?;
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("smoothing must be in [0.0, 1.0), got {}", value))
    }
}
