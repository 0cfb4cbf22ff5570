//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `monitor.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     the command-line overrides (--period, --scale, --log), parsed by clap.
//!
//! structure:
//!     - SamplingConfig: initial period and temperature scale.
//!     - LogConfig: optional log file and diagnostic level.
//!     - ButtonConfig: button poll cadence.
//!     - HardwareConfig: i2c adc address/channel and button gpio (feature "hardware").
//!     - SimulationConfig: the raw sample the simulated sensor returns.
//!
//! ==============================================================================

use crate::button::DEFAULT_POLL_INTERVAL;
use crate::domain::Scale;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    pub period_seconds: u64,
    pub scale: Scale,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { period_seconds: 1, scale: Scale::Fahrenheit }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { path: None, level: "info".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ButtonConfig {
    pub poll_interval_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self { poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HardwareConfig {
    pub adc_i2c_address: u16,
    pub adc_channel: u8,
    pub button_pin: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self { adc_i2c_address: 0x08, adc_channel: 0, button_pin: 5 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    pub raw_sample: u16,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { raw_sample: 512 }
    }
}

/// options given on the command line; each one overrides the file
#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(name = "thermo-monitor", version, about = "Periodic thermistor reporter with a text command protocol")]
pub struct CliOverrides {
    /// sample period, in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub period: Option<u64>,

    /// temperature scale, C or F
    #[arg(short, long)]
    pub scale: Option<Scale>,

    /// append every record and received command to this file
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// path to monitor.toml
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    ///
    /// an explicitly named file must load; the well-known locations are best effort.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path).with_context(|| format!("config {}", path.display()));
        }

        let paths = [
            PathBuf::from("config").join("monitor.toml"),
            PathBuf::from("..").join("config").join("monitor.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::warn!("[CONFIG] No config file found - using defaults");
        Ok(Self::default())
    }

    /// fold command-line options into the loaded file
    pub fn apply(&mut self, cli: &CliOverrides) {
        if let Some(period) = cli.period {
            self.sampling.period_seconds = period;
        }
        if let Some(scale) = cli.scale {
            self.sampling.scale = scale;
        }
        if let Some(log) = &cli.log {
            self.log.path = Some(log.clone());
        }
    }

    /// initial sample period; zero is rejected
    pub fn period(&self) -> Result<NonZeroU64> {
        NonZeroU64::new(self.sampling.period_seconds)
            .ok_or_else(|| anyhow!("period must be a positive number of seconds"))
    }

    pub fn button_poll_interval(&self) -> Result<Duration> {
        if self.button.poll_interval_ms == 0 {
            bail!("button poll interval must be positive");
        }
        Ok(Duration::from_millis(self.button.poll_interval_ms))
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│         MONITOR CONFIGURATION           │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Period: {}s", self.sampling.period_seconds);
        tracing::info!("│ Scale: {}", self.sampling.scale);
        match &self.log.path {
            Some(p) => tracing::info!("│ Log File: {}", p.display()),
            None => tracing::info!("│ Log File: (none)"),
        }
        tracing::info!("│ Button Poll: {}ms", self.button.poll_interval_ms);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Result<CliOverrides, clap::Error> {
        CliOverrides::try_parse_from(std::iter::once("thermo-monitor").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_are_one_second_fahrenheit_no_log() {
        let c = MonitorConfig::default();
        assert_eq!(c.period().unwrap().get(), 1);
        assert_eq!(c.sampling.scale, Scale::Fahrenheit);
        assert!(c.log.path.is_none());
        assert_eq!(c.button_poll_interval().unwrap(), Duration::from_millis(10));
    }

    #[test]
    fn parses_partial_toml() {
        let c: MonitorConfig = toml::from_str(
            r#"
            [sampling]
            period_seconds = 5
            scale = "C"

            [log]
            path = "/tmp/monitor.log"
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(c.period().unwrap().get(), 5);
        assert_eq!(c.sampling.scale, Scale::Celsius);
        assert_eq!(c.log.path.as_deref(), Some(Path::new("/tmp/monitor.log")));
        assert_eq!(c.button.poll_interval_ms, 10);
        assert_eq!(c.simulation.raw_sample, 512);
    }

    #[test]
    fn rejects_unknown_scale_in_toml() {
        let r: Result<MonitorConfig, _> = toml::from_str("[sampling]\nperiod_seconds = 1\nscale = \"K\"\n");
        assert!(r.is_err());
    }

    #[test]
    fn cli_accepts_both_option_forms() {
        let cli = cli(&["--period=3", "--scale", "C", "--log=out.txt", "-c", "m.toml"]).unwrap();
        assert_eq!(cli.period, Some(3));
        assert_eq!(cli.scale, Some(Scale::Celsius));
        assert_eq!(cli.log, Some(PathBuf::from("out.txt")));
        assert_eq!(cli.config, Some(PathBuf::from("m.toml")));
    }

    #[test]
    fn cli_scale_is_case_insensitive() {
        assert_eq!(cli(&["-s", "f"]).unwrap().scale, Some(Scale::Fahrenheit));
    }

    #[test]
    fn cli_rejects_unknown_option_with_usage() {
        let err = cli(&["--bogus"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
        assert!(err.use_stderr());
        assert!(err.to_string().contains("Usage:"));
    }

    #[test]
    fn cli_rejects_missing_value() {
        assert!(cli(&["--period"]).is_err());
    }

    #[test]
    fn cli_rejects_zero_negative_and_garbage_periods() {
        for bad in ["--period=0", "--period=-2", "--period=5s", "--period=abc"] {
            assert!(cli(&[bad]).is_err(), "{}", bad);
        }
    }

    #[test]
    fn cli_rejects_unknown_scale() {
        assert!(cli(&["--scale=K"]).is_err());
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = cli(&["--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut c = MonitorConfig::default();
        c.apply(&cli(&["--period=10", "--scale=C", "--log=x.log"]).unwrap());
        assert_eq!(c.period().unwrap().get(), 10);
        assert_eq!(c.sampling.scale, Scale::Celsius);
        assert_eq!(c.log.path, Some(PathBuf::from("x.log")));
    }

    #[test]
    fn absent_overrides_keep_file_values() {
        let mut c: MonitorConfig = toml::from_str("[sampling]\nperiod_seconds = 4\nscale = \"C\"\n").unwrap();
        c.apply(&cli(&[]).unwrap());
        assert_eq!(c.period().unwrap().get(), 4);
        assert_eq!(c.sampling.scale, Scale::Celsius);
    }

    #[test]
    fn zero_period_in_file_is_rejected() {
        let c: MonitorConfig = toml::from_str("[sampling]\nperiod_seconds = 0\nscale = \"F\"\n").unwrap();
        assert!(c.period().is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let missing = std::env::temp_dir().join("thermo-monitor-missing.toml");
        assert!(MonitorConfig::load_or_default(Some(&missing)).is_err());
    }
}
