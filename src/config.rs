//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

/// Default poll interval while a phase is running
pub const DEFAULT_HEARTBEAT_SECS: u64 = 20;

/// Runtime knobs of the timer core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub heartbeat_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
        }
    }
}

/// CLI argument parsing structure for the development host
#[derive(Parser)]
#[command(name = "stay-hydrated-host")]
#[command(about = "Development host that drives the stay-hydrated timer over HTTP")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// JSON file backing the local and sync storage areas
    #[arg(short, long, default_value = "stay-hydrated.json")]
    pub storage: PathBuf,

    /// Heartbeat poll interval in seconds
    #[arg(long, default_value_t = DEFAULT_HEARTBEAT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_twenty_second_heartbeat() {
        let config = Config::try_parse_from(["stay-hydrated-host"]).unwrap();
        assert_eq!(config.timer_config(), TimerConfig::default());
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        assert!(Config::try_parse_from(["stay-hydrated-host", "--heartbeat-secs", "0"]).is_err());
    }

    #[test]
    fn verbose_switches_to_debug() {
        let config = Config::try_parse_from(["stay-hydrated-host", "-v", "-s", "/tmp/x.json"]).unwrap();
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.storage, PathBuf::from("/tmp/x.json"));
    }
}
