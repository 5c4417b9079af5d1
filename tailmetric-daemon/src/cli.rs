//! CLI argument definitions for tailmetric-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use tailmetric_core::config::TailmetricConfig;

/// Log tailing metric collector.
///
/// Periodically reads new lines from the configured log files, extracts
/// metrics and delivers them to a message broker topic or a TCP socket.
#[derive(Parser, Debug)]
#[command(name = "tailmetric-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to tailmetric.toml configuration file.
    #[arg(short, long, default_value = "/etc/tailmetric/tailmetric.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate configuration, print the effective configuration as JSON and exit.
    #[arg(long)]
    pub validate: bool,

    /// Run a single cycle and exit (for cron-driven deployments).
    #[arg(long, conflicts_with = "validate")]
    pub once: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut TailmetricConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.to_lowercase();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.to_lowercase();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["tailmetric-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/tailmetric/tailmetric.toml"));
        assert!(!cli.validate);
        assert!(!cli.once);
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cli = DaemonCli::try_parse_from([
            "tailmetric-daemon",
            "--log-level",
            "DEBUG",
            "--log-format",
            "pretty",
            "--pid-file",
            "/tmp/t.pid",
        ])
        .unwrap();

        let mut config = TailmetricConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.pid_file, "/tmp/t.pid");
    }

    #[test]
    fn once_conflicts_with_validate() {
        let result = DaemonCli::try_parse_from(["tailmetric-daemon", "--once", "--validate"]);
        assert!(result.is_err());
    }
}
