//! Daemon assembly and lifecycle management.
//!
//! The [`Daemon`] loads configuration, installs the metrics recorder,
//! builds the tailing pipeline with its configured sink and drives it
//! with the [`scheduler`](crate::scheduler).
//!
//! # Lifecycle
//!
//! 1. Load `tailmetric.toml` and apply environment overrides
//! 2. Validate the configuration
//! 3. Install the Prometheus recorder (when enabled)
//! 4. Build the pipeline (opens or creates the position file)
//! 5. Write the PID file, run cycles until SIGTERM/SIGINT, remove the PID file

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use tailmetric_core::config::TailmetricConfig;
use tailmetric_log_pipeline::{CycleReport, MetricSender, PipelineConfig, TailPipeline, TailPipelineBuilder};

use crate::metrics_server;
use crate::scheduler;

/// Uptime gauge refresh period.
const UPTIME_REFRESH: Duration = Duration::from_secs(10);

/// The tailmetric daemon.
pub struct Daemon {
    /// Loaded and validated configuration.
    config: TailmetricConfig,
    /// The single pipeline owned by this process.
    pipeline: TailPipeline<MetricSender>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Daemon {
    /// Load configuration from `config_path` and build the daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The position file cannot be created
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = TailmetricConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: TailmetricConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let pipeline = TailPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .sink_from_config()
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("failed to build pipeline: {}", e))?;

        tracing::info!(
            source = config.collector.source.as_str(),
            parser = config.collector.parser.as_str(),
            sender = config.sender.kind.as_str(),
            endpoint = %pipeline.sink().endpoint(),
            interval_secs = config.collector.checking_interval_secs,
            "daemon initialized"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Run a single cycle and return its report.
    ///
    /// The PID file is held for the duration of the cycle so that
    /// overlapping cron invocations are refused.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        let pid_file = self.pid_file().map(Path::to_path_buf);
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        let report = self.pipeline.run_cycle().await;

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }
        Ok(report)
    }

    /// Run until SIGTERM or SIGINT is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the PID file cannot be written or signal
    /// handlers cannot be installed.
    pub async fn run(&mut self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let signal_task = spawn_signal_watcher(shutdown.clone())?;

        let result = self.run_until(shutdown.clone()).await;

        signal_task.abort();
        result.map(|_| ())
    }

    /// Run cycles until `shutdown` is cancelled.
    ///
    /// Returns the number of cycles executed.
    pub async fn run_until(&mut self, shutdown: CancellationToken) -> Result<u64> {
        let pid_file = self.pid_file().map(Path::to_path_buf);
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, shutdown.clone()));

        let period = Duration::from_secs(self.config.collector.checking_interval_secs);
        tracing::info!("entering main loop");
        let cycles = scheduler::run_until_cancelled(&mut self.pipeline, period, shutdown.clone()).await;

        // the scheduler only returns once the token is cancelled
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }

        tracing::info!(
            cycles,
            uptime_secs = self.start_time.elapsed().as_secs(),
            watermark = self.pipeline.position().last_line,
            "daemon stopped"
        );
        Ok(cycles)
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &TailmetricConfig {
        &self.config
    }

    /// Get a reference to the pipeline.
    pub fn pipeline(&self) -> &TailPipeline<MetricSender> {
        &self.pipeline
    }

    fn pid_file(&self) -> Option<&Path> {
        let raw = self.config.general.pid_file.as_str();
        (!raw.is_empty()).then(|| Path::new(raw))
    }
}

/// Install SIGTERM/SIGINT handlers and cancel `shutdown` when one fires.
///
/// Handlers are installed before this function returns, so a signal
/// delivered right after startup is not lost.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn spawn_signal_watcher(shutdown: CancellationToken) -> Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = name, "shutdown signal received, finishing current cycle");
        shutdown.cancel();
    }))
}

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create file (prevents TOCTOU races)
/// - Verifies the created file is a regular file (prevents symlink attacks)
/// - Creates parent directory with restrictive permissions (0o700)
///
/// # Errors
///
/// Returns an error if the PID file cannot be written.
fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use tailmetric_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_REFRESH);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_pid_file_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("run").join("tailmetric.pid");

        write_pid_file(&pid_file).expect("should create parent directory");

        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn write_pid_file_refuses_second_instance() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("tailmetric.pid");
        fs::write(&pid_file, "12345").unwrap();

        let err = write_pid_file(&pid_file).unwrap_err().to_string();
        assert!(err.contains("already exists"), "got: {err}");
        assert!(err.contains("12345"), "got: {err}");
    }

    #[test]
    fn remove_pid_file_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("gone.pid");
        remove_pid_file(&pid_file);
        assert!(!pid_file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn pid_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("tailmetric.pid");
        write_pid_file(&pid_file).unwrap();

        let mode = fs::metadata(&pid_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn uptime_updater_stops_on_cancel() {
        let token = CancellationToken::new();
        let task = spawn_uptime_updater(Instant::now(), token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("updater should stop")
            .unwrap();
    }
}
