use anyhow::Result;
use clap::Parser;

use tailmetric_core::config::TailmetricConfig;
use tailmetric_daemon::cli::DaemonCli;
use tailmetric_daemon::logging;
use tailmetric_daemon::orchestrator::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TailmetricConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        let mut shown = config.clone();
        if !shown.sender.password.is_empty() {
            shown.sender.password = "********".to_owned();
        }
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "tailmetric-daemon starting"
    );

    let mut daemon = Daemon::build_from_config(config).await?;

    if cli.once {
        let report = daemon.run_once().await?;
        tracing::info!(
            lines_read = report.lines_read,
            metrics_sent = report.metrics_sent,
            send_failures = report.send_failures,
            watermark = daemon.pipeline().position().last_line,
            "single cycle finished"
        );
    } else {
        daemon.run().await?;
    }

    tracing::info!("tailmetric-daemon shut down");
    Ok(())
}
