//! Periodic cycle scheduling.
//!
//! Runs one pipeline cycle immediately and then once per checking interval
//! until the shutdown token is cancelled. A cycle that is already running
//! when shutdown is requested always completes; cancellation is only
//! observed between cycles.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use tailmetric_core::pipeline::MetricSink;
use tailmetric_log_pipeline::TailPipeline;

/// Drive `pipeline` every `period` until `shutdown` is cancelled.
///
/// Ticks missed because a cycle overran its period are skipped rather
/// than replayed, so cycles never overlap or burst.
///
/// Returns the number of cycles executed by this call.
pub async fn run_until_cancelled<S: MetricSink>(
    pipeline: &mut TailPipeline<S>,
    period: Duration,
    shutdown: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycles = 0u64;

    tracing::info!(period_secs = period.as_secs(), "scheduler started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("scheduler received shutdown");
                break;
            }
            _ = ticker.tick() => {
                let report = pipeline.run_cycle().await;
                cycles += 1;

                if report.select_failed {
                    tracing::warn!(cycle = pipeline.cycle_count(), "cycle could not list candidate files");
                }
                if report.files_stalled > 0 {
                    tracing::warn!(
                        cycle = pipeline.cycle_count(),
                        stalled = report.files_stalled,
                        send_failures = report.send_failures,
                        "position held back by failed sends, lines will be retried"
                    );
                }
            }
        }
    }

    tracing::info!(cycles, "scheduler stopped");
    cycles
}
