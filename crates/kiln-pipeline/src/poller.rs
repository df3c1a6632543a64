//! Fixed-interval polling loop around incremental cycles.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::pipeline::{Pipeline, PipelineError};

/// Drives [`Pipeline::run_incremental`] on a fixed interval until ctrl-c.
pub struct Poller {
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run cycles until shutdown. A failing cycle is logged and the loop
    /// carries on at the next tick.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<(), PipelineError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match pipeline.run_incremental().await {
                        Ok(report) if report.rendered > 0 || report.pruned > 0 => {
                            tracing::info!(
                                "cycle: {} rendered, {} failed, {} pruned in {}ms",
                                report.rendered,
                                report.failed,
                                report.pruned,
                                report.duration_ms
                            );
                        }
                        Ok(report) => {
                            tracing::debug!(
                                "cycle idle ({} items fetched in {}ms)",
                                report.fetched,
                                report.duration_ms
                            );
                        }
                        Err(e) => {
                            tracing::error!("cycle failed: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    return Ok(());
                }
            }
        }
    }
}
