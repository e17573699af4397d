use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::ClientRegistry;

/// Outcome of one sweep pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub remaining: usize,
}

/// Start a background task that evicts idle clients every `interval` until
/// `shutdown` is cancelled. `on_sweep` runs after every pass.
pub fn start_sweeper<F>(
    registry: Arc<ClientRegistry>,
    interval: Duration,
    idle_threshold: Duration,
    shutdown: CancellationToken,
    on_sweep: F,
) -> JoinHandle<()>
where
    F: Fn(SweepReport) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::debug!("Idle client sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = registry.evict_idle(idle_threshold);
                    let report = SweepReport {
                        removed,
                        remaining: registry.len(),
                    };
                    if removed > 0 {
                        tracing::info!(
                            removed = report.removed,
                            remaining = report.remaining,
                            "Idle client sweep"
                        );
                    }
                    on_sweep(report);
                }
            }
        }
    })
}
