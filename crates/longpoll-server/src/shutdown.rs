//! Server-wide stop signal.
//!
//! One token is shared by the HTTP server (graceful drain), every waiting
//! poll (released with 204) and the idle sweeper.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to the server, the poll handlers and the sweeper.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Signal stop, then give `tasks` up to `drain` to exit. Anything still
    /// running afterwards is aborted.
    pub async fn graceful_shutdown(&self, tasks: Vec<JoinHandle<()>>, drain: Duration) {
        self.shutdown();
        info!(
            tasks = tasks.len(),
            drain_ms = drain.as_millis() as u64,
            "Draining server tasks"
        );

        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(drain, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!(drain_ms = drain.as_millis() as u64, "Drain timed out, aborting tasks");
            aborts.iter().for_each(|task| task.abort());
        }
    }
}
