//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Cancelling the token stops the listener from accepting connections. Open
//! channels then get the drain timeout to finish; whatever is still running
//! afterwards is aborted.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Coordinates shutdown of the HTTP listener and its open channels.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Coordinator with a fresh token.
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout,
        }
    }

    /// Clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Time open channels get after shutdown.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Wait up to the drain timeout for `task`, then abort it. Returns the
    /// task's output if it finished in time.
    pub async fn drain<T>(&self, mut task: JoinHandle<T>) -> Option<T> {
        info!(timeout_ms = self.drain_timeout.as_millis(), "draining open channels");
        match tokio::time::timeout(self.drain_timeout, &mut task).await {
            Ok(Ok(output)) => Some(output),
            Ok(Err(e)) => {
                warn!(error = %e, "task failed while draining");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.drain_timeout, "drain timed out, aborting open channels");
                task.abort();
                None
            }
        }
    }
}
