//! Periodic status reporter — the in-process observer of the run state.
//!
//! Reads snapshots on an interval and logs a one-line progress report.
//! Exits on completion or cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use blobsync_state::StateTracker;

pub fn spawn(
    state: Arc<StateTracker>,
    refresh: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let s = state.snapshot();
                    if s.is_enumerating {
                        info!(status = %s.enumeration_status, "enumerating");
                        continue;
                    }
                    let current = s
                        .current_file
                        .as_ref()
                        .map(|f| f.path.display().to_string())
                        .unwrap_or_default();
                    info!(
                        processed = s.processed(),
                        total = s.total_discovered,
                        succeeded = s.succeeded,
                        skipped = s.skipped,
                        failed = s.failed,
                        current = %current,
                        "progress"
                    );
                    if s.is_completed {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
