//! Polling change watcher.
//!
//! Recomputes the fingerprint of a [`FileTree`] on a fixed interval and tells
//! the [`Reloader`] to broadcast whenever it changes. Polling works the same on
//! every filesystem, at the cost of up to one interval of latency.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::error::WatchError;
use crate::fingerprint::{FileTree, Fingerprint, fingerprint};
use crate::reloader::{Reloader, Shared};

/// How often the watcher rescans the tree.
pub const WATCH_INTERVAL: Duration = Duration::from_millis(500);

impl Reloader {
    /// Start watching `tree` for changes.
    ///
    /// Spawns a background task on the current tokio runtime that notifies
    /// subscribers whenever the tree's fingerprint changes. The task runs
    /// until [`close`](Self::close) is called or every handle to this
    /// reloader is dropped, and sends one final notification on the way
    /// out. Starting again replaces the previous watcher. Does nothing on a
    /// closed reloader.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self, tree: impl FileTree) {
        self.start_with_interval(tree, WATCH_INTERVAL);
    }

    pub(crate) fn start_with_interval(&self, tree: impl FileTree, period: Duration) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        match self.shared.replace_watcher(cancel_tx) {
            Ok(Some(previous)) => {
                let _ = previous.send(());
            }
            Ok(None) => {}
            Err(_) => {
                tracing::debug!(parent: &self.shared.span, "Live reload closed, not starting watcher");
                return;
            }
        }

        let span = self.shared.span.clone();
        tokio::spawn(
            watch(
                Arc::new(tree),
                Arc::downgrade(&self.shared),
                cancel_rx,
                period,
            )
            .instrument(span),
        );
    }
}

/// Watcher loop.
///
/// Holds only a weak reference to the reloader so an abandoned reloader
/// stops its watcher: dropping the shared state drops the cancel sender.
async fn watch(
    tree: Arc<dyn FileTree>,
    shared: Weak<Shared>,
    mut cancel: oneshot::Receiver<()>,
    period: Duration,
) {
    // A failed first scan leaves `last` empty, so the first successful scan
    // counts as a change.
    let mut last = match scan(&tree).await {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            tracing::error!(error = %e, "Live reload watcher failed to read directory");
            None
        }
    };

    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(interval = ?period, "Live reload watcher started");

    loop {
        tokio::select! {
            _ = &mut cancel => break,
            _ = interval.tick() => {
                let fingerprint = match scan(&tree).await {
                    Ok(fingerprint) => fingerprint,
                    Err(e) => {
                        tracing::error!(error = %e, "Live reload watcher failed to scan directory");
                        continue;
                    }
                };

                if last.as_ref() == Some(&fingerprint) {
                    continue;
                }

                tracing::info!(%fingerprint, "Directory changed, reloading clients");
                last = Some(fingerprint);

                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.notify();
            }
        }
    }

    // Wake any stream still waiting so it doesn't hang.
    if let Some(shared) = shared.upgrade() {
        shared.notify();
    }
    tracing::debug!("Live reload watcher stopped");
}

/// Fingerprint the tree on the blocking pool.
async fn scan(tree: &Arc<dyn FileTree>) -> Result<Fingerprint, WatchError> {
    let tree = Arc::clone(tree);
    tokio::task::spawn_blocking(move || fingerprint(tree.as_ref())).await?
}
