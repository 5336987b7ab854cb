//! Reload notifier.
//!
//! Tracks subscribed listeners and fans reload signals out to them without
//! blocking on slow readers. Every subscriber gets a single-slot channel:
//! signals sent while one is already pending are dropped, since the reader
//! reloads the whole page either way.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

/// Route the stream handler is mounted at unless configured otherwise.
pub const DEFAULT_ROUTE: &str = "/dev/reload";

/// Default maximum age for cached assets.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Reloader configuration.
#[derive(Clone, Debug)]
pub struct ReloadConfig {
    /// Span the reloader and its watcher log under.
    pub span: tracing::Span,
    /// HTTP route where the stream handler is mounted.
    pub route: String,
    /// Whether live reload starts out enabled.
    pub enabled: bool,
    /// Maximum age for cached assets while live reload is enabled.
    /// Truncated to whole seconds.
    pub max_age: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            span: tracing::Span::none(),
            route: DEFAULT_ROUTE.to_owned(),
            enabled: false,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

/// Mutable state guarded by the reloader lock.
struct State {
    closed: bool,
    next_id: u64,
    clients: HashMap<u64, mpsc::Sender<()>>,
    enabled: bool,
    watch_cancel: Option<oneshot::Sender<()>>,
}

/// State shared between reloader handles, subscriptions and the watcher task.
pub(crate) struct Shared {
    state: Mutex<State>,
    route: String,
    max_age_secs: u64,
    pub(crate) span: tracing::Span,
}

impl Shared {
    /// Lock the state. Every critical section leaves it consistent, so a
    /// poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify(&self) {
        let state = self.lock();
        if state.closed {
            return;
        }

        for tx in state.clients.values() {
            // Full: a signal is already pending. Closed: mid-release.
            let _ = tx.try_send(());
        }

        tracing::debug!(
            parent: &self.span,
            subscribers = state.clients.len(),
            "Broadcast reload signal"
        );
    }

    fn release(&self, id: u64) {
        self.lock().clients.remove(&id);
    }

    /// Install a new watcher cancellation handle.
    ///
    /// Returns the previous handle, or gives `cancel` back when the reloader
    /// is closed and must not start watching.
    pub(crate) fn replace_watcher(
        &self,
        cancel: oneshot::Sender<()>,
    ) -> Result<Option<oneshot::Sender<()>>, oneshot::Sender<()>> {
        let mut state = self.lock();
        if state.closed {
            return Err(cancel);
        }
        Ok(state.watch_cancel.replace(cancel))
    }
}

/// Live reload notifier.
///
/// Cheap to clone; all clones share the same subscribers and flags.
#[derive(Clone)]
pub struct Reloader {
    pub(crate) shared: Arc<Shared>,
}

impl Reloader {
    /// Create a reloader in the open state with no subscribers.
    #[must_use]
    pub fn new(config: ReloadConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    closed: false,
                    next_id: 0,
                    clients: HashMap::new(),
                    enabled: config.enabled,
                    watch_cancel: None,
                }),
                route: config.route,
                max_age_secs: config.max_age.as_secs(),
                span: config.span,
            }),
        }
    }

    /// Register a new listener.
    ///
    /// The returned [`Subscription`] yields one item per pending reload
    /// signal and ends when the reloader closes. Dropping it (or calling
    /// [`Subscription::release`]) unregisters the listener.
    ///
    /// Once the reloader is closed this returns a closed subscription that
    /// never yields; check [`Subscription::is_closed`].
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.shared.lock();
        if state.closed {
            return Subscription::closed();
        }

        let id = state.next_id;
        state.next_id += 1;

        let (tx, rx) = mpsc::channel(1);
        state.clients.insert(id, tx);

        Subscription {
            rx: Some(rx),
            registration: Some((id, Arc::downgrade(&self.shared))),
        }
    }

    /// Send a reload signal to every current subscriber.
    ///
    /// Never blocks: subscribers that still hold an unread signal are
    /// skipped. Does nothing once closed.
    pub fn notify(&self) {
        self.shared.notify();
    }

    /// Shut the reloader down.
    ///
    /// Stops the watcher if one was started, then ends every subscription.
    /// Later calls to [`subscribe`](Self::subscribe) return closed
    /// subscriptions. Safe to call more than once.
    pub fn close(&self) {
        let cancel = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            // Same critical section as the `closed` check in `replace_watcher`.
            state.closed = true;
            // Dropping the senders closes every subscriber channel.
            state.clients.clear();
            state.watch_cancel.take()
        };

        if let Some(cancel) = cancel {
            let _ = cancel.send(());
        }

        tracing::debug!(parent: &self.shared.span, "Live reload closed");
    }

    /// Whether live reload is currently enabled.
    pub fn enabled(&self) -> bool {
        self.shared.lock().enabled
    }

    /// Enable or disable live reload at runtime.
    ///
    /// Existing subscriptions are unaffected; the flag only gates the cache
    /// layer and the template snippet.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.lock().enabled = enabled;
    }

    /// Route the stream handler is mounted at.
    pub fn route(&self) -> &str {
        &self.shared.route
    }

    /// Maximum asset cache age in whole seconds.
    pub fn max_age_secs(&self) -> u64 {
        self.shared.max_age_secs
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().clients.len()
    }
}

impl fmt::Debug for Reloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Reloader")
            .field("route", &self.shared.route)
            .field("enabled", &state.enabled)
            .field("closed", &state.closed)
            .field("subscribers", &state.clients.len())
            .finish_non_exhaustive()
    }
}

/// A registered reload listener.
///
/// Unregisters itself on drop, so holding it for the lifetime of a
/// connection is enough to guarantee cleanup on every exit path.
pub struct Subscription {
    rx: Option<mpsc::Receiver<()>>,
    registration: Option<(u64, Weak<Shared>)>,
}

impl Subscription {
    /// Subscription handed out by a closed reloader.
    fn closed() -> Self {
        Self {
            rx: None,
            registration: None,
        }
    }

    /// Whether no further signals can ever arrive.
    ///
    /// True for subscriptions issued after the reloader closed, and for live
    /// subscriptions once the reloader closes or they are released. A signal
    /// sent before that may still be buffered.
    pub fn is_closed(&self) -> bool {
        self.rx.as_ref().is_none_or(mpsc::Receiver::is_closed)
    }

    /// Wait for the next reload signal.
    ///
    /// Returns `None` once the subscription is closed and drained.
    pub async fn recv(&mut self) -> Option<()> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Take a pending reload signal without waiting.
    pub fn try_recv(&mut self) -> Option<()> {
        self.rx.as_mut().and_then(|rx| rx.try_recv().ok())
    }

    /// Unregister from the reloader. Idempotent.
    pub fn release(&mut self) {
        if let Some((id, shared)) = self.registration.take()
            && let Some(shared) = shared.upgrade()
        {
            shared.release(id);
        }
        if let Some(rx) = self.rx.as_mut() {
            rx.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl Stream for Subscription {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        match self.rx.as_mut() {
            Some(rx) => rx.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.registration.as_ref().map(|(id, _)| *id))
            .field("closed", &self.is_closed())
            .finish()
    }
}
