//! Request record and receipt type.
//!
//! A request moves through three phases: pending (queued, waiting for
//! capacity), granted (tokens held, watched by a watchdog task), and done
//! (terminal). The record owns the signaling primitives connecting the three
//! parties involved: the waiter blocking on the grant, the facade delivering
//! touches and releases, and the watchdog multiplexing over both plus its
//! deadlines.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Auto-release deadline applied when a request does not specify one.
///
/// Effectively infinite: one year out, far beyond any realistic grant
/// lifetime, so unattended requests are reclaimed by the idle watchdog long
/// before this fires.
pub const DEFAULT_AUTO_RELEASE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Opaque handle identifying a submitted request.
///
/// Returned by [`Protector::submit`](crate::core::protector::Protector::submit)
/// and passed to all subsequent operations. The canonical textual form is a
/// random 128-bit identifier (hyphenated v4 UUID), so collisions are
/// vanishingly improbable over a protector's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receipt(String);

impl Receipt {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The receipt's canonical textual form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receiving halves handed to the watchdog when a request is granted.
pub(crate) struct WatchdogSignals {
    pub(crate) release_rx: oneshot::Receiver<()>,
    pub(crate) touch_rx: mpsc::Receiver<()>,
}

struct RequestInner {
    /// Set once, by the waiter committing to observe the grant.
    active: bool,
    /// Set on any terminal branch; later touches and releases become no-ops.
    done: bool,
    granted_tx: Option<oneshot::Sender<()>>,
    granted_rx: Option<oneshot::Receiver<()>>,
    release_tx: Option<oneshot::Sender<()>>,
    watchdog: Option<WatchdogSignals>,
}

/// A single token request tracked by a protector.
pub(crate) struct Request {
    id: Receipt,
    num_tokens: u32,
    auto_release: Duration,
    touch_tx: mpsc::Sender<()>,
    inner: Mutex<RequestInner>,
}

impl Request {
    pub(crate) fn new(num_tokens: u32, auto_release: Duration) -> Self {
        let (granted_tx, granted_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        let (touch_tx, touch_rx) = mpsc::channel(1);
        Self {
            id: Receipt::generate(),
            num_tokens,
            auto_release,
            touch_tx,
            inner: Mutex::new(RequestInner {
                active: false,
                done: false,
                granted_tx: Some(granted_tx),
                granted_rx: Some(granted_rx),
                release_tx: Some(release_tx),
                watchdog: Some(WatchdogSignals {
                    release_rx,
                    touch_rx,
                }),
            }),
        }
    }

    pub(crate) fn receipt(&self) -> &Receipt {
        &self.id
    }

    pub(crate) fn num_tokens(&self) -> u32 {
        self.num_tokens
    }

    pub(crate) fn auto_release(&self) -> Duration {
        self.auto_release
    }

    /// Deliver the grant and hand out the watchdog's end of the signals.
    pub(crate) fn grant(&self) -> Option<WatchdogSignals> {
        let mut inner = self.inner.lock();
        if let Some(tx) = inner.granted_tx.take() {
            let _ = tx.send(());
        }
        inner.watchdog.take()
    }

    /// Block until the grant arrives.
    ///
    /// Returns false when the grant was already observed once or the request
    /// has reached a terminal state.
    pub(crate) async fn wait_until_granted(&self) -> bool {
        let rx = {
            let mut inner = self.inner.lock();
            if inner.active || inner.done {
                return false;
            }
            inner.active = true;
            inner.granted_rx.take()
        };
        match rx {
            Some(rx) => rx.await.is_ok(),
            None => false,
        }
    }

    /// Ask the watchdog to reset its idle window.
    ///
    /// Non-blocking: if a previous touch has not been consumed yet, this one
    /// is dropped, which is equivalent. No-op before the grant is observed or
    /// after a terminal state.
    pub(crate) fn touch(&self) {
        let inner = self.inner.lock();
        if !inner.active || inner.done {
            return;
        }
        let _ = self.touch_tx.try_send(());
    }

    /// Terminate the request on client demand. Idempotent past the first call.
    pub(crate) fn release(&self) {
        let mut inner = self.inner.lock();
        if !inner.active || inner.done {
            return;
        }
        inner.done = true;
        if let Some(tx) = inner.release_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Mark terminal so late touch/release calls become harmless no-ops.
    pub(crate) fn finish(&self) {
        self.inner.lock().done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_observes_the_grant_exactly_once() {
        let request = Request::new(1, DEFAULT_AUTO_RELEASE);
        assert!(request.grant().is_some());
        assert!(request.wait_until_granted().await);
        assert!(!request.wait_until_granted().await);
    }

    #[tokio::test]
    async fn touch_and_release_require_an_observed_grant() {
        let request = Request::new(2, DEFAULT_AUTO_RELEASE);
        // Not yet active: both are no-ops and the grant can still be observed.
        request.touch();
        request.release();
        request.grant();
        assert!(request.wait_until_granted().await);
    }

    #[tokio::test]
    async fn release_signals_the_watchdog_once() {
        let request = Request::new(1, DEFAULT_AUTO_RELEASE);
        let signals = request.grant().expect("watchdog signals");
        assert!(request.wait_until_granted().await);

        request.release();
        request.release();

        let mut release_rx = signals.release_rx;
        release_rx.try_recv().expect("first release delivered");
    }

    #[tokio::test]
    async fn extra_touches_are_dropped_not_blocked() {
        let request = Request::new(1, DEFAULT_AUTO_RELEASE);
        let signals = request.grant().expect("watchdog signals");
        assert!(request.wait_until_granted().await);

        // The slot holds one pending touch; the rest must not block.
        request.touch();
        request.touch();
        request.touch();

        let mut touch_rx = signals.touch_rx;
        touch_rx.try_recv().expect("one pending touch");
        assert!(touch_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn finish_blocks_later_waits() {
        let request = Request::new(1, DEFAULT_AUTO_RELEASE);
        request.finish();
        assert!(!request.wait_until_granted().await);
    }

    #[test]
    fn receipts_are_unique_and_hyphenated() {
        let a = Receipt::generate();
        let b = Receipt::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(a.as_str().matches('-').count(), 4);
    }
}
