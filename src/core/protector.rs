//! Protector implementation: pending queue, token accounting, scheduling loop.
//!
//! The protector owns all mutable coordination state behind a reader-writer
//! lock. Scheduling passes and grant bookkeeping take the write lock; receipt
//! lookups for wait/touch/release take the read lock. Per-grant watchdogs run
//! as spawned tasks and contend for the lock only at their terminal step.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::config::ProtectorConfig;
use crate::core::error::ProtectorError;
use crate::core::events::{build_event, EventKind, EventSink};
use crate::core::probe::AvailabilityProbe;
use crate::core::request::{Receipt, Request, WatchdogSignals, DEFAULT_AUTO_RELEASE};
use crate::runtime::TokioSpawner;

/// Abstraction for spawning background tasks on a runtime.
///
/// The protector spawns two kinds of tasks through this trait: the deferred
/// scheduling pass armed by the reprocess gate, and one watchdog per granted
/// request.
pub trait Spawn {
    /// Spawn an async task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Lifetime counters, mutated only under the coordinator lock.
#[derive(Default)]
struct Counters {
    submitted: u64,
    granted: u64,
    released: u64,
    idle_timeouts: u64,
    auto_releases: u64,
}

/// Mutable coordinator state, owned exclusively by the protector's lock.
struct ProtectorState {
    used_tokens: u32,
    pending: VecDeque<Arc<Request>>,
    in_flight: HashMap<Receipt, Arc<Request>>,
    last_grant_at: Option<Instant>,
    reprocessing: bool,
    probe: Option<AvailabilityProbe>,
    counters: Counters,
}

/// Point-in-time snapshot of a protector's accounting.
#[derive(Debug, Clone, Default)]
pub struct ProtectorStats {
    /// Hard ceiling on concurrently granted tokens.
    pub max_tokens: u32,
    /// Tokens currently granted.
    pub used_tokens: u32,
    /// Requests waiting in the pending queue.
    pub pending_requests: usize,
    /// Requests either pending or granted.
    pub in_flight_requests: usize,
    /// Requests accepted by submit over the protector's lifetime.
    pub submitted_total: u64,
    /// Grants delivered.
    pub granted_total: u64,
    /// Explicit releases.
    pub released_total: u64,
    /// Idle-watchdog reclaims.
    pub idle_timeout_total: u64,
    /// Auto-release reclaims.
    pub auto_release_total: u64,
}

/// Which branch ended a watchdog.
#[derive(Clone, Copy)]
enum Terminal {
    Released,
    IdleTimeout,
    AutoRelease,
}

struct Core<S> {
    name: String,
    max_tokens: u32,
    delay_between: Duration,
    release_timeout: Duration,
    spawner: S,
    state: RwLock<ProtectorState>,
    events: Mutex<Option<Box<dyn EventSink>>>,
}

/// Protects a resource by granting tokens only when it has capacity.
///
/// Clients [`submit`](Protector::submit) a request for a number of tokens and
/// get back a [`Receipt`] immediately. They then
/// [`wait_until_granted`](Protector::wait_until_granted), use the resource
/// while [`touch`](Protector::touch)ing periodically, and finally
/// [`release`](Protector::release). A granted request that is neither touched
/// nor released within the release timeout is force-released, so a client
/// that dies unexpectedly does not hold its tokens forever.
///
/// Grants are strictly FIFO: a large request at the head of the queue blocks
/// later, smaller requests even when they would fit, so large requests cannot
/// starve.
///
/// Cloning is cheap and hands out another handle to the same protector.
pub struct Protector<S = TokioSpawner> {
    core: Arc<Core<S>>,
}

impl<S> Clone for Protector<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl Protector<TokioSpawner> {
    /// Create a protector driving its background tasks on the ambient tokio
    /// runtime.
    ///
    /// `name` identifies the protected resource in diagnostics.
    ///
    /// `delay_between` is the minimum delay between the granting of tokens to
    /// successive requests, used to avoid hitting the resource at too high a
    /// frequency.
    ///
    /// `max_simultaneous` is the maximum number of tokens that can be in use
    /// concurrently, used to avoid overloading the resource.
    ///
    /// `release_timeout` is the window after which granted tokens are
    /// reclaimed if the holder fails to touch or release them in time.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectorError::InvalidConfig`] when `max_simultaneous` is
    /// zero or `release_timeout` is zero, and [`ProtectorError::Runtime`]
    /// when called outside a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        delay_between: Duration,
        max_simultaneous: u32,
        release_timeout: Duration,
    ) -> Result<Self, ProtectorError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|err| ProtectorError::Runtime(err.to_string()))?;
        Self::with_spawner(
            name,
            delay_between,
            max_simultaneous,
            release_timeout,
            TokioSpawner::new(handle),
        )
    }
}

impl<S> Protector<S>
where
    S: Spawn + Send + Sync + 'static,
{
    /// Create a protector that spawns its background tasks through `spawner`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectorError::InvalidConfig`] when `max_simultaneous` is
    /// zero or `release_timeout` is zero.
    pub fn with_spawner(
        name: impl Into<String>,
        delay_between: Duration,
        max_simultaneous: u32,
        release_timeout: Duration,
        spawner: S,
    ) -> Result<Self, ProtectorError> {
        if max_simultaneous == 0 {
            return Err(ProtectorError::InvalidConfig(
                "max_simultaneous must be greater than 0".into(),
            ));
        }
        if release_timeout.is_zero() {
            return Err(ProtectorError::InvalidConfig(
                "release_timeout must be greater than 0".into(),
            ));
        }

        Ok(Self {
            core: Arc::new(Core {
                name: name.into(),
                max_tokens: max_simultaneous,
                delay_between,
                release_timeout,
                spawner,
                state: RwLock::new(ProtectorState {
                    used_tokens: 0,
                    pending: VecDeque::new(),
                    in_flight: HashMap::new(),
                    last_grant_at: None,
                    reprocessing: false,
                    probe: None,
                    counters: Counters::default(),
                }),
                events: Mutex::new(None),
            }),
        })
    }

    /// Build a protector from a validated configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectorError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn from_config(
        name: impl Into<String>,
        config: &ProtectorConfig,
        spawner: S,
    ) -> Result<Self, ProtectorError> {
        config.validate().map_err(ProtectorError::InvalidConfig)?;
        Self::with_spawner(
            name,
            config.delay_between(),
            config.max_tokens,
            config.release_timeout(),
            spawner,
        )
    }

    /// Attach an event sink recording lifecycle transitions.
    #[must_use]
    pub fn with_event_sink(self, sink: Box<dyn EventSink>) -> Self {
        *self.core.events.lock() = Some(sink);
        self
    }

    /// Name of the protected resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Install or replace the availability probe.
    ///
    /// The callback should check how busy the resource is and return a number
    /// between 0 (block any additional usage) and the `max_simultaneous`
    /// value given at construction; higher values are clamped. It is called
    /// with the coordinator lock held and at most once per `delay_between`
    /// window, so keep it cheap (or cache the busyness on your end) and never
    /// call back into this protector from inside it.
    ///
    /// Only set a probe when there is unprotected access to the resource that
    /// the protector needs to take into account.
    pub fn set_availability_probe(&self, callback: impl Fn() -> u32 + Send + Sync + 'static) {
        self.core.state.write().probe = Some(AvailabilityProbe::new(Box::new(callback)));
    }

    /// Request `num_tokens` for use.
    ///
    /// Returns a receipt immediately; the call never blocks on capacity.
    /// Supply the receipt to [`wait_until_granted`](Protector::wait_until_granted),
    /// then [`touch`](Protector::touch) periodically while using the
    /// resource, then [`release`](Protector::release).
    ///
    /// # Errors
    ///
    /// Returns [`ProtectorError::OverMaximumTokens`] when `num_tokens`
    /// exceeds the maximum and [`ProtectorError::ZeroTokens`] for an empty
    /// request. Rejected requests never enter the queue.
    pub fn submit(&self, num_tokens: u32) -> Result<Receipt, ProtectorError> {
        self.submit_inner(num_tokens, DEFAULT_AUTO_RELEASE)
    }

    /// Like [`submit`](Protector::submit), but the grant is released
    /// automatically once `auto_release` has passed.
    ///
    /// Touches are still required if `auto_release` is longer than the
    /// protector's release timeout.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Protector::submit).
    pub fn submit_with_auto_release(
        &self,
        num_tokens: u32,
        auto_release: Duration,
    ) -> Result<Receipt, ProtectorError> {
        self.submit_inner(num_tokens, auto_release)
    }

    fn submit_inner(
        &self,
        num_tokens: u32,
        auto_release: Duration,
    ) -> Result<Receipt, ProtectorError> {
        if num_tokens == 0 {
            return Err(ProtectorError::ZeroTokens);
        }
        if num_tokens > self.core.max_tokens {
            return Err(ProtectorError::OverMaximumTokens {
                requested: num_tokens,
                max: self.core.max_tokens,
            });
        }

        let request = Arc::new(Request::new(num_tokens, auto_release));
        let receipt = request.receipt().clone();
        {
            let mut state = self.core.state.write();
            state.pending.push_back(Arc::clone(&request));
            state.in_flight.insert(receipt.clone(), request);
            state.counters.submitted += 1;
        }

        debug!(protector = %self.core.name, receipt = %receipt, tokens = num_tokens, "request queued");
        self.core.record(&receipt, EventKind::Submitted, num_tokens);
        self.core.reprocess();
        Ok(receipt)
    }

    /// Block until the request behind `receipt` has been granted its tokens,
    /// whereupon the resource may be used.
    ///
    /// Returns false when the receipt is unknown, when the grant was already
    /// observed once, or when the request has reached a terminal state (for
    /// example because more than the release timeout passed between submit
    /// and this call). Do not use the resource in that case.
    pub async fn wait_until_granted(&self, receipt: &Receipt) -> bool {
        match self.lookup(receipt) {
            Some(request) => request.wait_until_granted().await,
            None => false,
        }
    }

    /// Reset the idle watchdog for a granted request.
    ///
    /// Call this periodically after
    /// [`wait_until_granted`](Protector::wait_until_granted) to keep holding
    /// the tokens. No-op when the receipt is unknown, the grant has not been
    /// observed, or the request already terminated.
    pub fn touch(&self, receipt: &Receipt) {
        if let Some(request) = self.lookup(receipt) {
            request.touch();
        }
    }

    /// Return the tokens of a granted request to the pool.
    ///
    /// Always call this when done with the resource (unless the request was
    /// submitted with an auto-release). No-op when the receipt is unknown,
    /// the grant has not been observed, or the request already terminated.
    pub fn release(&self, receipt: &Receipt) {
        if let Some(request) = self.lookup(receipt) {
            request.release();
        }
    }

    /// Snapshot the protector's current accounting.
    #[must_use]
    pub fn stats(&self) -> ProtectorStats {
        let state = self.core.state.read();
        ProtectorStats {
            max_tokens: self.core.max_tokens,
            used_tokens: state.used_tokens,
            pending_requests: state.pending.len(),
            in_flight_requests: state.in_flight.len(),
            submitted_total: state.counters.submitted,
            granted_total: state.counters.granted,
            released_total: state.counters.released,
            idle_timeout_total: state.counters.idle_timeouts,
            auto_release_total: state.counters.auto_releases,
        }
    }

    fn lookup(&self, receipt: &Receipt) -> Option<Arc<Request>> {
        self.core.state.read().in_flight.get(receipt).cloned()
    }
}

impl<S> Core<S>
where
    S: Spawn + Send + Sync + 'static,
{
    fn record(&self, receipt: &Receipt, kind: EventKind, num_tokens: u32) {
        let mut guard = self.events.lock();
        if let Some(sink) = guard.as_mut() {
            sink.record(build_event(
                self.name.clone(),
                receipt.clone(),
                kind,
                num_tokens,
            ));
        }
    }

    /// One scheduling pass over the head of the pending queue.
    ///
    /// Strictly FIFO: only the head is ever considered, even when a later
    /// request would fit the free tokens.
    fn process(self: &Arc<Self>) {
        let mut state = self.state.write();
        if state.pending.is_empty() || state.used_tokens == self.max_tokens {
            return;
        }
        let Some(request) = state.pending.front().cloned() else {
            return;
        };

        if let Some(probe) = state.probe.as_ref() {
            let available = probe.check(self.max_tokens);
            if available < request.num_tokens() {
                // More capacity could turn up later, outside of our control
                // and knowledge. Act as if a grant happened so the retry
                // respects delay_between, then try again.
                state.last_grant_at = Some(Instant::now());
                drop(state);
                debug!(
                    protector = %self.name,
                    receipt = %request.receipt(),
                    available,
                    wanted = request.num_tokens(),
                    "probe deferred the head request"
                );
                self.record(
                    request.receipt(),
                    EventKind::ProbeDeferred,
                    request.num_tokens(),
                );
                self.reprocess();
                return;
            }
        }

        if self.max_tokens - state.used_tokens < request.num_tokens() {
            // The release that frees enough tokens will nudge the loop.
            return;
        }

        state.pending.pop_front();
        state.used_tokens += request.num_tokens();
        state.last_grant_at = Some(Instant::now());
        state.counters.granted += 1;
        let signals = request.grant();
        let more_pending = !state.pending.is_empty();
        drop(state);

        debug!(
            protector = %self.name,
            receipt = %request.receipt(),
            tokens = request.num_tokens(),
            "tokens granted"
        );
        self.record(request.receipt(), EventKind::Granted, request.num_tokens());

        if let Some(signals) = signals {
            let core = Arc::clone(self);
            self.spawner.spawn(async move {
                core.watchdog(request, signals).await;
            });
        }

        if more_pending {
            self.reprocess();
        }
    }

    /// Arm a deferred scheduling pass that honors `delay_between`.
    ///
    /// Redundant calls collapse: while one pass is armed, further calls
    /// return immediately, so the queue is drained by a single timer at a
    /// time.
    fn reprocess(self: &Arc<Self>) {
        let wait = {
            let mut state = self.state.write();
            if state.reprocessing {
                return;
            }
            state.reprocessing = true;
            state
                .last_grant_at
                .map_or(Duration::ZERO, |at| {
                    self.delay_between.saturating_sub(at.elapsed())
                })
        };

        let core = Arc::clone(self);
        self.spawner.spawn(async move {
            if !wait.is_zero() {
                time::sleep(wait).await;
            }
            core.state.write().reprocessing = false;
            core.process();
        });
    }

    /// Watch a granted request until it releases, goes idle, or auto-releases.
    ///
    /// The touch branch is the only non-terminal one; each touch restarts the
    /// idle window. Terminal branches mark the request done before taking the
    /// coordinator lock, so a late touch or release is a harmless no-op.
    async fn watchdog(self: Arc<Self>, request: Arc<Request>, signals: WatchdogSignals) {
        let WatchdogSignals {
            mut release_rx,
            mut touch_rx,
        } = signals;
        let auto = time::sleep(request.auto_release());
        tokio::pin!(auto);

        let terminal = loop {
            tokio::select! {
                _ = &mut release_rx => break Terminal::Released,
                touched = touch_rx.recv() => {
                    if touched.is_some() {
                        continue;
                    }
                    // All senders gone; the request can no longer be touched
                    // or released, so stop watching it.
                    request.finish();
                    break Terminal::Released;
                }
                () = time::sleep(self.release_timeout) => {
                    request.finish();
                    break Terminal::IdleTimeout;
                }
                () = &mut auto => {
                    request.finish();
                    break Terminal::AutoRelease;
                }
            }
        };

        let more_pending = {
            let mut state = self.state.write();
            state.used_tokens = state.used_tokens.saturating_sub(request.num_tokens());
            state.in_flight.remove(request.receipt());
            match terminal {
                Terminal::Released => state.counters.released += 1,
                Terminal::IdleTimeout => state.counters.idle_timeouts += 1,
                Terminal::AutoRelease => state.counters.auto_releases += 1,
            }
            !state.pending.is_empty()
        };

        match terminal {
            Terminal::Released => {
                debug!(protector = %self.name, receipt = %request.receipt(), "tokens released");
                self.record(request.receipt(), EventKind::Released, request.num_tokens());
            }
            Terminal::IdleTimeout => {
                warn!(
                    protector = %self.name,
                    receipt = %request.receipt(),
                    "no touch within the release timeout, reclaiming tokens"
                );
                self.record(
                    request.receipt(),
                    EventKind::IdleTimedOut,
                    request.num_tokens(),
                );
            }
            Terminal::AutoRelease => {
                debug!(
                    protector = %self.name,
                    receipt = %request.receipt(),
                    "auto-release deadline reached"
                );
                self.record(
                    request.receipt(),
                    EventKind::AutoReleased,
                    request.num_tokens(),
                );
            }
        }

        if more_pending {
            self.reprocess();
        }
    }
}
