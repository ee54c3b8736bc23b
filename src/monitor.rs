//! Background polling loop and snapshot fan-out.
//!
//! The loop reads state once per poll interval, evaluates alerts and hands
//! the snapshot to every registered subscriber. Delivery uses a bounded queue
//! per subscriber with `try_send`, so a stalled subscriber loses snapshots
//! instead of stalling the cadence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::registry::PointRegistry;
use crate::state::{self, StateSnapshot};
use crate::transport::TransportSerializer;

pub type SubscriberId = u64;
pub type SnapshotReceiver = mpsc::Receiver<Arc<StateSnapshot>>;

#[derive(Debug, Default)]
struct HubInner {
    next_id: SubscriberId,
    senders: BTreeMap<SubscriberId, mpsc::Sender<Arc<StateSnapshot>>>,
    last: Option<Arc<StateSnapshot>>,
}

/// Dynamic set of snapshot subscribers plus the most recent snapshot.
#[derive(Debug)]
pub struct SnapshotHub {
    inner: Mutex<HubInner>,
    buffer: usize,
}

impl SnapshotHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber. It receives the latest snapshot right away if
    /// one exists, then every snapshot published while it stays registered.
    pub fn subscribe(&self) -> (SubscriberId, SnapshotReceiver) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut inner = self.lock();

        if let Some(last) = &inner.last {
            let _ = tx.try_send(Arc::clone(last));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.senders.insert(id, tx);
        debug!("Subscriber {} registered", id);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().senders.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} unregistered", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn last(&self) -> Option<Arc<StateSnapshot>> {
        self.lock().last.clone()
    }

    /// Deliver to every subscriber without waiting. Returns how many got it.
    pub fn publish(&self, snapshot: StateSnapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let mut inner = self.lock();
        inner.last = Some(Arc::clone(&snapshot));

        let mut delivered = 0;
        inner.senders.retain(|id, tx| match tx.try_send(Arc::clone(&snapshot)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber {} is full, snapshot dropped", id);
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Subscriber {} went away", id);
                false
            }
        });
        delivered
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorTiming {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub stop_timeout: Duration,
}

#[derive(Debug)]
struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

// Shared with each spawned loop task
#[derive(Debug, Clone)]
struct LoopContext {
    transport: Arc<TransportSerializer>,
    registry: Arc<PointRegistry>,
    hub: Arc<SnapshotHub>,
    timing: MonitorTiming,
    cycles: Arc<AtomicU64>,
    active: Arc<AtomicUsize>,
}

/// Counts live loop tasks.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `Stopped -> Running -> Stopped` polling loop.
#[derive(Debug)]
pub struct MonitorLoop {
    ctx: LoopContext,
    running: tokio::sync::Mutex<Option<RunningLoop>>,
}

impl MonitorLoop {
    pub fn new(
        transport: Arc<TransportSerializer>,
        registry: Arc<PointRegistry>,
        hub: Arc<SnapshotHub>,
        timing: MonitorTiming,
    ) -> Self {
        Self {
            ctx: LoopContext {
                transport,
                registry,
                hub,
                timing,
                cycles: Arc::new(AtomicU64::new(0)),
                active: Arc::new(AtomicUsize::new(0)),
            },
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Start polling. Returns `false` if a loop is already running.
    ///
    /// A loop left draining by an earlier [`stop`](Self::stop) is awaited
    /// first, so its in-flight cycle completes before the new loop starts.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            if !previous.token.is_cancelled() && !previous.handle.is_finished() {
                *running = Some(previous);
                return false;
            }
            debug!("Waiting for the previous monitor loop to drain");
            let _ = previous.handle.await;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(self.ctx.clone(), token.clone()));
        *running = Some(RunningLoop { token, handle });
        info!("Started monitoring {}", self.ctx.transport.endpoint());
        true
    }

    /// Signal the loop and wait up to the stop timeout for it to exit.
    ///
    /// In-flight exchanges are never cancelled. A loop still inside a cycle
    /// after the timeout is left to finish it and exit on its own; the next
    /// `start` waits for it.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(mut current) = running.take() else {
            return;
        };

        current.token.cancel();
        let limit = self.ctx.timing.stop_timeout;
        if time::timeout(limit, &mut current.handle).await.is_err() {
            warn!("Monitor loop still finishing its cycle after {:?}", limit);
            *running = Some(current);
            return;
        }
        info!("Stopped monitoring {}", self.ctx.transport.endpoint());
    }

    /// Signal the loop and wait for the current cycle to finish, however
    /// long the in-flight exchanges take.
    pub async fn stop_after_cycle(&self) {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return;
        };

        current.token.cancel();
        let _ = current.handle.await;
        info!("Stopped monitoring {}", self.ctx.transport.endpoint());
    }

    /// `false` once stopped, even while a stopped loop is still draining.
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled() && !r.handle.is_finished())
    }

    /// Live loop tasks, a draining one included. Never more than one.
    pub fn active_loops(&self) -> usize {
        self.ctx.active.load(Ordering::SeqCst)
    }

    /// Completed cycles across every run of this monitor.
    pub fn cycles(&self) -> u64 {
        self.ctx.cycles.load(Ordering::SeqCst)
    }
}

// An owner dropped without stopping still ends the loop at its next wait point
impl Drop for MonitorLoop {
    fn drop(&mut self) {
        if let Some(current) = self.running.get_mut() {
            current.token.cancel();
        }
    }
}

async fn run(ctx: LoopContext, token: CancellationToken) {
    let _active = ActiveGuard::enter(&ctx.active);

    let mut ticker = time::interval(ctx.timing.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !ctx.transport.is_connected() {
            info!("Session with {} closed, monitor exiting", ctx.transport.endpoint());
            break;
        }

        if let Err(e) = ctx.cycle().await {
            warn!(
                "Monitor cycle failed: {}; retrying in {:?}",
                e, ctx.timing.error_backoff
            );
            tokio::select! {
                () = token.cancelled() => break,
                () = time::sleep(ctx.timing.error_backoff) => {}
            }
            ticker.reset_immediately();
        }
    }
}

impl LoopContext {
    // A failed read still publishes, as a disconnected snapshot
    async fn cycle(&self) -> Result<(), TransportError> {
        let outcome = state::try_read_state(&self.transport, &self.registry).await;
        let (snapshot, result) = match outcome {
            Ok(snapshot) => (snapshot, Ok(())),
            Err(e) => (StateSnapshot::disconnected(), Err(e)),
        };

        if snapshot.system_fault {
            debug!("Active alerts: {:?}", snapshot.alerts);
        }
        self.hub.publish(snapshot);
        self.cycles.fetch_add(1, Ordering::SeqCst);
        result
    }
}
