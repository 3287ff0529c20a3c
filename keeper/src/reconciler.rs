//! Snapshot reconciler
//!
//! Owns the single current [`Snapshot`] and replaces it wholesale after
//! each successful read round. Rules:
//! - at most one round is in flight; callers asking for a refresh while
//!   one is running join it and receive the same outcome
//! - scheduled ticks that find a round in flight are skipped, not queued
//! - a failed round keeps the previous snapshot and marks the view stale
//! - a source that panics mid-read fails the round like any other read error
//! - after [`Reconciler::shutdown`] late results are discarded

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::address::Address;
use crate::error::{ReadError, SyncError};
use crate::snapshot::{RoundReadouts, Snapshot};
use crate::source::MarketSource;

pub type RoundResult = Result<Arc<Snapshot>, SyncError>;

type Round = Shared<BoxFuture<'static, RoundResult>>;

/// What consumers observe: the last good snapshot and, if the latest
/// round failed, why it may be outdated.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    pub snapshot: Option<Arc<Snapshot>>,
    pub stale: Option<SyncError>,
}

impl SnapshotView {
    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }

    pub fn version(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.version)
    }
}

struct Inner<S> {
    source: S,
    holder: Option<Address>,
    view: watch::Sender<SnapshotView>,
    in_flight: Mutex<Option<(u64, Round)>>,
    next_round: AtomicU64,
    closed: AtomicBool,
}

/// Cheap to clone; clones share the same snapshot and in-flight round.
pub struct Reconciler<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: MarketSource> Reconciler<S> {
    /// `holder` selects whose balances are read; `None` skips the position read.
    pub fn new(source: S, holder: Option<Address>) -> Self {
        let (view, _) = watch::channel(SnapshotView::default());
        Self {
            inner: Arc::new(Inner {
                source,
                holder,
                view,
                in_flight: Mutex::new(None),
                next_round: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn current(&self) -> SnapshotView {
        self.inner.view.borrow().clone()
    }

    /// Receiver notified after every round, successful or not
    pub fn subscribe(&self) -> watch::Receiver<SnapshotView> {
        self.inner.view.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_in_flight().is_some()
    }

    /// Refresh now, joining the in-flight round if there is one.
    pub async fn refresh(&self) -> RoundResult {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Abandoned);
        }
        let (round, _) = self.start_or_join();
        round.await
    }

    /// Start a round only if none is running. Returns whether one started.
    ///
    /// The round runs on its own task; the caller does not wait for it.
    pub fn refresh_if_idle(&self) -> bool {
        if self.inner.closed.load(Ordering::SeqCst) {
            return false;
        }
        let mut slot = self.inner.lock_in_flight();
        if slot.is_some() {
            return false;
        }
        *slot = Some(self.inner.spawn_round());
        true
    }

    /// Abandon the reconciler. A round still in flight finishes reading,
    /// but its result is dropped instead of applied.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        let mut first = false;
        // Flip under the view lock so no round can be mid-apply
        inner.view.send_if_modified(|_| {
            first = !inner.closed.swap(true, Ordering::SeqCst);
            false
        });
        if first {
            info!("reconciler shut down at version {}", self.current().version());
        }
    }

    /// Tick `refresh_if_idle` every `period` until the returned task is stopped.
    pub fn spawn_scheduler(&self, period: Duration) -> RefreshTask {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let reconciler = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !reconciler.refresh_if_idle() {
                            debug!("refresh tick skipped, round still in flight");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("refresh scheduler stopped");
        });

        RefreshTask {
            stop: stop_tx,
            handle,
        }
    }

    fn start_or_join(&self) -> (Round, bool) {
        let mut slot = self.inner.lock_in_flight();
        if let Some((id, round)) = slot.as_ref() {
            debug!("joining refresh round {}", id);
            return (round.clone(), false);
        }
        let (id, round) = self.inner.spawn_round();
        *slot = Some((id, round.clone()));
        (round, true)
    }
}

impl<S: MarketSource> Inner<S> {
    fn lock_in_flight(&self) -> MutexGuard<'_, Option<(u64, Round)>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Callers must hold the in-flight slot and store the returned round in it.
    fn spawn_round(self: &Arc<Self>) -> (u64, Round) {
        let id = self.next_round.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(self);
        let owner: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move { inner.run_round(id).await });
        let round = async move {
            task.await.unwrap_or_else(|e| {
                warn!("refresh round {} task failed: {}", id, e);
                if let Some(inner) = owner.upgrade() {
                    inner.release(id);
                }
                Err(SyncError::Abandoned)
            })
        }
        .boxed()
        .shared();
        (id, round)
    }

    async fn run_round(self: Arc<Self>, id: u64) -> RoundResult {
        debug!("refresh round {} started", id);
        let readouts = match AssertUnwindSafe(self.read_all()).catch_unwind().await {
            Ok(readouts) => readouts,
            Err(_) => {
                warn!("refresh round {}: source panicked while reading", id);
                Err(SyncError::Stale(ReadError::Unavailable(
                    "source panicked while reading".into(),
                )))
            }
        };
        let outcome = self.apply(id, readouts);
        self.release(id);
        outcome
    }

    /// Clear the in-flight slot if it still belongs to round `id`
    fn release(&self, id: u64) {
        let mut slot = self.lock_in_flight();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }

    async fn read_all(&self) -> Result<RoundReadouts, SyncError> {
        Ok(self.source.read_round(self.holder.as_ref()).await?)
    }

    fn apply(&self, id: u64, readouts: Result<RoundReadouts, SyncError>) -> RoundResult {
        let mut outcome = Err(SyncError::Abandoned);
        self.view.send_if_modified(|view| {
            if self.closed.load(Ordering::SeqCst) {
                debug!("discarding result of abandoned round {}", id);
                return false;
            }
            let built = readouts
                .and_then(|r| Snapshot::build(r, view.snapshot.as_deref(), Utc::now()));
            match built {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    info!(
                        "snapshot v{} applied: phase {}, vault {} micro",
                        snapshot.version, snapshot.market.phase, snapshot.market.vault_balance_micro
                    );
                    view.snapshot = Some(Arc::clone(&snapshot));
                    view.stale = None;
                    outcome = Ok(snapshot);
                    true
                }
                Err(e) => {
                    warn!(
                        "refresh round {} failed, keeping v{}: {}",
                        id,
                        view.version(),
                        e
                    );
                    view.stale = Some(e.clone());
                    outcome = Err(e);
                    true
                }
            }
        });
        outcome
    }
}

/// Handle to a running refresh scheduler
pub struct RefreshTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{holder, open_market};
    use crate::source::{
        MarketReadout, OracleReadout, PositionReadout, ReadResult, ReadoutDocument, StaticSource,
    };
    use gdp_model::Phase;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Source whose market read waits for a gate and counts rounds
    struct GatedSource {
        inner: StaticSource,
        gate: Semaphore,
        market_reads: AtomicUsize,
        fail_oracle: AtomicBool,
    }

    impl GatedSource {
        fn new(document: ReadoutDocument, open: bool) -> Self {
            Self {
                inner: StaticSource::new(document),
                gate: Semaphore::new(if open { 1 } else { 0 }),
                market_reads: AtomicUsize::new(0),
                fail_oracle: AtomicBool::new(false),
            }
        }

        fn open_gate(&self) {
            self.gate.add_permits(1);
        }

        fn reads(&self) -> usize {
            self.market_reads.load(Ordering::SeqCst)
        }
    }

    impl MarketSource for GatedSource {
        fn read_market(&self) -> BoxFuture<'_, ReadResult<MarketReadout>> {
            async move {
                self.market_reads.fetch_add(1, Ordering::SeqCst);
                let _permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| ReadError::Unavailable(e.to_string()))?;
                self.inner.read_market().await
            }
            .boxed()
        }

        fn read_oracle(&self) -> BoxFuture<'_, ReadResult<OracleReadout>> {
            async move {
                if self.fail_oracle.load(Ordering::SeqCst) {
                    return Err(ReadError::Unavailable("oracle rpc timeout".into()));
                }
                self.inner.read_oracle().await
            }
            .boxed()
        }

        fn read_position<'a>(&'a self, holder: &'a Address) -> BoxFuture<'a, ReadResult<PositionReadout>> {
            self.inner.read_position(holder)
        }
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), true), Some(holder()));
        let mut rx = reconciler.subscribe();

        let snap = reconciler.refresh().await.unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.market.phase, Phase::Open);
        assert!(snap.position.is_some());

        assert!(rx.has_changed().unwrap());
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.version(), 1);
        assert!(!view.is_stale());

        let snap = reconciler.refresh().await.unwrap();
        assert_eq!(snap.version, 2);
        assert_eq!(reconciler.source().reads(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_round() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), false), None);

        let (a, b, _) = tokio::join!(reconciler.refresh(), reconciler.refresh(), async {
            tokio::task::yield_now().await;
            reconciler.source().open_gate();
        });

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(reconciler.source().reads(), 1);
        assert_eq!(a.version, 1);
        assert_eq!(b.version, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!reconciler.is_refreshing());
    }

    #[tokio::test]
    async fn test_failed_round_keeps_previous_snapshot() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), true), None);
        reconciler.refresh().await.unwrap();

        reconciler.source().fail_oracle.store(true, Ordering::SeqCst);
        let err = reconciler.refresh().await.unwrap_err();
        assert!(matches!(err, SyncError::Stale(ReadError::Unavailable(_))));

        let view = reconciler.current();
        assert!(view.is_stale());
        assert_eq!(view.version(), 1);

        reconciler.source().fail_oracle.store(false, Ordering::SeqCst);
        let snap = reconciler.refresh().await.unwrap();
        assert_eq!(snap.version, 2);
        assert!(!reconciler.current().is_stale());
    }

    #[tokio::test]
    async fn test_unknown_phase_keeps_previous_snapshot() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), true), None);
        reconciler.refresh().await.unwrap();

        let mut doc = open_market();
        doc.market.phase = 7;
        reconciler.source().inner.replace(doc);

        assert_eq!(reconciler.refresh().await, Err(SyncError::UnknownPhase(7)));
        let view = reconciler.current();
        assert_eq!(view.stale, Some(SyncError::UnknownPhase(7)));
        assert_eq!(view.snapshot.unwrap().market.phase, Phase::Open);
    }

    #[tokio::test]
    async fn test_missing_holder_fails_whole_round() {
        let stranger: Address = "0x00000000000000000000000000000000000000cc".parse().unwrap();
        let reconciler = Reconciler::new(GatedSource::new(open_market(), true), Some(stranger));
        assert!(matches!(
            reconciler.refresh().await,
            Err(SyncError::Stale(ReadError::UnknownHolder(_)))
        ));
        assert!(reconciler.current().snapshot.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_round_is_discarded() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), false), None);
        let mut rx = reconciler.subscribe();
        assert!(reconciler.refresh_if_idle());

        let waiter = reconciler.clone();
        let pending = tokio::spawn(async move { waiter.refresh().await });
        tokio::task::yield_now().await;

        reconciler.shutdown();
        reconciler.source().open_gate();

        assert_eq!(pending.await.unwrap(), Err(SyncError::Abandoned));
        assert!(!rx.has_changed().unwrap());
        assert!(reconciler.current().snapshot.is_none());
        assert!(!reconciler.current().is_stale());
        assert_eq!(reconciler.refresh().await, Err(SyncError::Abandoned));
    }

    /// Source whose first market read panics
    struct PanicsOnce {
        inner: StaticSource,
        panicked: AtomicBool,
    }

    impl MarketSource for PanicsOnce {
        fn read_market(&self) -> BoxFuture<'_, ReadResult<MarketReadout>> {
            async move {
                if !self.panicked.swap(true, Ordering::SeqCst) {
                    panic!("rpc client bug");
                }
                self.inner.read_market().await
            }
            .boxed()
        }

        fn read_oracle(&self) -> BoxFuture<'_, ReadResult<OracleReadout>> {
            self.inner.read_oracle()
        }

        fn read_position<'a>(&'a self, holder: &'a Address) -> BoxFuture<'a, ReadResult<PositionReadout>> {
            self.inner.read_position(holder)
        }
    }

    #[tokio::test]
    async fn test_panicking_source_fails_round_without_wedging() {
        let source = PanicsOnce {
            inner: StaticSource::new(open_market()),
            panicked: AtomicBool::new(false),
        };
        let reconciler = Reconciler::new(source, None);

        assert!(matches!(
            reconciler.refresh().await,
            Err(SyncError::Stale(ReadError::Unavailable(_)))
        ));
        assert!(reconciler.current().is_stale());
        assert!(!reconciler.is_refreshing());

        let snap = reconciler.refresh().await.unwrap();
        assert_eq!(snap.version, 1);
        assert!(!reconciler.current().is_stale());
        assert!(reconciler.refresh_if_idle());
    }

    #[tokio::test]
    async fn test_refresh_if_idle_skips_while_in_flight() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), false), None);
        assert!(reconciler.refresh_if_idle());
        assert!(!reconciler.refresh_if_idle());
        assert!(reconciler.is_refreshing());

        let mut rx = reconciler.subscribe();
        reconciler.source().open_gate();
        rx.changed().await.unwrap();

        assert_eq!(reconciler.current().version(), 1);
        assert_eq!(reconciler.source().reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_does_not_queue_ticks() {
        let reconciler = Reconciler::new(GatedSource::new(open_market(), false), None);
        let task = reconciler.spawn_scheduler(Duration::from_millis(10));

        // Ten periods pass while the first round is stuck
        tokio::time::sleep(Duration::from_millis(105)).await;
        assert_eq!(reconciler.source().reads(), 1);

        reconciler.source().open_gate();
        tokio::time::sleep(Duration::from_millis(35)).await;
        task.stop().await;
        while reconciler.is_refreshing() {
            tokio::task::yield_now().await;
        }

        let reads = reconciler.source().reads();
        assert!((2..=5).contains(&reads), "reads = {}", reads);
        assert_eq!(reconciler.current().version() as usize, reads);
    }
}
