//! Manager — the shared gate and aggregator of a run
//!
//! A single [`Manager`] is shared by every worker of a run. It answers one
//! question, "may another run start?", and keeps the counters that become the
//! final [`Stats`].
//!
//! # Gate
//! [`Manager::may_run`] checks every configured limit and, if all pass, reserves
//! a slot for the calling worker. Check and reservation happen under a single
//! lock and never suspend, so concurrent workers can never push the counters
//! past a limit: `max_runs` and `max_runs_per_worker` are exact.
//!
//! A reservation is either committed with [`Manager::record_outcome`] or handed
//! back with [`Manager::release`] when its run is abandoned mid-flight.
//! [`Manager::acquire`] wraps both in a [`RunSlot`] that releases on drop, which
//! is what workers use.
//!
//! # Stopping
//! The first stop condition hit records a [`StopReason`] and cancels the
//! manager's token. From then on every gate check is denied. Stopping never
//! interrupts a run in flight: a run that started before the duration expired
//! finishes and is recorded.
//!
//! # Live stats
//! [`Manager::current_stats`] is meant to run as its own task. It publishes a
//! snapshot on a watch channel every `stats_interval`, and it is the task that
//! stops the run when the duration elapses.
use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RunLimits,
    stats::{Stats, StopReason},
};

#[derive(Debug, Default)]
struct WorkerLedger {
    /// Granted slots, in flight or completed.
    reserved: u64,
    completed: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    reserved: u64,
    success: u64,
    failure: u64,
    workers: HashMap<usize, WorkerLedger>,
    stop_reason: Option<StopReason>,
}

/// Per-run authority over "may another run start" and "record this outcome".
#[derive(Debug)]
pub struct Manager {
    limits: RunLimits,
    stats_interval: Duration,
    started: Instant,
    ledger: Mutex<Ledger>,
    token: CancellationToken,
    live: watch::Sender<Stats>,
}

impl Manager {
    /// Creates a manager; the duration limit is measured from this instant.
    pub fn new(limits: RunLimits, stats_interval: Duration) -> Self {
        let (live, _) = watch::channel(Stats::default());
        Self::with_live(limits, stats_interval, live)
    }

    /// Like [`new`](Self::new), publishing snapshots on an existing channel.
    pub(crate) fn with_live(
        limits: RunLimits,
        stats_interval: Duration,
        live: watch::Sender<Stats>,
    ) -> Self {
        Self {
            limits,
            stats_interval,
            started: Instant::now(),
            ledger: Mutex::new(Ledger::default()),
            token: CancellationToken::new(),
            live,
        }
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Checks every limit and, if another run is permitted, reserves a slot for
    /// `worker_id`.
    ///
    /// A `true` must be followed by exactly one [`record_outcome`](Self::record_outcome)
    /// or [`release`](Self::release) for the same worker.
    pub fn may_run(&self, worker_id: usize) -> bool {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;

        if self.token.is_cancelled() {
            return false;
        }

        if let Some(duration) = self.limits.duration {
            if self.started.elapsed() > duration {
                self.stop_locked(ledger, StopReason::Elapsed);
                return false;
            }
        }

        if let Some(max_runs) = self.limits.max_runs {
            if ledger.reserved >= max_runs {
                self.stop_locked(ledger, StopReason::MaxRuns);
                return false;
            }
        }

        let worker = ledger.workers.entry(worker_id).or_default();
        if let Some(max_per_worker) = self.limits.max_runs_per_worker {
            if worker.reserved >= max_per_worker {
                return false;
            }
        }

        worker.reserved += 1;
        ledger.reserved += 1;
        true
    }

    /// Same gate as [`may_run`](Self::may_run), returning a slot that releases
    /// its reservation unless recorded.
    pub fn acquire(&self, worker_id: usize) -> Option<RunSlot<'_>> {
        self.may_run(worker_id).then(|| RunSlot {
            manager: self,
            worker_id,
            recorded: false,
        })
    }

    /// Commits a reserved run as succeeded or failed.
    pub fn record_outcome(&self, worker_id: usize, success: bool) {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;
        if success {
            ledger.success += 1;
        } else {
            ledger.failure += 1;
        }
        ledger.workers.entry(worker_id).or_default().completed += 1;
    }

    /// Hands back a reservation whose run never completed.
    pub fn release(&self, worker_id: usize) {
        let mut guard = self.ledger.lock();
        let ledger = &mut *guard;
        ledger.reserved = ledger.reserved.saturating_sub(1);
        if let Some(worker) = ledger.workers.get_mut(&worker_id) {
            worker.reserved = worker.reserved.saturating_sub(1);
        }
    }

    /// Closes the gate. Idempotent and safe to call from any task.
    pub fn cancel(&self) {
        self.stop(StopReason::Interrupted);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the gate is closed, for whatever reason.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub(crate) fn stop(&self, reason: StopReason) {
        let mut ledger = self.ledger.lock();
        self.stop_locked(&mut ledger, reason);
    }

    fn stop_locked(&self, ledger: &mut Ledger, reason: StopReason) {
        if ledger.stop_reason.is_none() {
            tracing::info!("Stopping run: {reason}.");
            ledger.stop_reason = Some(reason);
        }
        self.token.cancel();
    }

    /// Takes a snapshot of the counters.
    pub fn stats(&self) -> Stats {
        let ledger = self.ledger.lock();
        Stats {
            elapsed: self.started.elapsed(),
            total_runs: ledger.success + ledger.failure,
            success_count: ledger.success,
            failure_count: ledger.failure,
            per_worker: ledger
                .workers
                .iter()
                .map(|(id, worker)| (*id, worker.completed))
                .collect(),
            stop_reason: ledger.stop_reason,
        }
    }

    /// Receiver of the snapshots published by [`current_stats`](Self::current_stats).
    pub fn subscribe(&self) -> watch::Receiver<Stats> {
        self.live.subscribe()
    }

    pub(crate) fn publish(&self) -> Stats {
        let stats = self.stats();
        self.live.send_replace(stats.clone());
        stats
    }

    /// Live stats loop. Publishes a snapshot every tick, stops the run once the
    /// duration elapses and returns when the gate is closed.
    ///
    /// Dropping or aborting this future is always safe.
    pub async fn current_stats(&self) {
        let expiry = expire_at(self.limits.duration.map(|d| self.started + d));
        tokio::pin!(expiry);

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.stats_interval, self.stats_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = &mut expiry => {
                    self.stop(StopReason::Elapsed);
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.publish();
                    tracing::info!(
                        total = stats.total_runs,
                        ok = stats.success_count,
                        failed = stats.failure_count,
                        "{stats}"
                    );
                }
            }
        }

        self.publish();
        tracing::debug!("Stats task finished.");
    }
}

async fn expire_at(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// A granted permission to perform one run.
///
/// Record it once the run finishes. Dropping it unrecorded, for example
/// because the worker's task was aborted mid-run, gives the reservation back
/// without counting anything.
#[must_use = "dropping a slot releases it without recording an outcome"]
#[derive(Debug)]
pub struct RunSlot<'a> {
    manager: &'a Manager,
    worker_id: usize,
    recorded: bool,
}

impl RunSlot<'_> {
    pub fn record(mut self, success: bool) {
        self.manager.record_outcome(self.worker_id, success);
        self.recorded = true;
    }
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.manager.release(self.worker_id);
        }
    }
}
