use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::watch,
    task::{AbortHandle, JoinError, JoinHandle, JoinSet},
};

use crate::{
    config::RunConfig,
    error::Result,
    manager::Manager,
    signal::Signals,
    stats::{Stats, StopReason},
    work::{NoSession, SessionSetup, Work},
    worker::Worker,
};

#[derive(Debug, Default)]
struct ShutdownState {
    requested: bool,
    manager: Option<Arc<Manager>>,
    tasks: Vec<AbortHandle>,
}

/// Requests the shutdown of a run from anywhere: another task, a signal
/// listener, a test.
///
/// Shutting down closes the manager's gate and aborts every task of the run.
/// Runs in flight are abandoned uncounted. The call returns right away; the
/// run is over once [`Runner::run`] returns.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    state: Arc<Mutex<ShutdownState>>,
}

impl ShutdownHandle {
    /// Idempotent: a second call finds nothing left to cancel.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.requested {
            tracing::info!("Shutdown requested, cancelling {} tasks.", state.tasks.len());
            state.requested = true;
        }
        if let Some(manager) = &state.manager {
            manager.cancel();
        }
        for task in state.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.state.lock().requested
    }

    fn attach(&self, manager: &Arc<Manager>) {
        let mut state = self.state.lock();
        if state.requested {
            manager.cancel();
        }
        state.manager = Some(manager.clone());
    }

    fn track(&self, task: AbortHandle) {
        let mut state = self.state.lock();
        if state.requested {
            task.abort();
        } else {
            state.tasks.push(task);
        }
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        state.manager = None;
        state.tasks.clear();
    }
}

/// Runs a unit of work across a pool of workers until a limit is hit or the
/// run is shut down.
///
/// ```rust
/// use volley::{RunConfig, RunLimits, Runner};
///
/// # #[tokio::main]
/// # async fn main() -> volley::Result<()> {
/// let config = RunConfig::builder()
///     .workers(3)
///     .limits(RunLimits::builder().max_runs(10).build())
///     .handle_signals(false)
///     .build();
///
/// let stats = Runner::new(config, |_: ()| async { true }).run().await?;
/// assert_eq!(stats.total_runs, 10);
/// # Ok(())
/// # }
/// ```
pub struct Runner<W, P = NoSession> {
    config: RunConfig,
    work: Arc<W>,
    setup: Arc<P>,
    shutdown: ShutdownHandle,
    live: watch::Sender<Stats>,
}

impl<W> Runner<W, NoSession> {
    pub fn new(config: RunConfig, work: W) -> Self {
        let (live, _) = watch::channel(Stats::default());
        Self {
            config,
            work: Arc::new(work),
            setup: Arc::new(NoSession),
            shutdown: ShutdownHandle::default(),
            live,
        }
    }
}

impl<W, P> Runner<W, P> {
    /// Gives every worker a session built by `setup`, once per worker.
    pub fn with_session_setup<Q: SessionSetup>(self, setup: Q) -> Runner<W, Q> {
        Runner {
            config: self.config,
            work: self.work,
            setup: Arc::new(setup),
            shutdown: self.shutdown,
            live: self.live,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Returns a handle that can stop the run from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Live snapshots, published every stats interval while the run goes on and
    /// once more when it ends.
    ///
    /// The channel closes when the run is over; the last value stays readable
    /// through [`watch::Receiver::borrow`].
    pub fn subscribe(&self) -> watch::Receiver<Stats> {
        self.live.subscribe()
    }
}

impl<W, P> Runner<W, P>
where
    P: SessionSetup,
    W: Work<P::Session>,
{
    /// Runs the pool to completion and returns the final counters.
    ///
    /// Hitting a limit or being shut down is a normal end of the run, not an
    /// error. Errors only come from invalid configuration or from failing to
    /// install the signal handlers.
    ///
    /// Dropping the returned future before it completes cancels the run and
    /// aborts all of its tasks.
    ///
    /// With `handle_signals` set, the SIGINT/SIGTERM handlers stay registered
    /// with the process after the run returns: later signals no longer
    /// terminate it and are ignored.
    pub async fn run(self) -> Result<Stats> {
        let Runner {
            config,
            work,
            setup,
            shutdown,
            live,
        } = self;
        config.validate()?;

        let listener = if config.handle_signals {
            let signals = Signals::install()?;
            Some(tokio::spawn(signals.forward(shutdown.clone())))
        } else {
            None
        };

        let manager = Arc::new(Manager::with_live(
            config.limits,
            config.stats_interval,
            live,
        ));
        shutdown.attach(&manager);

        let stats_task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.current_stats().await }
        });
        shutdown.track(stats_task.abort_handle());

        let _guard = RunGuard {
            manager: manager.clone(),
            stats: stats_task.abort_handle(),
            listener,
            shutdown: shutdown.clone(),
        };

        tracing::info!("Spawning {} workers...", config.workers);
        let mut workers = JoinSet::new();
        for id in 0..config.workers {
            let worker = Worker::new(id, work.clone(), manager.clone(), setup.clone());
            shutdown.track(workers.spawn(worker.run()));
        }

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                log_join_error("worker", e);
            }
        }

        // Every worker is done; close the gate so the stats task winds down.
        manager.stop(StopReason::Exhausted);
        if let Err(e) = stats_task.await {
            log_join_error("stats", e);
        }

        let stats = manager.publish();
        tracing::info!("Done running: {stats}");
        Ok(stats)
    }
}

/// Tears down what a run spawned outside its worker set, whether the run
/// completes or its future is dropped mid-flight.
struct RunGuard {
    manager: Arc<Manager>,
    stats: AbortHandle,
    listener: Option<JoinHandle<()>>,
    shutdown: ShutdownHandle,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        // no-op after a normal end, the gate is already closed
        self.manager.cancel();
        self.stats.abort();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.shutdown.detach();
    }
}

fn log_join_error(task: &str, e: JoinError) {
    if e.is_cancelled() {
        tracing::debug!("{task} task cancelled.");
    } else {
        tracing::error!("{task} task failed: {e}");
    }
}
