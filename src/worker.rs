use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;

use crate::{
    manager::Manager,
    work::{SessionSetup, Work},
};

/// One slot of the pool: repeatedly asks the [`Manager`] for a run, performs it
/// and records the outcome.
pub struct Worker<W, P: SessionSetup> {
    id: usize,
    work: Arc<W>,
    manager: Arc<Manager>,
    setup: Arc<P>,
}

impl<W, P> Worker<W, P>
where
    W: Work<P::Session>,
    P: SessionSetup,
{
    pub fn new(id: usize, work: Arc<W>, manager: Arc<Manager>, setup: Arc<P>) -> Self {
        Self {
            id,
            work,
            manager,
            setup,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs until the manager denies a run.
    ///
    /// A failed, erroring or panicking run is recorded as a failure and the loop
    /// goes on. If the task is aborted mid-run, the run is abandoned: its slot
    /// is released and nothing is recorded.
    pub async fn run(self) {
        let id = self.id;
        let mut session: Option<P::Session> = None;
        tracing::debug!("Worker {id} started.");

        while let Some(slot) = self.manager.acquire(id) {
            let current = match session.clone() {
                Some(s) => s,
                None => match self.setup.setup().await {
                    Ok(s) => {
                        session = Some(s.clone());
                        s
                    }
                    Err(e) => {
                        tracing::warn!("Worker {id} failed to set up its session: {e}");
                        slot.record(false);
                        continue;
                    }
                },
            };

            let succeeded = match AssertUnwindSafe(self.work.perform(current))
                .catch_unwind()
                .await
            {
                Ok(succeeded) => succeeded,
                Err(_) => {
                    tracing::error!("Worker {id} run panicked, counting it as a failure.");
                    false
                }
            };
            slot.record(succeeded);
        }

        tracing::debug!("Worker {id} shutting down.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RunLimits, work::NoSession};
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    };

    fn manager(limits: RunLimits) -> Arc<Manager> {
        Arc::new(Manager::new(limits, Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn stops_when_denied() {
        let manager = manager(RunLimits::builder().max_runs_per_worker(4).build());
        let work = Arc::new(|_: ()| async { true });
        Worker::new(0, work, manager.clone(), Arc::new(NoSession))
            .run()
            .await;

        let stats = manager.stats();
        assert_eq!(stats.total_runs, 4);
        assert_eq!(stats.success_count, 4);
        assert_eq!(stats.per_worker[&0], 4);
    }

    #[tokio::test]
    async fn panics_and_errors_count_as_failures() {
        let manager = manager(RunLimits::builder().max_runs(6).build());
        let calls = Arc::new(AtomicU64::new(0));
        let work = Arc::new({
            let calls = calls.clone();
            move |_: ()| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n % 3 {
                        0 => Ok(true),
                        1 => Err("refused"),
                        _ => panic!("boom"),
                    }
                }
            }
        });

        Worker::new(0, work, manager.clone(), Arc::new(NoSession))
            .run()
            .await;

        let stats = manager.stats();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(stats.total_runs, 6);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 4);
    }

    #[tokio::test]
    async fn session_is_built_once_and_shared_by_runs() {
        let manager = manager(RunLimits::builder().max_runs(5).build());
        let setups = Arc::new(AtomicU64::new(0));
        let setup = Arc::new({
            let setups = setups.clone();
            move || {
                let n = setups.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, std::io::Error>(Arc::new(n)) }
            }
        });
        let work = Arc::new(|session: Arc<u64>| async move { *session == 0 });

        Worker::new(3, work, manager.clone(), setup).run().await;

        assert_eq!(setups.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats().success_count, 5);
    }

    #[tokio::test]
    async fn failed_setup_counts_and_retries() {
        let manager = manager(RunLimits::builder().max_runs(3).build());
        let attempts = Arc::new(AtomicU64::new(0));
        let setup = Arc::new({
            let attempts = attempts.clone();
            move || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(std::io::Error::new(std::io::ErrorKind::Other, "refused"))
                    } else {
                        Ok(())
                    }
                }
            }
        });
        let work = Arc::new(|_: ()| async { true });

        Worker::new(0, work, manager.clone(), setup).run().await;

        let stats = manager.stats();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_run_is_not_counted() {
        let manager = manager(RunLimits::builder().max_runs(1).build());
        let work = Arc::new(|_: ()| async {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            true
        });
        let task = tokio::spawn(Worker::new(0, work, manager.clone(), Arc::new(NoSession)).run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let stats = manager.stats();
        assert_eq!(stats.total_runs, 0);
        // the abandoned reservation went back to the pool
        assert!(manager.may_run(0));
    }
}
