use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{Error, Result};

/// How often the manager publishes a live [`crate::Stats`] snapshot by default.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Global stopping conditions of a run.
///
/// Every limit is independent and optional. A limit left unset never stops the
/// run; with none set the run only ends through [`crate::ShutdownHandle::shutdown`]
/// or a signal.
///
/// ```rust
/// use std::time::Duration;
/// use volley::RunLimits;
///
/// let limits = RunLimits::builder()
///     .duration(Duration::from_secs(20))
///     .max_runs(10_000)
///     .build();
/// assert_eq!(limits.max_runs_per_worker, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct RunLimits {
    /// Wall-clock budget, measured from the moment the manager is created.
    #[builder(default, setter(strip_option))]
    pub duration: Option<Duration>,
    /// Cap on runs across the whole pool.
    #[builder(default, setter(strip_option))]
    pub max_runs: Option<u64>,
    /// Cap on runs a single worker may perform.
    #[builder(default, setter(strip_option))]
    pub max_runs_per_worker: Option<u64>,
}

impl RunLimits {
    /// True when nothing but an external shutdown can end the run.
    pub fn is_unbounded(&self) -> bool {
        self.duration.is_none() && self.max_runs.is_none() && self.max_runs_per_worker.is_none()
    }
}

/// Everything a [`crate::Runner`] needs besides the work itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct RunConfig {
    /// Size of the worker pool.
    pub workers: usize,
    #[builder(default)]
    #[serde(default)]
    pub limits: RunLimits,
    /// Tick of the live stats task.
    #[builder(default = DEFAULT_STATS_INTERVAL)]
    #[serde(default = "default_stats_interval")]
    pub stats_interval: Duration,
    /// Install SIGINT/SIGTERM handlers that shut the run down.
    ///
    /// The handlers are never unregistered: once a run has installed them,
    /// these signals no longer terminate the process, even after the run
    /// returns. Turn this off when embedding volley in a program that handles
    /// signals itself.
    #[builder(default = true)]
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,
}

fn default_stats_interval() -> Duration {
    DEFAULT_STATS_INTERVAL
}

fn default_handle_signals() -> bool {
    true
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::NoWorkers);
        }
        if self.stats_interval.is_zero() {
            return Err(Error::ZeroStatsInterval);
        }
        Ok(())
    }
}
