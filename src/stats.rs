use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Why a run stopped granting new work. The first reason recorded wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured duration elapsed.
    Elapsed,
    /// The pool-wide run cap was reached.
    MaxRuns,
    /// Every worker finished on its own, i.e. hit its per-worker cap.
    Exhausted,
    /// Shut down from outside: a signal or an explicit cancel.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Elapsed => "duration elapsed",
            StopReason::MaxRuns => "max runs reached",
            StopReason::Exhausted => "workers exhausted",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// A read-only snapshot of a [`crate::Manager`]'s counters.
///
/// Published live by the stats task and returned as the result of
/// [`crate::Runner::run`]. Only recorded runs are counted; a run abandoned by a
/// shutdown never shows up here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub elapsed: Duration,
    pub total_runs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Completed runs keyed by worker id.
    pub per_worker: BTreeMap<usize, u64>,
    pub stop_reason: Option<StopReason>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs: {} (ok: {}, failed: {}) in {:.2?}",
            self.total_runs, self.success_count, self.failure_count, self.elapsed
        )?;
        if let Some(reason) = self.stop_reason {
            write!(f, ", stopped: {reason}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counts_and_reason() {
        let stats = Stats {
            elapsed: Duration::from_secs(2),
            total_runs: 10,
            success_count: 9,
            failure_count: 1,
            per_worker: BTreeMap::from([(0, 5), (1, 5)]),
            stop_reason: Some(StopReason::MaxRuns),
        };
        let text = stats.to_string();
        assert!(text.starts_with("runs: 10 (ok: 9, failed: 1)"));
        assert!(text.ends_with("stopped: max runs reached"));
    }

    #[test]
    fn reason_serializes_as_snake_case() {
        let json = serde_json::to_string(&StopReason::MaxRuns).unwrap();
        assert_eq!(json, r#""max_runs""#);
    }
}
