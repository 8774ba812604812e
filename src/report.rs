use std::{fmt, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{
    error::Result,
    stats::{Stats, StopReason},
};

/// The final, derived view of a run's [`Stats`]: ratios and rates instead of
/// raw counters.
///
/// A summary is pure data. Turning it into output is the job of a [`Reporter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_runs: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Percentage of successful runs, 0 when nothing ran.
    pub success_ratio: f64,
    pub runs_per_second: f64,
    pub elapsed: Duration,
    pub stop_reason: Option<StopReason>,
}

impl From<&Stats> for Summary {
    fn from(stats: &Stats) -> Self {
        let success_ratio = if stats.total_runs == 0 {
            0.0
        } else {
            stats.success_count as f64 / stats.total_runs as f64 * 100.0
        };
        let secs = stats.elapsed.as_secs_f64();
        let runs_per_second = if secs > 0.0 {
            stats.total_runs as f64 / secs
        } else {
            0.0
        };

        Self {
            total_runs: stats.total_runs,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            success_ratio,
            runs_per_second,
            elapsed: stats.elapsed,
            stop_reason: stats.stop_reason,
        }
    }
}

impl From<Stats> for Summary {
    fn from(stats: Stats) -> Self {
        Self::from(&stats)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "runs:        {}", self.total_runs)?;
        writeln!(f, "succeeded:   {}", self.success_count)?;
        writeln!(f, "failed:      {}", self.failure_count)?;
        writeln!(f, "success:     {:.2}%", self.success_ratio)?;
        writeln!(f, "throughput:  {:.2} runs/s", self.runs_per_second)?;
        write!(f, "elapsed:     {:.2?}", self.elapsed)?;
        if let Some(reason) = self.stop_reason {
            write!(f, "\nstopped:     {reason}")?;
        }
        Ok(())
    }
}

/// Sends a [`Summary`] somewhere: the terminal, a file, a service.
pub trait Reporter {
    fn report(&self, summary: &Summary) -> impl Future<Output = Result<()>> + Send;
}

/// Prints the human-readable summary to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    async fn report(&self, summary: &Summary) -> Result<()> {
        println!("{summary}");
        Ok(())
    }
}

/// Prints the summary as JSON to stdout.
#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
pub struct JsonReporter {
    #[builder(default)]
    pub pretty: bool,
}

impl JsonReporter {
    pub fn render(&self, summary: &Summary) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(summary)?
        } else {
            serde_json::to_string(summary)?
        };
        Ok(json)
    }
}

impl Reporter for JsonReporter {
    async fn report(&self, summary: &Summary) -> Result<()> {
        println!("{}", self.render(summary)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(success: u64, failure: u64, elapsed: Duration) -> Stats {
        Stats {
            elapsed,
            total_runs: success + failure,
            success_count: success,
            failure_count: failure,
            stop_reason: Some(StopReason::Elapsed),
            ..Default::default()
        }
    }

    #[test]
    fn derives_ratio_and_throughput() {
        let summary = Summary::from(stats(30, 10, Duration::from_secs(4)));
        assert_eq!(summary.total_runs, 40);
        assert_eq!(summary.success_ratio, 75.0);
        assert_eq!(summary.runs_per_second, 10.0);
    }

    #[test]
    fn empty_run_has_zero_rates() {
        let summary = Summary::from(stats(0, 0, Duration::ZERO));
        assert_eq!(summary.success_ratio, 0.0);
        assert_eq!(summary.runs_per_second, 0.0);
        assert!(summary.to_string().contains("stopped:     duration elapsed"));
    }

    #[test]
    fn json_reporter_renders_summary() {
        let summary = Summary::from(stats(1, 1, Duration::from_secs(1)));
        let json = JsonReporter::builder().build().render(&summary).unwrap();
        let back: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
        assert!(json.contains(r#""stop_reason":"elapsed""#));

        let pretty = JsonReporter::builder().pretty(true).build();
        assert!(pretty.render(&summary).unwrap().contains('\n'));
    }

    #[tokio::test]
    async fn reporters_succeed() {
        let summary = Summary::from(stats(2, 0, Duration::from_secs(1)));
        StdoutReporter.report(&summary).await.unwrap();
        JsonReporter::default().report(&summary).await.unwrap();
    }
}
