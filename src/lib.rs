//! Volley — a small load-generation harness for Rust.
//!
//! Volley runs a unit of work (an HTTP probe, a database query, anything async)
//! over and over across a fixed pool of workers, until a limit is hit or the
//! process is told to stop. While the pool runs, success and failure counts are
//! aggregated live.
//!
//! # Architecture
//!
//! - [`Manager`]: the single shared authority of a run. Every worker asks it
//!   whether another run may start, and reports each outcome to it. It enforces
//!   the [`RunLimits`] exactly and publishes live [`Stats`].
//! - [`Worker`]: one loop of the pool. Acquire a slot, perform the work against
//!   the worker's session, record the outcome, repeat until denied.
//! - [`Runner`]: the orchestrator. It spawns the workers and the manager's stats
//!   task, turns SIGINT/SIGTERM into a shutdown of every task, waits for the
//!   pool to unwind and hands back the final [`Stats`].
//! - [`Work`] and [`SessionSetup`]: the pluggable parts. Plain async closures
//!   implement both.
//! - [`Summary`] and [`Reporter`]: optional helpers to derive and print results.
//!
//! # Stopping
//!
//! A run stops granting work when the first of these happens:
//!
//! - the configured duration elapses (runs in flight still finish and count),
//! - `max_runs` runs were granted across the pool,
//! - every worker used up its `max_runs_per_worker`,
//! - the run is shut down through a [`ShutdownHandle`] or a signal. Runs in
//!   flight are abandoned and not counted.
//!
//! Failed runs are just counted. A unit of work that returns `false`, an `Err`,
//! or panics is recorded as a failure and its worker carries on.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use volley::{Reporter, RunConfig, RunLimits, Runner, StdoutReporter, Summary};
//!
//! #[tokio::main]
//! async fn main() -> volley::Result<()> {
//!     let config = RunConfig::builder()
//!         .workers(20)
//!         .limits(RunLimits::builder().duration(Duration::from_secs(20)).build())
//!         .build();
//!
//!     let stats = Runner::new(config, |client: reqwest::Client| async move {
//!         let res = client.get("http://localhost:3000").send().await?;
//!         Ok::<_, reqwest::Error>(res.status().is_success())
//!     })
//!     // Build heavy things like clients once per worker, never inside the work.
//!     .with_session_setup(|| async { reqwest::Client::builder().build() })
//!     .run()
//!     .await?;
//!
//!     StdoutReporter.report(&Summary::from(stats)).await
//! }
//! ```

/// Run configuration and limits
pub mod config;
pub mod error;
/// The shared gate and aggregator
pub mod manager;
/// Derived results and reporters
pub mod report;
/// Orchestration and shutdown
pub mod runner;
mod signal;
pub mod stats;
/// Unit of work and session abstractions
pub mod work;
pub mod worker;

pub use config::{RunConfig, RunLimits};
pub use error::{Error, Result};
pub use manager::{Manager, RunSlot};
pub use report::{JsonReporter, Reporter, StdoutReporter, Summary};
pub use runner::{Runner, ShutdownHandle};
pub use stats::{Stats, StopReason};
pub use work::{BoxError, NoSession, Outcome, SessionSetup, Work};
pub use worker::Worker;
