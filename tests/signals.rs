#![cfg(unix)]
//! Signal handling gets its own test binary: the signals below are delivered
//! to the whole process.
use std::time::Duration;

use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use volley::{RunConfig, Runner, StopReason};

#[tokio::test]
async fn sigint_shuts_down_a_stuck_run() {
    let config = RunConfig::builder().workers(4).build();
    let run = tokio::spawn(Runner::new(config, |_: ()| std::future::pending::<bool>()).run());

    // let the runner install its handlers and spawn the pool
    tokio::time::sleep(Duration::from_millis(100)).await;
    kill(Pid::this(), Signal::SIGINT).unwrap();
    // a second signal must be a no-op
    kill(Pid::this(), Signal::SIGTERM).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run should return promptly after SIGINT")
        .unwrap()
        .unwrap();

    assert_eq!(stats.total_runs, 0);
    assert_eq!(stats.stop_reason, Some(StopReason::Interrupted));

    // the handlers outlive the run: later signals are swallowed, not fatal
    kill(Pid::this(), Signal::SIGINT).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
}
