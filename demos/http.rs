use std::time::Duration;

use reqwest::Client;
use tracing_subscriber::EnvFilter;
use volley::{Reporter, RunConfig, RunLimits, Runner, StdoutReporter, Summary};

#[tokio::main]
async fn main() -> volley::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RunConfig::builder()
        .workers(20)
        .limits(RunLimits::builder().duration(Duration::from_secs(20)).build())
        .build();

    let stats = Runner::new(config, |client: Client| async move {
        let mut res = client.get("http://example.com").send().await?;
        // Only the first chunk of the body matters for the probe
        res.chunk().await?;
        Ok::<_, reqwest::Error>(res.status() == 200)
    })
    // NEVER build clients inside the work unless you want to kill performance
    .with_session_setup(|| async { Client::builder().build() })
    .run()
    .await?;

    StdoutReporter.report(&Summary::from(stats)).await
}
