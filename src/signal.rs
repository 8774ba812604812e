#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

#[cfg(unix)]
use crate::error::Error;
use crate::{error::Result, runner::ShutdownHandle};

/// Process signals that shut a run down: SIGINT and SIGTERM on unix, Ctrl-C
/// elsewhere.
pub(crate) struct Signals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl Signals {
    /// Registers the handlers. Signals delivered from here on are buffered
    /// until [`forward`](Self::forward) picks them up.
    pub(crate) fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt()).map_err(Error::Signal)?,
                terminate: signal(SignalKind::terminate()).map_err(Error::Signal)?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    async fn recv(&mut self) -> Option<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                Some(()) = self.interrupt.recv() => Some("SIGINT"),
                Some(()) = self.terminate.recv() => Some("SIGTERM"),
                else => None,
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok().map(|()| "Ctrl-C")
        }
    }

    /// Turns every received signal into a shutdown request. Repeated signals
    /// are harmless since shutting down twice is a no-op.
    pub(crate) async fn forward(mut self, shutdown: ShutdownHandle) {
        while let Some(name) = self.recv().await {
            tracing::info!("{name} received; shutting down.");
            shutdown.shutdown();
        }
    }
}
