//! The pluggable pieces of a run: the unit of work and the session it runs against.
use std::{fmt::Display, future::Future};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Interprets whatever a unit of work returned as success or failure.
pub trait Outcome {
    fn succeeded(self) -> bool;
}

impl Outcome for bool {
    fn succeeded(self) -> bool {
        self
    }
}

/// `Ok` defers to the inner value; an `Err` is a failed run.
impl<T, E> Outcome for Result<T, E>
where
    T: Outcome,
    E: Display,
{
    fn succeeded(self) -> bool {
        match self {
            Ok(outcome) => outcome.succeeded(),
            Err(e) => {
                tracing::debug!("Run failed: {e}");
                false
            }
        }
    }
}

/// One unit of work, executed once per granted run.
///
/// Implemented for any `Fn(S) -> impl Future<Output = impl Outcome>`, so a plain
/// async closure is enough:
///
/// ```rust
/// use volley::Work;
///
/// fn assert_work<S, W: Work<S>>(_: &W) {}
///
/// let probe = |client: String| async move { !client.is_empty() };
/// assert_work(&probe);
/// ```
///
/// Every run receives its own clone of the worker's session. Keep the action
/// itself light: build heavy things like clients in a [`SessionSetup`].
pub trait Work<S>: Send + Sync + 'static {
    fn perform(&self, session: S) -> impl Future<Output = bool> + Send;
}

impl<S, F, Fut> Work<S> for F
where
    S: Send,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future + Send,
    Fut::Output: Outcome,
{
    fn perform(&self, session: S) -> impl Future<Output = bool> + Send {
        async move { self(session).await.succeeded() }
    }
}

/// Builds the resource a worker's runs share, e.g. an HTTP client.
///
/// Called once per worker, lazily, before its first permitted run. The session
/// is dropped when the worker exits, on every path including cancellation.
pub trait SessionSetup: Send + Sync + 'static {
    type Session: Clone + Send + Sync + 'static;

    fn setup(&self) -> impl Future<Output = Result<Self::Session, BoxError>> + Send;
}

impl<F, Fut, S, E> SessionSetup for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S, E>> + Send,
    S: Clone + Send + Sync + 'static,
    E: Into<BoxError>,
{
    type Session = S;

    fn setup(&self) -> impl Future<Output = Result<S, BoxError>> + Send {
        let fut = self();
        async move { fut.await.map_err(Into::into) }
    }
}

/// Setup for work that needs no session; every run receives `()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl SessionSetup for NoSession {
    type Session = ();

    async fn setup(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes() {
        assert!(true.succeeded());
        assert!(!false.succeeded());
        assert!(Ok::<_, String>(true).succeeded());
        assert!(!Ok::<_, String>(false).succeeded());
        assert!(!Err::<bool, _>("boom").succeeded());
    }

    #[tokio::test]
    async fn closures_are_work() {
        let work = |n: u32| async move { n > 1 };
        assert!(work.perform(2).await);
        assert!(!work.perform(0).await);

        let fallible = |n: u32| async move {
            if n == 0 {
                Err("zero")
            } else {
                Ok(true)
            }
        };
        assert!(fallible.perform(1).await);
        assert!(!fallible.perform(0).await);
    }

    #[tokio::test]
    async fn closures_are_session_setup() {
        let setup = || async { Ok::<_, std::io::Error>(String::from("session")) };
        assert_eq!(setup.setup().await.unwrap(), "session");

        let failing = || async {
            Err::<String, _>(std::io::Error::new(std::io::ErrorKind::Other, "refused"))
        };
        let err = failing.setup().await.unwrap_err();
        assert_eq!(err.to_string(), "refused");

        NoSession.setup().await.unwrap();
    }
}
