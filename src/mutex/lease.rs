use std::sync::Arc;

use tracing::trace;

use super::exclusive::Exclusive;
use super::state::{LockCore, MutexState};
use super::{ErasedBody, Mutex};
use crate::cancel::CancelToken;
use crate::error::MutexError;
use crate::events::{Listeners, MutexListener};
use crate::strategy::MutexStrategy;

/// The default mutex kind.
///
/// Supports plain blocking acquisition, strategy-bounded acquisition with
/// retries, and a lease: when a strategy sets a lease time, a watchdog
/// force-releases the lock once it elapses and cancels the body's token, so
/// other callers are not blocked by a runaway holder. The body keeps running
/// until it notices the cancellation; its caller always receives a
/// "lease time exceeded" error.
///
/// A freed lock goes to whichever waiter wakes first. See
/// [`SynchronizedMutex`](crate::SynchronizedMutex) for arrival order.
pub struct LeaseMutex {
    inner: Exclusive,
}

impl LeaseMutex {
    pub const KIND: &'static str = "lease";

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        trace!(mutex = %name, "lease mutex created");
        LeaseMutex {
            inner: Exclusive::new(name, LockCore::new()),
        }
    }

    pub fn with_default_strategy(mut self, strategy: MutexStrategy) -> Self {
        self.inner.default_strategy = Some(strategy);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn MutexListener>) -> Self {
        self.inner.listeners.push(listener);
        self
    }

    pub(crate) fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.inner.listeners = listeners;
        self
    }

    /// Current FREE/HELD state, generation and lease deadline.
    pub fn state(&self) -> Result<MutexState, MutexError> {
        self.inner.state()
    }
}

impl Mutex for LeaseMutex {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> &str {
        Self::KIND
    }

    fn default_strategy(&self) -> Option<&MutexStrategy> {
        self.inner.default_strategy.as_ref()
    }

    fn execute(
        &self,
        body: ErasedBody<'_>,
        strategy: Option<&MutexStrategy>,
        interrupt: &CancelToken,
    ) -> Result<(), MutexError> {
        self.inner.execute(body, strategy, interrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::MutexExt;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn leased(lease: Duration) -> MutexStrategy {
        MutexStrategy::builder().lease(lease).build()
    }

    #[test]
    fn simple_acquire_returns_value_and_frees() {
        let mutex = LeaseMutex::new("simple");
        assert_eq!(mutex.kind(), LeaseMutex::KIND);
        let value = mutex.acquire(|_| Ok::<_, MutexError>(42)).unwrap();
        assert_eq!(value, 42);

        let state = mutex.state().unwrap();
        assert!(state.is_free());
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn strategy_acquire_returns_value() {
        let mutex = LeaseMutex::new("strategy");
        let strategy = MutexStrategy::builder()
            .wait(Duration::from_millis(100))
            .lease(Duration::from_secs(1))
            .build();
        let value = mutex.acquire_with(|_| Ok::<_, MutexError>(42), &strategy).unwrap();
        assert_eq!(value, 42);
        assert!(mutex.state().unwrap().is_free());
    }

    #[test]
    fn mutex_error_passes_through() {
        let mutex = LeaseMutex::new("passthrough");
        let err = mutex
            .acquire(|_| {
                Err::<(), _>(MutexError::with_cause(
                    "Original mutex error",
                    io::Error::new(io::ErrorKind::Other, "root"),
                ))
            })
            .unwrap_err();
        assert_eq!(err.message(), "Original mutex error");
        assert_eq!(err.cause().unwrap().to_string(), "root");
    }

    #[test]
    fn other_errors_are_wrapped() {
        let mutex = LeaseMutex::new("wrapped");
        let err = mutex
            .acquire(|_| Err::<(), _>(io::Error::new(io::ErrorKind::Other, "Disk full")))
            .unwrap_err();
        assert!(err.message().contains("Unexpected exception"));
        let cause = err.cause().unwrap().downcast_ref::<io::Error>().unwrap();
        assert_eq!(cause.to_string(), "Disk full");
    }

    #[test]
    fn lock_released_after_body_error() {
        let mutex = LeaseMutex::new("error-release");
        let _ = mutex.acquire(|_| Err::<(), _>(MutexError::new("boom")));
        assert!(mutex.state().unwrap().is_free());
        assert_eq!(mutex.acquire(|_| Ok::<_, MutexError>(1)).unwrap(), 1);
    }

    #[test]
    fn lease_sets_deadline_while_held() {
        let mutex = LeaseMutex::new("deadline");
        let deadline_seen = mutex
            .acquire_with(
                |_| Ok::<_, MutexError>(mutex.state().unwrap().lease_deadline.is_some()),
                &leased(Duration::from_secs(5)),
            )
            .unwrap();
        assert!(deadline_seen);
        assert_eq!(mutex.state().unwrap().lease_deadline, None);
    }

    #[test]
    fn lease_expiry_cancels_token_and_reports() {
        let mutex = LeaseMutex::new("expiry");
        let err = mutex
            .acquire_with(
                |lease| {
                    lease.sleep(Duration::from_secs(5))?;
                    Ok::<_, crate::Interrupted>("should not complete")
                },
                &leased(Duration::from_millis(50)),
            )
            .unwrap_err();

        assert!(err.message().contains("lease time exceeded"));
        assert!(err.cause().unwrap().downcast_ref::<crate::Interrupted>().is_some());
        let state = mutex.state().unwrap();
        assert!(state.is_free());
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn lease_expiry_reported_even_when_body_succeeds() {
        let mutex = LeaseMutex::new("ignores-cancel");
        let err = mutex
            .acquire_with(
                |_| {
                    thread::sleep(Duration::from_millis(150));
                    Ok::<_, MutexError>(7)
                },
                &leased(Duration::from_millis(30)),
            )
            .unwrap_err();
        assert!(err.message().contains("lease time exceeded"));
        assert!(err.cause().is_none());
    }

    #[test]
    fn zero_wait_times_out_while_held() {
        let mutex = Arc::new(LeaseMutex::new("busy"));
        let (held_tx, held_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let holder = {
            let mutex = mutex.clone();
            thread::spawn(move || {
                mutex.acquire(|_| {
                    held_tx.send(()).unwrap();
                    done_rx.recv().unwrap();
                    Ok::<_, MutexError>(())
                })
            })
        };
        held_rx.recv().unwrap();

        let strategy = MutexStrategy::builder()
            .wait(Duration::ZERO)
            .retries(2)
            .retry_delay(Duration::from_millis(10))
            .build();
        let ran = AtomicBool::new(false);
        let err = mutex
            .acquire_with(
                |_| {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, MutexError>(())
                },
                &strategy,
            )
            .unwrap_err();
        assert!(err.message().contains("after 3 attempts"));
        assert!(!ran.load(Ordering::SeqCst));

        done_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();
    }

    #[test]
    fn default_strategy_is_used_by_acquire_default() {
        let mutex = LeaseMutex::new("defaults").with_default_strategy(leased(Duration::from_millis(30)));
        assert!(mutex.default_strategy().is_some());
        let err = mutex
            .acquire_default(|lease| {
                lease.sleep(Duration::from_secs(5))?;
                Ok::<_, crate::Interrupted>(())
            })
            .unwrap_err();
        assert!(err.message().contains("lease time exceeded"));
    }

    #[test]
    fn panicking_body_releases_lock() {
        let mutex = Arc::new(LeaseMutex::new("panics"));
        let result = {
            let mutex = mutex.clone();
            thread::spawn(move || {
                mutex.acquire_with(
                    |_| -> Result<(), MutexError> { panic!("body panicked") },
                    &leased(Duration::from_secs(5)),
                )
            })
            .join()
        };
        assert!(result.is_err());
        assert!(mutex.state().unwrap().is_free());
    }
}
