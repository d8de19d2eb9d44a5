use std::sync::Arc;

use tracing::trace;

use super::exclusive::Exclusive;
use super::state::{LockCore, MutexState};
use super::{ErasedBody, Mutex};
use crate::cancel::CancelToken;
use crate::error::MutexError;
use crate::events::{Listeners, MutexListener};
use crate::strategy::MutexStrategy;

/// Fair mutex kind: waiters take the lock in the order they started waiting.
///
/// A caller that finds the lock free but other callers already queued joins the
/// back of the queue, so a zero-wait attempt fails while anyone is waiting.
/// Leases, retries and error handling behave exactly as for
/// [`LeaseMutex`](crate::LeaseMutex).
pub struct SynchronizedMutex {
    inner: Exclusive,
}

impl SynchronizedMutex {
    pub const KIND: &'static str = "sync";

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        trace!(mutex = %name, "synchronized mutex created");
        SynchronizedMutex {
            inner: Exclusive::new(name, LockCore::fifo()),
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

    /// Current state, including how many callers are queued.
    pub fn state(&self) -> Result<MutexState, MutexError> {
        self.inner.state()
    }
}

impl Mutex for SynchronizedMutex {
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
    use std::sync::mpsc;
    use std::sync::Mutex as StdMutex;
    use std::thread;
    use std::time::Duration;

    fn wait_for_waiters(mutex: &SynchronizedMutex, waiters: usize) {
        while mutex.state().unwrap().waiters < waiters {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn callers_run_in_arrival_order() {
        let mutex = Arc::new(SynchronizedMutex::new("fair"));
        assert_eq!(mutex.kind(), "sync");
        let order = Arc::new(StdMutex::new(Vec::new()));
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

        let waiters: Vec<_> = (0..5)
            .map(|i| {
                let handle = {
                    let mutex = mutex.clone();
                    let order = order.clone();
                    thread::spawn(move || {
                        mutex.acquire(|_| {
                            order.lock().unwrap().push(i);
                            Ok::<_, MutexError>(())
                        })
                    })
                };
                wait_for_waiters(&mutex, i + 1);
                handle
            })
            .collect();

        done_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();
        for waiter in waiters {
            waiter.join().unwrap().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(mutex.state().unwrap().waiters, 0);
    }

    #[test]
    fn lease_is_enforced() {
        let mutex = SynchronizedMutex::new("fair-lease");
        let strategy = MutexStrategy::builder()
            .lease(Duration::from_millis(40))
            .build();
        let err = mutex
            .acquire_with(
                |lease| {
                    lease.sleep(Duration::from_secs(5))?;
                    Ok::<_, crate::Interrupted>(())
                },
                &strategy,
            )
            .unwrap_err();
        assert!(err.message().starts_with("Mutex lease time exceeded"));
        assert!(mutex.state().unwrap().is_free());
    }

    #[test]
    fn exhausted_attempts_report_count() {
        let mutex = Arc::new(SynchronizedMutex::new("fair-busy"));
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
            .wait(Duration::from_millis(5))
            .retries(1)
            .retry_delay(Duration::from_millis(5))
            .build();
        let err = mutex
            .acquire_with(|_| Ok::<_, MutexError>(()), &strategy)
            .unwrap_err();
        assert!(err
            .message()
            .starts_with("Failed to acquire mutex 'fair-busy' after 2 attempts"));

        done_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();
    }
}
