//! Cooperative cancellation.
//!
//! A running critical section cannot be stopped from another thread, so lease
//! expiry and caller interruption are both expressed through a `CancelToken`:
//! the mutex hands one to the protected body, and callers may pass their own to
//! interrupt lock waits and retry sleeps.
//!
//! Bodies observe cancellation by polling [`CancelToken::is_cancelled`], calling
//! [`CancelToken::checkpoint`] between steps, or sleeping through
//! [`CancelToken::sleep`], which wakes early once the token is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Returned when a cancellable wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted")]
pub struct Interrupted;

struct Inner {
    cancelled: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Shared cancellation flag. Clones observe the same state.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                gate: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Request cancellation and wake every sleeper. Idempotent.
    pub fn cancel(&self) {
        let _gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Interrupted)` once cancellation has been requested.
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Err(Interrupted)` if the token
    /// is (or becomes) cancelled.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now().checked_add(duration);
        let mut gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            self.checkpoint()?;
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    deadline - now
                }
                None => duration,
            };
            gate = self
                .inner
                .wake
                .wait_timeout(gate, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
