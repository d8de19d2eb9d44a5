//! Acquisition protocol shared by every mutex kind.
//!
//! `Exclusive` owns one `LockCore` and runs the attempt/retry loop, the lease
//! watchdog and the error passthrough rule. Kinds differ only in how their core
//! hands the lock to waiters.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use super::state::{LockCore, LockError, MutexState};
use super::watchdog::Watchdog;
use super::ErasedBody;
use crate::cancel::CancelToken;
use crate::error::{BoxError, MutexError};
use crate::events::{Listeners, MutexEvent};
use crate::strategy::MutexStrategy;

pub(crate) struct Exclusive {
    name: String,
    core: Arc<LockCore>,
    pub default_strategy: Option<MutexStrategy>,
    pub listeners: Listeners,
}

impl Exclusive {
    pub fn new(name: String, core: LockCore) -> Self {
        Exclusive {
            name,
            core: Arc::new(core),
            default_strategy: None,
            listeners: Listeners::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> Result<MutexState, MutexError> {
        self.core.snapshot().map_err(|e| self.lock_failure(e))
    }

    pub fn execute(
        &self,
        body: ErasedBody<'_>,
        strategy: Option<&MutexStrategy>,
        interrupt: &CancelToken,
    ) -> Result<(), MutexError> {
        let unbounded = MutexStrategy::default();
        let strategy = match strategy {
            Some(strategy) => {
                debug!(
                    mutex = %self.name,
                    wait = ?strategy.wait_time(),
                    retries = strategy.retries(),
                    retry_delay = ?strategy.retry_delay(),
                    lease = ?strategy.lease_time(),
                    "acquiring mutex (strategy)"
                );
                strategy
            }
            None => {
                debug!(mutex = %self.name, "acquiring mutex (simple)");
                &unbounded
            }
        };

        let max_attempts = strategy.max_attempts();
        for attempt in 1..=max_attempts {
            let acquired = self
                .core
                .try_lock_for(strategy.wait_time(), interrupt)
                .map_err(|e| self.lock_failure(e))?;

            if let Some(generation) = acquired {
                trace!(mutex = %self.name, attempt, max_attempts, generation, "mutex acquired");
                self.listeners.notify(MutexEvent::Acquired {
                    mutex: self.name.clone(),
                    attempt,
                    generation,
                });
                return self.run_held(body, generation, strategy.lease_time());
            }

            debug!(mutex = %self.name, attempt, max_attempts, "failed to acquire mutex");
            if attempt < max_attempts {
                interrupt
                    .sleep(strategy.retry_delay())
                    .map_err(|e| self.lock_failure(e.into()))?;
                trace!(mutex = %self.name, "retrying mutex acquisition");
            }
        }

        error!(mutex = %self.name, max_attempts, "failed to acquire mutex, attempts exhausted");
        self.listeners.notify(MutexEvent::AcquireTimedOut {
            mutex: self.name.clone(),
            attempts: max_attempts,
        });
        Err(MutexError::new(format!(
            "Failed to acquire mutex '{}' after {} attempts: timed out waiting for lock",
            self.name, max_attempts
        )))
    }

    fn run_held(
        &self,
        body: ErasedBody<'_>,
        generation: u64,
        lease: Option<Duration>,
    ) -> Result<(), MutexError> {
        let held = HeldLock::new(&self.core, generation);

        let Some(lease) = lease else {
            let outcome = body(&CancelToken::new());
            held.release().map_err(|e| self.lock_failure(e))?;
            self.released(generation);
            return self.settle(outcome);
        };

        let token = CancelToken::new();
        if let Some(deadline) = Instant::now().checked_add(lease) {
            self.core
                .set_lease_deadline(generation, deadline)
                .map_err(|e| self.lock_failure(e))?;
        }
        let watchdog = match Watchdog::arm(
            &self.name,
            self.core.clone(),
            generation,
            lease,
            token.clone(),
            self.listeners.clone(),
        ) {
            Ok(watchdog) => watchdog,
            Err(e) => return Err(self.abandon_hold(held, e)),
        };

        let outcome = body(&token);
        let released = held.release();
        watchdog.disarm();

        if !released.map_err(|e| self.lock_failure(e))? {
            error!(
                mutex = %self.name,
                lease_ms = lease.as_millis() as u64,
                "mutex lease time exceeded, execution was cancelled and lock released"
            );
            let message = format!(
                "Mutex lease time exceeded: {:?} for mutex '{}'. Execution was cancelled.",
                lease, self.name
            );
            return Err(match outcome {
                Ok(()) => MutexError::new(message),
                Err(cause) => MutexError::with_cause(message, cause),
            });
        }

        trace!(mutex = %self.name, "mutex execution completed within lease time");
        self.released(generation);
        self.settle(outcome)
    }

    /// Apply the passthrough/wrap rule to a body outcome.
    fn settle(&self, outcome: Result<(), BoxError>) -> Result<(), MutexError> {
        let Err(err) = outcome else {
            return Ok(());
        };
        match err.downcast::<MutexError>() {
            Ok(err) => {
                warn!(mutex = %self.name, error = %err, "mutex execution failed");
                Err(*err)
            }
            Err(other) => {
                error!(mutex = %self.name, error = %other, "unexpected error in mutex execution");
                Err(MutexError::with_cause(
                    "Unexpected exception during mutex execution",
                    other,
                ))
            }
        }
    }

    /// End a hold whose body never ran because the lease could not be armed.
    fn abandon_hold(&self, held: HeldLock<'_>, cause: io::Error) -> MutexError {
        let generation = held.generation;
        error!(mutex = %self.name, error = %cause, "failed to arm lease watchdog");
        match held.release() {
            Ok(true) => self.released(generation),
            Ok(false) => {}
            Err(e) => return self.lock_failure(e),
        }
        MutexError::with_cause(
            format!("Failed to arm lease watchdog for mutex '{}'", self.name),
            cause,
        )
    }

    fn released(&self, generation: u64) {
        trace!(mutex = %self.name, generation, "mutex released");
        self.listeners.notify(MutexEvent::Released {
            mutex: self.name.clone(),
            generation,
        });
    }

    fn lock_failure(&self, err: LockError) -> MutexError {
        match err {
            LockError::Interrupted(interrupted) => {
                warn!(mutex = %self.name, "mutex acquisition interrupted");
                self.listeners.notify(MutexEvent::Interrupted {
                    mutex: self.name.clone(),
                });
                MutexError::with_cause(
                    format!("Mutex acquisition interrupted: '{}'", self.name),
                    interrupted,
                )
            }
            LockError::Poisoned => {
                error!(mutex = %self.name, "mutex state poisoned");
                MutexError::with_cause(format!("Mutex '{}' is unusable", self.name), err)
            }
        }
    }
}

/// Releases the hold when dropped, so a panicking body cannot leave the lock held.
struct HeldLock<'a> {
    core: &'a LockCore,
    generation: u64,
    released: bool,
}

impl<'a> HeldLock<'a> {
    fn new(core: &'a LockCore, generation: u64) -> Self {
        HeldLock {
            core,
            generation,
            released: false,
        }
    }

    /// Returns `false` if the watchdog had already revoked this hold.
    fn release(mut self) -> Result<bool, LockError> {
        self.released = true;
        self.core.release(self.generation)
    }
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.core.release(self.generation);
        }
    }
}
