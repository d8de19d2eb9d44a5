//! Named mutexes and the acquisition protocol.
//!
//! - `Mutex` - object-safe trait every mutex kind implements
//! - `MutexExt` - typed `acquire` helpers layered over any `Mutex`
//! - `LeaseMutex` - the default kind: blocking, bounded and leased acquisition
//! - `SynchronizedMutex` - the same protocol with waiters served in arrival order
//!
//! ## Example
//!
//! ```ignore
//! use lease_mutex::{LeaseMutex, MutexExt, MutexStrategy};
//! use std::time::Duration;
//!
//! let mutex = LeaseMutex::new("orders");
//!
//! let total = mutex.acquire(|_| Ok::<_, MutexError>(40 + 2))?;
//!
//! let strategy = MutexStrategy::builder()
//!     .wait(Duration::from_millis(100))
//!     .lease(Duration::from_secs(1))
//!     .build();
//! mutex.acquire_with(|lease| {
//!     lease.checkpoint()?;
//!     Ok::<_, MutexError>(())
//! }, &strategy)?;
//! ```

mod exclusive;
mod lease;
mod state;
mod synchronized;
mod watchdog;

pub use lease::LeaseMutex;
pub use state::MutexState;
pub use synchronized::SynchronizedMutex;

use crate::cancel::CancelToken;
use crate::error::{BoxError, MutexError};
use crate::strategy::MutexStrategy;

/// Type-erased critical section, invoked at most once per acquisition.
pub type ErasedBody<'a> = &'a mut dyn FnMut(&CancelToken) -> Result<(), BoxError>;

/// One exclusion domain.
///
/// Implementations hold the lock while `execute` runs `body` on the calling
/// thread, apply `strategy` (wait budget, retries, lease) when given, and treat
/// `interrupt` as the caller's request to abandon lock waits and retry sleeps.
///
/// A body error that is a [`MutexError`] must be returned unchanged; any other
/// body error is wrapped in a `MutexError` carrying it as the cause.
pub trait Mutex: Send + Sync {
    fn name(&self) -> &str;

    /// Implementation kind, as used in `kind::instance_id` names.
    fn kind(&self) -> &str;

    /// Strategy applied by [`MutexExt::acquire_default`].
    fn default_strategy(&self) -> Option<&MutexStrategy> {
        None
    }

    fn execute(
        &self,
        body: ErasedBody<'_>,
        strategy: Option<&MutexStrategy>,
        interrupt: &CancelToken,
    ) -> Result<(), MutexError>;
}

/// Typed acquisition over any [`Mutex`], including `dyn Mutex`.
///
/// The body receives the hold's [`CancelToken`]; it is cancelled when the lease
/// expires and never otherwise.
pub trait MutexExt: Mutex {
    /// Block until the lock is free, run `body`, release. No lease.
    fn acquire<R, E, F>(&self, body: F) -> Result<R, MutexError>
    where
        F: FnOnce(&CancelToken) -> Result<R, E>,
        E: Into<BoxError>,
    {
        self.acquire_cancellable(body, None, &CancelToken::new())
    }

    /// Acquire under `strategy`: bounded waits, retries and an optional lease.
    fn acquire_with<R, E, F>(&self, body: F, strategy: &MutexStrategy) -> Result<R, MutexError>
    where
        F: FnOnce(&CancelToken) -> Result<R, E>,
        E: Into<BoxError>,
    {
        self.acquire_cancellable(body, Some(strategy), &CancelToken::new())
    }

    /// Acquire under the mutex's default strategy, or unbounded if it has none.
    fn acquire_default<R, E, F>(&self, body: F) -> Result<R, MutexError>
    where
        F: FnOnce(&CancelToken) -> Result<R, E>,
        E: Into<BoxError>,
    {
        self.acquire_cancellable(body, self.default_strategy(), &CancelToken::new())
    }

    /// Like [`MutexExt::acquire_with`], but cancelling `interrupt` aborts lock
    /// waits and retry sleeps with an "interrupted" `MutexError`.
    fn acquire_cancellable<R, E, F>(
        &self,
        body: F,
        strategy: Option<&MutexStrategy>,
        interrupt: &CancelToken,
    ) -> Result<R, MutexError>
    where
        F: FnOnce(&CancelToken) -> Result<R, E>,
        E: Into<BoxError>,
    {
        let mut body = Some(body);
        let mut output = None;
        self.execute(
            &mut |token: &CancelToken| -> Result<(), BoxError> {
                let body = body
                    .take()
                    .ok_or_else(|| MutexError::new("mutex body invoked more than once"))?;
                output = Some(body(token).map_err(Into::<BoxError>::into)?);
                Ok(())
            },
            strategy,
            interrupt,
        )?;
        output.ok_or_else(|| MutexError::new("mutex body did not run"))
    }
}

impl<M: Mutex + ?Sized> MutexExt for M {}
