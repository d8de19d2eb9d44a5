//! Lease watchdog for a single held acquisition.
//!
//! Arming spawns a named thread that waits on a disarm channel for at most the
//! lease time. If the body finishes first, the holder disarms it. If the lease
//! runs out first, the watchdog force-releases the generation it was armed for
//! and cancels the body's token.

use std::io;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, warn};

use super::state::LockCore;
use crate::cancel::CancelToken;
use crate::events::{Listeners, MutexEvent};

pub(crate) struct Watchdog {
    disarm_tx: Sender<()>,
    handle: Option<JoinHandle<bool>>,
}

impl Watchdog {
    pub fn arm(
        mutex: &str,
        core: Arc<LockCore>,
        generation: u64,
        lease: Duration,
        token: CancelToken,
        listeners: Listeners,
    ) -> io::Result<Self> {
        let (disarm_tx, disarm_rx) = channel();
        let name = mutex.to_string();

        let handle = thread::Builder::new()
            .name(thread_name(&name))
            .spawn(move || match disarm_rx.recv_timeout(lease) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
                Err(RecvTimeoutError::Timeout) => match core.release(generation) {
                    Ok(true) => {
                        warn!(
                            mutex = %name,
                            generation,
                            lease_ms = lease.as_millis() as u64,
                            "lease expired, lock force-released and execution cancelled"
                        );
                        token.cancel();
                        listeners.notify(MutexEvent::LeaseExpired {
                            mutex: name,
                            generation,
                            lease_ms: lease.as_millis() as u64,
                        });
                        true
                    }
                    // Holder released first.
                    Ok(false) => false,
                    Err(e) => {
                        error!(mutex = %name, error = %e, "lease watchdog could not release lock");
                        false
                    }
                },
            })?;

        Ok(Self {
            disarm_tx,
            handle: Some(handle),
        })
    }

    /// Stop the watchdog and wait for its thread.
    /// Returns `true` if the lease had already fired.
    pub fn disarm(mut self) -> bool {
        let _ = self.disarm_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => false,
        }
    }
}

/// Thread names may not contain NUL, mutex names may.
fn thread_name(mutex: &str) -> String {
    let mut name = String::from("mutex-lease-");
    name.extend(mutex.chars().filter(|c| *c != '\0'));
    name
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        let _ = self.disarm_tx.send(());
        // Don't join on drop: this runs while unwinding out of a panicking body.
    }
}
