//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use lease_mutex::{
    LeaseMutexFactory, LogListener, Mutex as NamedMutex, MutexError, MutexFactory,
    MutexStrategy,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `lease_mutex=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("lease_mutex=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Lease factory that counts how many mutexes it has created.
#[derive(Clone, Default)]
pub struct CountingFactory {
    inner: LeaseMutexFactory,
    created: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        CountingFactory {
            inner: LeaseMutexFactory::new().with_listener(Arc::new(LogListener::with_buffer(buffer))),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl MutexFactory for CountingFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn NamedMutex>, MutexError> {
        let mutex = self.inner.create(name)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(mutex)
    }

    fn create_with_strategy(
        &self,
        name: &str,
        strategy: &MutexStrategy,
    ) -> Result<Arc<dyn NamedMutex>, MutexError> {
        let mutex = self.inner.create_with_strategy(name, strategy)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(mutex)
    }
}

/// Buffered log lines that start with `[MUTEX] <kind>`.
pub fn lines_of(buffer: &Arc<Mutex<Vec<String>>>, kind: &str) -> Vec<String> {
    let prefix = format!("[MUTEX] {} ", kind);
    buffer
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.starts_with(&prefix))
        .cloned()
        .collect()
}
