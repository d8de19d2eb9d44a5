use std::sync::Arc;

use tracing::debug;

use crate::error::MutexError;
use crate::events::{Listeners, MutexListener};
use crate::mutex::{LeaseMutex, Mutex, SynchronizedMutex};
use crate::name::NameError;
use crate::strategy::MutexStrategy;

/// Creates fresh mutex instances of one kind.
///
/// Every call returns a new instance; caching per name is the manager's job.
/// Names are trimmed before use and must not be blank.
pub trait MutexFactory: Send + Sync {
    fn create(&self, name: &str) -> Result<Arc<dyn Mutex>, MutexError>;

    /// Create a mutex whose default strategy is `strategy`.
    fn create_with_strategy(
        &self,
        name: &str,
        strategy: &MutexStrategy,
    ) -> Result<Arc<dyn Mutex>, MutexError>;
}

/// Factory for [`LeaseMutex`], the default kind.
///
/// Listeners attached here are shared by every mutex it creates.
#[derive(Clone, Default)]
pub struct LeaseMutexFactory {
    listeners: Listeners,
}

impl LeaseMutexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn MutexListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub(crate) fn with_listeners(mut self, listeners: Listeners) -> Self {
        self.listeners = listeners;
        self
    }

    fn build(&self, name: &str) -> Result<LeaseMutex, MutexError> {
        let name = validate(name)?;
        debug!(mutex = %name, listeners = self.listeners.len(), "creating lease mutex");
        Ok(LeaseMutex::new(name).with_listeners(self.listeners.clone()))
    }
}

impl MutexFactory for LeaseMutexFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Mutex>, MutexError> {
        Ok(Arc::new(self.build(name)?))
    }

    fn create_with_strategy(
        &self,
        name: &str,
        strategy: &MutexStrategy,
    ) -> Result<Arc<dyn Mutex>, MutexError> {
        Ok(Arc::new(self.build(name)?.with_default_strategy(strategy.clone())))
    }
}

/// Factory for [`SynchronizedMutex`], conventionally registered as kind `"sync"`.
#[derive(Clone, Default)]
pub struct SynchronizedMutexFactory {
    listeners: Listeners,
}

impl SynchronizedMutexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn MutexListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn build(&self, name: &str) -> Result<SynchronizedMutex, MutexError> {
        let name = validate(name)?;
        debug!(mutex = %name, listeners = self.listeners.len(), "creating synchronized mutex");
        Ok(SynchronizedMutex::new(name).with_listeners(self.listeners.clone()))
    }
}

impl MutexFactory for SynchronizedMutexFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Mutex>, MutexError> {
        Ok(Arc::new(self.build(name)?))
    }

    fn create_with_strategy(
        &self,
        name: &str,
        strategy: &MutexStrategy,
    ) -> Result<Arc<dyn Mutex>, MutexError> {
        Ok(Arc::new(self.build(name)?.with_default_strategy(strategy.clone())))
    }
}

fn validate(name: &str) -> Result<&str, MutexError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MutexError::with_cause(
            format!("Invalid mutex name '{}'", name),
            NameError::BlankName,
        ));
    }
    Ok(trimmed)
}
