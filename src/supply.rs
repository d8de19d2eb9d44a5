//! Supply-style access for external collaborators such as a DI container.

use std::sync::Arc;

use crate::error::MutexError;
use crate::manager::MutexManager;
use crate::mutex::Mutex;
use crate::name::MutexName;

/// Resolves a value from an owner context.
pub trait Supplier<C: ?Sized> {
    type Supplied;
    type Error;

    fn supply(&self, context: &C) -> Result<Self::Supplied, Self::Error>;
}

impl Supplier<MutexName> for MutexManager {
    type Supplied = Arc<dyn Mutex>;
    type Error = MutexError;

    fn supply(&self, name: &MutexName) -> Result<Arc<dyn Mutex>, MutexError> {
        self.mutex(name)
    }
}

impl Supplier<str> for MutexManager {
    type Supplied = Arc<dyn Mutex>;
    type Error = MutexError;

    fn supply(&self, name: &str) -> Result<Arc<dyn Mutex>, MutexError> {
        self.mutex_named(name)
    }
}
