//! Process-wide registry of named mutexes.
//!
//! `MutexManager` maps each [`MutexName`] to exactly one mutex, created lazily
//! through the factory registered for the name's kind. Kinds without a factory
//! fall back to [`LeaseMutex`](crate::LeaseMutex).
//!
//! ## Example
//!
//! ```ignore
//! use lease_mutex::{MutexExt, MutexManager, MutexName};
//!
//! let manager = MutexManager::builder().build();
//!
//! let name: MutexName = "lease::orders".parse()?;
//! let mutex = manager.mutex(&name)?;
//! mutex.acquire(|_| Ok::<_, MutexError>(()))?;
//! ```

mod builder;

pub use builder::MutexManagerBuilder;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::MutexError;
use crate::factory::{LeaseMutexFactory, MutexFactory};
use crate::mutex::Mutex;
use crate::name::MutexName;
use crate::strategy::MutexStrategy;

/// Registry counts, as reported at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerSummary {
    pub factories: usize,
    pub active_mutexes: usize,
}

impl ManagerSummary {
    pub const CATEGORY: &'static str = "Mutex Manager";

    /// Labelled items in display order.
    pub fn items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Mutex factories", self.factories.to_string()),
            ("Active mutexes", self.active_mutexes.to_string()),
        ]
    }
}

pub struct MutexManager {
    mutexes: RwLock<HashMap<MutexName, Arc<dyn Mutex>>>,
    factories: HashMap<String, Arc<dyn MutexFactory>>,
    fallback: LeaseMutexFactory,
    default_strategy: Option<MutexStrategy>,
    strategies: HashMap<String, MutexStrategy>,
}

impl Default for MutexManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MutexManager {
    /// A manager with no registered factories: every kind uses the fallback.
    pub fn new() -> Self {
        Self::from_parts(
            HashMap::new(),
            LeaseMutexFactory::new(),
            None,
            HashMap::new(),
        )
    }

    pub fn builder() -> MutexManagerBuilder {
        MutexManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        factories: HashMap<String, Arc<dyn MutexFactory>>,
        fallback: LeaseMutexFactory,
        default_strategy: Option<MutexStrategy>,
        strategies: HashMap<String, MutexStrategy>,
    ) -> Self {
        debug!(
            factories = factories.len(),
            strategies = strategies.len(),
            "mutex manager created"
        );
        MutexManager {
            mutexes: RwLock::new(HashMap::new()),
            factories,
            fallback,
            default_strategy,
            strategies,
        }
    }

    /// Get the mutex registered under `name`, creating it on first lookup.
    ///
    /// Concurrent first lookups of the same name create exactly one instance.
    /// A factory error leaves the name unregistered.
    pub fn mutex(&self, name: &MutexName) -> Result<Arc<dyn Mutex>, MutexError> {
        {
            let mutexes = self.mutexes.read().map_err(|_| registry_poisoned())?;
            if let Some(mutex) = mutexes.get(name) {
                return Ok(mutex.clone());
            }
        }

        let mut mutexes = self.mutexes.write().map_err(|_| registry_poisoned())?;
        match mutexes.entry(name.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                debug!(mutex = %name, "creating new mutex");
                let mutex = self.create(name)?;
                Ok(entry.insert(mutex).clone())
            }
        }
    }

    /// Parse `"[kind::]instance_id"` and look it up.
    pub fn mutex_named(&self, name: &str) -> Result<Arc<dyn Mutex>, MutexError> {
        let parsed = MutexName::parse(name).map_err(|e| {
            MutexError::with_cause(format!("Invalid mutex name '{}'", name), e)
        })?;
        self.mutex(&parsed)
    }

    /// A named strategy from the manager's configuration.
    pub fn strategy(&self, name: &str) -> Option<&MutexStrategy> {
        self.strategies.get(name)
    }

    /// Strategy handed to factories when creating mutexes.
    pub fn default_strategy(&self) -> Option<&MutexStrategy> {
        self.default_strategy.as_ref()
    }

    pub fn summary(&self) -> ManagerSummary {
        let active_mutexes = match self.mutexes.read() {
            Ok(mutexes) => mutexes.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        ManagerSummary {
            factories: self.factories.len(),
            active_mutexes,
        }
    }

    fn create(&self, name: &MutexName) -> Result<Arc<dyn Mutex>, MutexError> {
        let factory: &dyn MutexFactory = match self.factories.get(name.kind()) {
            Some(factory) => {
                debug!(mutex = %name, kind = name.kind(), "using registered factory");
                factory.as_ref()
            }
            None => {
                warn!(
                    mutex = %name,
                    kind = name.kind(),
                    "no factory registered for mutex kind, using default lease mutex"
                );
                &self.fallback
            }
        };
        match &self.default_strategy {
            Some(strategy) => factory.create_with_strategy(name.instance_id(), strategy),
            None => factory.create(name.instance_id()),
        }
    }
}

fn registry_poisoned() -> MutexError {
    MutexError::new("Mutex registry poisoned")
}
