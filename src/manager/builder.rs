use std::collections::HashMap;
use std::sync::Arc;

use super::MutexManager;
use crate::config::{ConfigError, ManagerConfig};
use crate::events::{Listeners, MutexListener};
use crate::factory::{LeaseMutexFactory, MutexFactory};
use crate::strategy::MutexStrategy;

/// Configures factories, listeners and strategies, then builds one manager.
///
/// `build` is idempotent: the first call builds the manager and every later
/// call on the same builder returns that same instance, ignoring changes made
/// in between.
#[derive(Default)]
pub struct MutexManagerBuilder {
    factories: HashMap<String, Arc<dyn MutexFactory>>,
    listeners: Listeners,
    default_strategy: Option<MutexStrategy>,
    strategies: HashMap<String, MutexStrategy>,
    built: Option<Arc<MutexManager>>,
}

impl MutexManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for names of kind `kind`, replacing any previous one.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is blank.
    pub fn with_factory(mut self, kind: &str, factory: Arc<dyn MutexFactory>) -> Self {
        let kind = kind.trim();
        assert!(!kind.is_empty(), "mutex factory kind cannot be blank");
        self.factories.insert(kind.to_string(), factory);
        self
    }

    /// Attach a listener to mutexes created by the fallback factory.
    ///
    /// Registered factories carry their own listeners.
    pub fn with_listener(mut self, listener: Arc<dyn MutexListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_default_strategy(mut self, strategy: MutexStrategy) -> Self {
        self.default_strategy = Some(strategy);
        self
    }

    pub fn with_strategy(mut self, name: &str, strategy: MutexStrategy) -> Self {
        self.strategies.insert(name.to_string(), strategy);
        self
    }

    /// Apply a configuration; its default strategy and named strategies
    /// replace the ones set so far.
    pub fn with_config(mut self, config: &ManagerConfig) -> Result<Self, ConfigError> {
        let resolved = config.resolve()?;
        if resolved.default_strategy.is_some() {
            self.default_strategy = resolved.default_strategy;
        }
        self.strategies.extend(resolved.strategies);
        Ok(self)
    }

    pub fn build(&mut self) -> Arc<MutexManager> {
        if let Some(manager) = &self.built {
            return manager.clone();
        }
        let manager = Arc::new(MutexManager::from_parts(
            self.factories.clone(),
            LeaseMutexFactory::new().with_listeners(self.listeners.clone()),
            self.default_strategy.clone(),
            self.strategies.clone(),
        ));
        self.built = Some(manager.clone());
        manager
    }
}
