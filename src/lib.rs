mod cancel;
mod config;
mod error;
mod events;
mod factory;
pub mod functions;
mod manager;
mod mutex;
mod name;
mod strategy;
mod supply;

pub use cancel::{CancelToken, Interrupted};
pub use config::{ConfigError, ManagerConfig};
pub use error::{BoxError, MutexError};
#[cfg(feature = "emitter")]
pub use events::EmitterListener;
pub use events::{LogListener, MutexEvent, MutexListener};
pub use factory::{LeaseMutexFactory, MutexFactory, SynchronizedMutexFactory};
pub use manager::{ManagerSummary, MutexManager, MutexManagerBuilder};
pub use mutex::{ErasedBody, LeaseMutex, Mutex, MutexExt, MutexState, SynchronizedMutex};
pub use name::{MutexName, NameError};
pub use strategy::{MutexStrategy, MutexStrategyBuilder, StrategyError, StrategySpec, TimeUnit};
pub use supply::Supplier;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
