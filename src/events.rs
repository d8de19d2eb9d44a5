//! Lifecycle notifications for mutex holds.
//!
//! Listeners are attached to factories (or the manager builder) and receive a
//! [`MutexEvent`] for every acquisition, release, timeout, interruption and lease
//! expiry. `LogListener` renders events as text lines; `EmitterListener`
//! (feature `emitter`) forwards them to an in-process `EventEmitter`.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

#[cfg(feature = "emitter")]
use crate::EventEmitter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MutexEvent {
    Acquired {
        mutex: String,
        attempt: u32,
        generation: u64,
    },
    Released {
        mutex: String,
        generation: u64,
    },
    AcquireTimedOut {
        mutex: String,
        attempts: u32,
    },
    Interrupted {
        mutex: String,
    },
    LeaseExpired {
        mutex: String,
        generation: u64,
        lease_ms: u64,
    },
}

impl MutexEvent {
    /// Stable event name, matching the serialized `event` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            MutexEvent::Acquired { .. } => "acquired",
            MutexEvent::Released { .. } => "released",
            MutexEvent::AcquireTimedOut { .. } => "acquire_timed_out",
            MutexEvent::Interrupted { .. } => "interrupted",
            MutexEvent::LeaseExpired { .. } => "lease_expired",
        }
    }

    pub fn mutex(&self) -> &str {
        match self {
            MutexEvent::Acquired { mutex, .. }
            | MutexEvent::Released { mutex, .. }
            | MutexEvent::AcquireTimedOut { mutex, .. }
            | MutexEvent::Interrupted { mutex }
            | MutexEvent::LeaseExpired { mutex, .. } => mutex,
        }
    }
}

/// Receives mutex lifecycle events.
///
/// Called synchronously on the thread that caused the event (the lease watchdog
/// thread for `LeaseExpired`), so implementations should return quickly.
pub trait MutexListener: Send + Sync {
    fn on_event(&self, event: &MutexEvent);
}

/// Fan-out over the listeners attached to one mutex.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    listeners: Vec<Arc<dyn MutexListener>>,
}

impl Listeners {
    pub fn push(&mut self, listener: Arc<dyn MutexListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify(&self, event: MutexEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

/// Renders events as `[MUTEX] <kind> <json>` lines, either through `tracing`
/// or into a shared buffer.
pub struct LogListener {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for LogListener {
    fn default() -> Self {
        Self::new()
    }
}

impl LogListener {
    pub fn new() -> Self {
        LogListener { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogListener {
            buffer: Some(buffer),
        }
    }
}

impl MutexListener for LogListener {
    fn on_event(&self, event: &MutexEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        let line = format!("[MUTEX] {} {}", event.kind(), payload);
        match &self.buffer {
            // A poisoned buffer only means another writer panicked mid-push.
            Some(buffer) => match buffer.lock() {
                Ok(mut buffer) => buffer.push(line),
                Err(poisoned) => poisoned.into_inner().push(line),
            },
            None => info!(mutex = event.mutex(), "{}", line),
        }
    }
}

/// Forwards events to an `EventEmitter`, using [`MutexEvent::kind`] as the
/// event name and the JSON payload as a `String` value.
/// Requires the `emitter` feature to be enabled.
#[cfg(feature = "emitter")]
pub struct EmitterListener {
    emitter: Mutex<EventEmitter>,
}

#[cfg(feature = "emitter")]
impl EmitterListener {
    pub fn new(emitter: EventEmitter) -> Self {
        EmitterListener {
            emitter: Mutex::new(emitter),
        }
    }
}

#[cfg(feature = "emitter")]
impl MutexListener for EmitterListener {
    fn on_event(&self, event: &MutexEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        let mut emitter = match self.emitter.lock() {
            Ok(emitter) => emitter,
            Err(poisoned) => poisoned.into_inner(),
        };
        emitter.emit(event.kind(), payload);
    }
}
