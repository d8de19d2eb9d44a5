use std::error::Error;
use std::fmt;

use crate::cancel::Interrupted;

/// Boxed, thread-safe error used for causes and body failures.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The single failure type of the mutex subsystem.
///
/// Every failure carries the fixed code [`MutexError::CODE`], a message and an
/// optional cause. The cause is exposed through [`Error::source`], so the full
/// chain of a body failure survives the trip through `acquire`.
#[derive(Debug)]
pub struct MutexError {
    message: String,
    cause: Option<BoxError>,
}

impl MutexError {
    /// Error code shared by every `MutexError`.
    pub const CODE: &'static str = "MUTEX_ERROR";

    pub fn new(message: impl Into<String>) -> Self {
        MutexError {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        MutexError {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Build an error whose message is the cause's own message.
    pub fn from_cause(cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        MutexError {
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &'static str {
        Self::CODE
    }

    /// The direct cause, if any.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Consume the error and return its cause.
    pub fn into_cause(self) -> Option<BoxError> {
        self.cause
    }
}

impl fmt::Display for MutexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for MutexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

impl From<Interrupted> for MutexError {
    fn from(interrupted: Interrupted) -> Self {
        MutexError::with_cause("Mutex execution interrupted", interrupted)
    }
}
