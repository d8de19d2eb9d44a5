//! Acquisition policy: wait budget, retries and lease time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit attached to every raw strategy magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert a non-negative magnitude in this unit to a `Duration`.
    /// Returns `None` on overflow.
    pub fn to_duration(self, magnitude: u64) -> Option<Duration> {
        match self {
            TimeUnit::Nanoseconds => Some(Duration::from_nanos(magnitude)),
            TimeUnit::Microseconds => Some(Duration::from_micros(magnitude)),
            TimeUnit::Milliseconds => Some(Duration::from_millis(magnitude)),
            TimeUnit::Seconds => Some(Duration::from_secs(magnitude)),
            TimeUnit::Minutes => magnitude.checked_mul(60).map(Duration::from_secs),
            TimeUnit::Hours => magnitude.checked_mul(3_600).map(Duration::from_secs),
            TimeUnit::Days => magnitude.checked_mul(86_400).map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("retry count cannot be negative: {0}")]
    NegativeRetries(i64),
    #[error("retry interval cannot be negative: {0}")]
    NegativeRetryInterval(i64),
    #[error("retry count too large: {0}")]
    TooManyRetries(i64),
    #[error("{field} of {magnitude} {unit:?} does not fit in a duration")]
    Overflow {
        field: &'static str,
        magnitude: i64,
        unit: TimeUnit,
    },
}

/// Policy bundle for one acquisition call.
///
/// - `wait_time == None` waits indefinitely for the lock on each attempt.
/// - `lease_time == None` disables lease enforcement.
/// - `retries == 0` is a single attempt.
///
/// The wait budget applies per attempt, so the worst case before giving up is
/// roughly `max_attempts * wait_time + retries * retry_delay`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutexStrategy {
    wait_time: Option<Duration>,
    retries: u32,
    retry_delay: Duration,
    lease_time: Option<Duration>,
}

impl MutexStrategy {
    /// Build a strategy from raw magnitudes, each paired with its unit.
    ///
    /// A negative `wait_time` means wait indefinitely; a `lease_time <= 0` means
    /// no lease. `retries` and `retry_interval` must not be negative.
    pub fn new(
        wait_time: i64,
        wait_unit: TimeUnit,
        retries: i64,
        retry_interval: i64,
        retry_unit: TimeUnit,
        lease_time: i64,
        lease_unit: TimeUnit,
    ) -> Result<Self, StrategyError> {
        if retries < 0 {
            return Err(StrategyError::NegativeRetries(retries));
        }
        if retry_interval < 0 {
            return Err(StrategyError::NegativeRetryInterval(retry_interval));
        }
        let retries = u32::try_from(retries).map_err(|_| StrategyError::TooManyRetries(retries))?;

        let wait_time = if wait_time < 0 {
            None
        } else {
            Some(to_duration("wait time", wait_time, wait_unit)?)
        };
        let lease_time = if lease_time <= 0 {
            None
        } else {
            Some(to_duration("lease time", lease_time, lease_unit)?)
        };

        Ok(MutexStrategy {
            wait_time,
            retries,
            retry_delay: to_duration("retry interval", retry_interval, retry_unit)?,
            lease_time,
        })
    }

    pub fn builder() -> MutexStrategyBuilder {
        MutexStrategyBuilder::default()
    }

    /// Per-attempt wait budget; `None` waits indefinitely.
    pub fn wait_time(&self) -> Option<Duration> {
        self.wait_time
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Maximum hold time; `None` means the body may run unbounded.
    pub fn lease_time(&self) -> Option<Duration> {
        self.lease_time
    }

    /// Total number of lock attempts: one plus the retries.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

fn to_duration(field: &'static str, magnitude: i64, unit: TimeUnit) -> Result<Duration, StrategyError> {
    u64::try_from(magnitude)
        .ok()
        .and_then(|m| unit.to_duration(m))
        .ok_or(StrategyError::Overflow {
            field,
            magnitude,
            unit,
        })
}

/// Typed builder for [`MutexStrategy`].
///
/// ```ignore
/// let strategy = MutexStrategy::builder()
///     .wait(Duration::from_millis(100))
///     .retries(3)
///     .retry_delay(Duration::from_millis(50))
///     .lease(Duration::from_secs(1))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MutexStrategyBuilder {
    strategy: MutexStrategy,
}

impl MutexStrategyBuilder {
    pub fn wait(mut self, wait: Duration) -> Self {
        self.strategy.wait_time = Some(wait);
        self
    }

    pub fn wait_indefinitely(mut self) -> Self {
        self.strategy.wait_time = None;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.strategy.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.strategy.retry_delay = delay;
        self
    }

    /// Set the lease. A zero lease disables enforcement.
    pub fn lease(mut self, lease: Duration) -> Self {
        self.strategy.lease_time = if lease.is_zero() { None } else { Some(lease) };
        self
    }

    pub fn no_lease(mut self) -> Self {
        self.strategy.lease_time = None;
        self
    }

    pub fn build(self) -> MutexStrategy {
        self.strategy
    }
}

/// Declarative form of a strategy, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub wait_time: i64,
    pub wait_unit: TimeUnit,
    pub retries: i64,
    pub retry_interval: i64,
    pub retry_unit: TimeUnit,
    pub lease_time: i64,
    pub lease_unit: TimeUnit,
}

impl TryFrom<&StrategySpec> for MutexStrategy {
    type Error = StrategyError;

    fn try_from(spec: &StrategySpec) -> Result<Self, Self::Error> {
        MutexStrategy::new(
            spec.wait_time,
            spec.wait_unit,
            spec.retries,
            spec.retry_interval,
            spec.retry_unit,
            spec.lease_time,
            spec.lease_unit,
        )
    }
}
