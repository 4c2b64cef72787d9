//! Clock abstraction for testable timing.
//!
//! Queue redelivery visibility and worker polling both depend on wall-clock
//! time. Injecting the clock lets tests drive backoff schedules
//! deterministically instead of sleeping through them.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Time source for queue visibility and worker pacing.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Waits for the given duration. Test clocks advance immediately.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by the system time and tokio sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Time only moves when [`TestClock::advance`] is called (or a worker sleeps,
/// which advances by the requested amount and yields). Clones share the same
/// underlying instant.
#[derive(Debug, Clone)]
pub struct TestClock {
    micros_since_epoch: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock pinned to the current system time.
    pub fn new() -> Self {
        Self { micros_since_epoch: Arc::new(AtomicI64::new(Utc::now().timestamp_micros())) }
    }

    /// Creates a test clock pinned to a specific start time.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { micros_since_epoch: Arc::new(AtomicI64::new(start.timestamp_micros())) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        self.micros_since_epoch.fetch_add(micros, Ordering::AcqRel);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros_since_epoch.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}
