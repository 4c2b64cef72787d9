//! Redelivery backoff schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed ordered sequence of waits between successive deliveries of the
/// same message.
///
/// The wait after the n-th delivery is the n-th entry; the last entry is
/// reused for every attempt beyond the sequence length. An empty schedule
/// defers to the consumer binding's ack-wait window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSchedule(Vec<Duration>);

impl BackoffSchedule {
    /// Creates a schedule from an ordered list of waits.
    pub fn new(steps: Vec<Duration>) -> Self {
        Self(steps)
    }

    /// Returns the wait to apply after the given 1-based delivery attempt,
    /// or `None` when the schedule is empty.
    pub fn delay_after(&self, deliveries: u32) -> Option<Duration> {
        let last = self.0.len().checked_sub(1)?;
        let index = (deliveries.saturating_sub(1) as usize).min(last);
        Some(self.0[index])
    }

    /// Whether the schedule has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct waits before the last one repeats.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for BackoffSchedule {
    /// 2s, 8s, 32s, 64s.
    fn default() -> Self {
        Self(vec![
            Duration::from_secs(2),
            Duration::from_secs(8),
            Duration::from_secs(32),
            Duration::from_secs(64),
        ])
    }
}

impl From<Vec<Duration>> for BackoffSchedule {
    fn from(steps: Vec<Duration>) -> Self {
        Self::new(steps)
    }
}
