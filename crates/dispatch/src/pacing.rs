use std::time::Duration;

use rand::Rng;

use crate::error::{DispatchError, Result};

/// Randomized delay between consecutive sends, drawn uniformly from
/// `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    min: Duration,
    max: Duration,
}

impl PacingPolicy {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(DispatchError::InvalidPacing { min, max });
        }
        Ok(Self { min, max })
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay, millisecond granularity, closed interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let lo = millis(self.min);
        let hi = millis(self.max);
        if lo >= hi {
            return self.min;
        }
        Duration::from_millis(rng.random_range(lo..=hi))
    }

    /// Delay to apply after a task completes. Zero when nothing is waiting.
    pub fn delay_after<R: Rng + ?Sized>(&self, queue_empty: bool, rng: &mut R) -> Duration {
        if queue_empty {
            Duration::ZERO
        } else {
            self.sample(rng)
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(60),
            max: Duration::from_secs(90),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
