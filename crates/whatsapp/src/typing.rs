use std::time::Duration;

use {rand::Rng, relay_config::TypingConfig};

/// Randomized keystroke cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingPacing {
    char_delay_ms: (u64, u64),
    pre_send_ms: (u64, u64),
}

impl TypingPacing {
    /// Inverted ranges are reordered rather than rejected.
    pub fn new(char_delay_ms: (u64, u64), pre_send_ms: (u64, u64)) -> Self {
        Self {
            char_delay_ms: ordered(char_delay_ms),
            pre_send_ms: ordered(pre_send_ms),
        }
    }

    /// No delays at all.
    pub fn instant() -> Self {
        Self::new((0, 0), (0, 0))
    }

    /// Delay after each typed character.
    pub fn char_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        sample(self.char_delay_ms, rng)
    }

    /// Pause between the last keystroke and submitting.
    pub fn pre_send<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        sample(self.pre_send_ms, rng)
    }
}

impl Default for TypingPacing {
    fn default() -> Self {
        Self::from(&TypingConfig::default())
    }
}

impl From<&TypingConfig> for TypingPacing {
    fn from(config: &TypingConfig) -> Self {
        Self::new(
            (config.char_delay_min_ms, config.char_delay_max_ms),
            (config.pre_send_min_ms, config.pre_send_max_ms),
        )
    }
}

fn ordered((a, b): (u64, u64)) -> (u64, u64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn sample<R: Rng + ?Sized>((min, max): (u64, u64), rng: &mut R) -> Duration {
    if min == max {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rng.random_range(min..=max))
}
