use std::time::Duration;

use rand::Rng;

use crate::ConfigurationError;

/// Pause a virtual user takes between two consecutive requests, drawn
/// uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    min: Duration,
    max: Duration,
}

impl ThinkTime {
    pub fn between(min: Duration, max: Duration) -> Result<Self, ConfigurationError> {
        if min > max {
            return Err(ConfigurationError::InvalidThinkTime {
                min_ms: min.as_millis(),
                max_ms: max.as_millis(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn constant(pause: Duration) -> Self {
        Self {
            min: pause,
            max: pause,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    /// Longest pause this think time can produce; stop signals are observed
    /// within this bound.
    pub fn upper_bound(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let nanos = rng.random_range(self.min.as_nanos()..=self.max.as_nanos());
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_secs(1),
        }
    }
}

/// Spreads virtual user start times evenly over a window so they do not all
/// fire their first request at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RampUp {
    window: Duration,
}

impl RampUp {
    pub fn over(window: Duration) -> Self {
        Self { window }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Initial delay for the `index`-th of `users` virtual users.
    pub fn delay_for(&self, index: usize, users: usize) -> Duration {
        if users == 0 || self.window.is_zero() {
            return Duration::ZERO;
        }
        let slot = index.min(users - 1) as f64 / users as f64;
        self.window.mul_f64(slot)
    }
}
