//! Linear, capped backoff between status polls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule configuration.
///
/// The wait starts at `initial`, grows by `increment` after every
/// non-terminal poll and never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First wait.
    pub initial: Duration,
    /// Growth per non-terminal poll.
    pub increment: Duration,
    /// Cap.
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            increment: Duration::from_secs(2),
            max: Duration::from_secs(15),
        }
    }
}

impl BackoffConfig {
    /// Creates a new backoff config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first wait.
    #[must_use]
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    /// Sets the growth per poll.
    #[must_use]
    pub fn with_increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    /// Sets the cap.
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Starts a fresh schedule for one task.
    #[must_use]
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            config: *self,
            current: self.initial.min(self.max),
        }
    }
}

/// Per-task backoff state. Never decreases.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    config: BackoffConfig,
    current: Duration,
}

impl BackoffSchedule {
    /// The wait to apply now.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grows the wait after a non-terminal poll.
    pub fn advance(&mut self) {
        self.current = self
            .current
            .saturating_add(self.config.increment)
            .min(self.config.max)
            .max(self.current);
    }
}
