//! Auto-save debounce deadline.
//!
//! Every mutation while editing and dirty re-arms the deadline, so a burst of
//! edits produces a single save roughly one delay after the last of them.
//! The timer itself never sleeps; the session runner waits on
//! [`AutoSaveTimer::deadline`] with `tokio::time::sleep_until`.

use std::time::Duration;

use tokio::time::Instant;

/// Delay between the last mutation and the automatic save.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone)]
pub struct AutoSaveTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl AutoSaveTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Moves the deadline to one delay after `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the armed deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

impl Default for AutoSaveTimer {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_DELAY)
    }
}
