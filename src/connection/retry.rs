//! Tick-driven reconnect countdown.

/// Counts `poll()` ticks between automatic reconnect attempts.
///
/// The countdown starts at the reset value, decrements once per tick while
/// non-zero, and fires on the tick that finds it at zero. It never goes
/// below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
    remaining: u32,
    reset_to: u32,
}

impl RetryTimer {
    /// Create a countdown that fires every `ticks + 1` ticks.
    #[must_use]
    pub const fn new(ticks: u32) -> Self {
        Self {
            remaining: ticks,
            reset_to: ticks,
        }
    }

    /// Advance by one tick. Returns `true` when an attempt is due.
    ///
    /// The caller is expected to [`reset`](Self::reset) after the attempt.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            true
        } else {
            self.remaining -= 1;
            false
        }
    }

    /// Restart the countdown from the reset value.
    pub fn reset(&mut self) {
        self.remaining = self.reset_to;
    }

    /// Ticks left before the next attempt.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}
