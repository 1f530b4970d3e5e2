//! Polled countdown for a simulation session.
//!
//! The timer never schedules anything itself: a driver calls [`CountdownTimer::tick`]
//! once per logical second. After expiry or [`CountdownTimer::cancel`] every tick is
//! inert, so a late callback cannot touch a finished session.

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time remains after this tick.
    Running { remaining: u32 },
    /// This tick consumed the last second. Reported exactly once.
    Expired,
    /// The timer was already cancelled or expired; nothing changed.
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    total_seconds: u32,
    remaining_seconds: u32,
    cancelled: bool,
    expired: bool,
}

impl CountdownTimer {
    #[must_use]
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total_seconds,
            remaining_seconds: total_seconds,
            cancelled: false,
            expired: false,
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero cancels the timer and returns `Expired`; a zero-second
    /// timer expires on its first tick.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_active() {
            return TickOutcome::Inactive;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.expired = true;
            self.cancelled = true;
            return TickOutcome::Expired;
        }
        TickOutcome::Running {
            remaining: self.remaining_seconds,
        }
    }

    /// Stop the countdown. Remaining time is kept for display.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }
}
