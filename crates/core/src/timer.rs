//! Countdown for a timed attempt.
//!
//! `SessionClock` holds no timer of its own: something outside calls
//! [`SessionClock::tick`] once per [`TICK_MS`]. That keeps the countdown
//! deterministic in tests and leaves cancellation to whoever owns the timer.

/// Fixed decrement applied on every tick.
pub const TICK_MS: u64 = 1_000;

/// At or below this many seconds the display switches to the "low" style.
pub const LOW_TIME_SECS: u64 = 600;

/// At or below this many seconds the display switches to the "critical" style.
pub const CRITICAL_TIME_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockStatus {
    Idle,
    Running,
    Paused,
    Stopped,
    Expired,
}

/// What a single tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { remaining_ms: u64 },
    /// Emitted once, on the tick that reaches zero.
    Expired,
}

/// Presentation hint derived from the remaining time. Has no behavioural effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeThreshold {
    Normal,
    Low,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    remaining_ms: u64,
    status: ClockStatus,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            remaining_ms: 0,
            status: ClockStatus::Idle,
        }
    }

    /// Start counting down from `initial_remaining_ms`.
    ///
    /// Returns `false` without changing anything if the clock is already
    /// running (or paused) or has already expired.
    pub fn start(&mut self, initial_remaining_ms: u64) -> bool {
        match self.status {
            ClockStatus::Running | ClockStatus::Paused | ClockStatus::Expired => false,
            ClockStatus::Idle | ClockStatus::Stopped => {
                self.remaining_ms = initial_remaining_ms;
                self.status = ClockStatus::Running;
                true
            }
        }
    }

    /// Advance by one quantum.
    ///
    /// Returns `None` unless the clock is running. The tick that reaches zero
    /// returns `ClockEvent::Expired` and leaves the clock expired, so later
    /// ticks return `None`.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        if self.status != ClockStatus::Running {
            return None;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(TICK_MS);
        if self.remaining_ms == 0 {
            self.status = ClockStatus::Expired;
            return Some(ClockEvent::Expired);
        }
        Some(ClockEvent::Tick {
            remaining_ms: self.remaining_ms,
        })
    }

    pub fn pause(&mut self) {
        if self.status == ClockStatus::Running {
            self.status = ClockStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == ClockStatus::Paused {
            self.status = ClockStatus::Running;
        }
    }

    /// Halt ticking. Safe to call repeatedly; an expired clock stays expired.
    pub fn stop(&mut self) {
        if matches!(self.status, ClockStatus::Running | ClockStatus::Paused) {
            self.status = ClockStatus::Stopped;
        }
    }

    #[must_use]
    pub fn status(&self) -> ClockStatus {
        self.status
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == ClockStatus::Running
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.status == ClockStatus::Paused
    }

    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.status == ClockStatus::Expired
    }

    #[must_use]
    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Whole seconds left, rounded down.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        self.remaining_ms / 1_000
    }

    #[must_use]
    pub fn threshold(&self) -> TimeThreshold {
        let secs = self.remaining_secs();
        if secs <= CRITICAL_TIME_SECS {
            TimeThreshold::Critical
        } else if secs <= LOW_TIME_SECS {
            TimeThreshold::Low
        } else {
            TimeThreshold::Normal
        }
    }

    #[must_use]
    pub fn display(&self) -> String {
        format_remaining(self.remaining_ms)
    }
}

/// Render milliseconds as `H:MM:SS` from one hour upwards, `M:SS` below.
#[must_use]
pub fn format_remaining(ms: u64) -> String {
    let total_secs = ms / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_below_one_hour_as_minutes() {
        assert_eq!(format_remaining(0), "0:00");
        assert_eq!(format_remaining(999), "0:00");
        assert_eq!(format_remaining(5_000), "0:05");
        assert_eq!(format_remaining(65_000), "1:05");
        assert_eq!(format_remaining(3_599_999), "59:59");
    }

    #[test]
    fn formats_hours_with_padded_minutes() {
        assert_eq!(format_remaining(3_600_000), "1:00:00");
        assert_eq!(format_remaining(3_661_000), "1:01:01");
        assert_eq!(format_remaining(36_000_000 + 600_000 + 9_000), "10:10:09");
    }

    #[test]
    fn second_start_is_ignored() {
        let mut clock = SessionClock::new();
        assert!(clock.start(10_000));
        clock.tick();
        assert!(!clock.start(60_000));
        assert_eq!(clock.remaining_ms(), 9_000);
    }

    #[test]
    fn expires_exactly_once_and_stops() {
        let mut clock = SessionClock::new();
        clock.start(2_500);

        assert_eq!(clock.tick(), Some(ClockEvent::Tick { remaining_ms: 1_500 }));
        assert_eq!(clock.tick(), Some(ClockEvent::Tick { remaining_ms: 500 }));
        assert_eq!(clock.tick(), Some(ClockEvent::Expired));
        assert_eq!(clock.remaining_ms(), 0);

        for _ in 0..5 {
            assert_eq!(clock.tick(), None);
        }
        assert!(clock.has_expired());
        assert!(!clock.start(1_000));
    }

    #[test]
    fn never_reports_negative_for_any_start_value() {
        for start in [0_u64, 1, 999, 1_000, 1_001, 7_250] {
            let mut clock = SessionClock::new();
            clock.start(start);
            let mut expiries = 0;
            for _ in 0..20 {
                if let Some(ClockEvent::Expired) = clock.tick() {
                    expiries += 1;
                }
            }
            assert_eq!(expiries, 1, "start={start}");
            assert_eq!(clock.remaining_ms(), 0);
        }
    }

    #[test]
    fn paused_and_stopped_clocks_do_not_tick() {
        let mut clock = SessionClock::new();
        clock.start(5_000);
        clock.pause();
        assert_eq!(clock.tick(), None);
        clock.resume();
        assert_eq!(clock.tick(), Some(ClockEvent::Tick { remaining_ms: 4_000 }));

        clock.stop();
        clock.stop();
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.status(), ClockStatus::Stopped);
        assert!(clock.start(3_000));
    }

    #[test]
    fn thresholds_follow_remaining_seconds() {
        let mut clock = SessionClock::new();
        clock.start(601_000);
        assert_eq!(clock.threshold(), TimeThreshold::Normal);
        clock.tick();
        assert_eq!(clock.threshold(), TimeThreshold::Low);

        let mut clock = SessionClock::new();
        clock.start(300_999);
        assert_eq!(clock.threshold(), TimeThreshold::Critical);
        assert_eq!(clock.display(), "5:00");
    }
}
