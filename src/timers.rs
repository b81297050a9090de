use std::time::{Duration, SystemTime};

/// Live metric refresh interval
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(100);
/// Countdown step
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// A logical periodic task, advanced by polling with the current time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicTimer {
    interval: Duration,
    next_due: SystemTime,
}

impl PeriodicTimer {
    /// Timer whose first period ends one interval after `now`
    pub fn starting_at(now: SystemTime, interval: Duration) -> Self {
        Self {
            interval,
            next_due: now + interval,
        }
    }

    /// Number of whole periods elapsed up to `now`; advances past them
    pub fn poll(&mut self, now: SystemTime) -> u32 {
        let mut fired = 0;
        while now >= self.next_due {
            self.next_due += self.interval;
            fired += 1;
        }
        fired
    }

    pub fn next_due(&self) -> SystemTime {
        self.next_due
    }
}

/// Whole-second countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    remaining: u32,
    timer: PeriodicTimer,
}

impl Countdown {
    pub fn new(now: SystemTime, secs: u32) -> Self {
        Self {
            remaining: secs,
            timer: PeriodicTimer::starting_at(now, COUNTDOWN_INTERVAL),
        }
    }

    /// Decrement once per elapsed second; true once the countdown hits zero
    pub fn poll(&mut self, now: SystemTime) -> bool {
        let fired = self.timer.poll(now);
        self.remaining = self.remaining.saturating_sub(fired);
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

/// What fired during one poll of the session timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fired {
    pub refresh: bool,
    pub expired: bool,
}

/// The two per-session timers. Both are dropped together on every path that
/// ends or restarts a session.
#[derive(Debug, Clone, Default)]
pub struct SessionTimers {
    refresh: Option<PeriodicTimer>,
    countdown: Option<Countdown>,
}

impl SessionTimers {
    /// Start the refresh timer, and the countdown when `duration_secs > 0`
    pub fn arm(&mut self, now: SystemTime, duration_secs: u32) {
        self.refresh = Some(PeriodicTimer::starting_at(now, REFRESH_INTERVAL));
        self.countdown = (duration_secs > 0).then(|| Countdown::new(now, duration_secs));
    }

    pub fn cancel_all(&mut self) {
        self.refresh = None;
        self.countdown = None;
    }

    pub fn is_armed(&self) -> bool {
        self.refresh.is_some() || self.countdown.is_some()
    }

    pub fn seconds_left(&self) -> Option<u32> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    pub fn poll(&mut self, now: SystemTime) -> Fired {
        let refresh = self
            .refresh
            .as_mut()
            .is_some_and(|timer| timer.poll(now) > 0);
        let expired = self
            .countdown
            .as_mut()
            .is_some_and(|countdown| countdown.poll(now));
        Fired { refresh, expired }
    }
}
