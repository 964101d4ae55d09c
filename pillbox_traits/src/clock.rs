use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

/// Clock abstraction for sensor timing and calendar decisions across the stack.
///
/// - now(): monotonic Instant, used for sample timestamps and timer deadlines
/// - local_now(): local wall-clock time, used for calendar-day rollover and schedules
/// - sleep(): sleeps for the provided duration (implementations may simulate)
pub trait Clock {
    fn now(&self) -> Instant;
    fn local_now(&self) -> NaiveDateTime;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }

    /// Calendar day of `local_now()`.
    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

/// Real-time clock: `Instant::now()` and the host's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset, local_now() = wall_origin + offset.
/// sleep(d) advances internal time by d without actually sleeping.
/// Clones share the same offset, so a clone handed to a worker observes
/// every `advance` made through the original.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: NaiveDateTime,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new(wall_origin: NaiveDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Set the absolute offset relative to origin.
    pub fn set_offset(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = d;
        }
    }

    /// Move the clock forward so that `local_now()` reads `at`.
    /// Requests to move backwards are ignored; the clock is monotonic.
    pub fn advance_to(&self, at: NaiveDateTime) {
        let target = (at - self.wall_origin).to_std().unwrap_or(Duration::ZERO);
        if let Ok(mut off) = self.offset.lock()
            && target > *off
        {
            *off = target;
        }
    }

    /// Monotonic origin; `now()` never reads earlier than this.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn local_now(&self) -> NaiveDateTime {
        let delta = TimeDelta::from_std(self.offset()).unwrap_or(TimeDelta::zero());
        self.wall_origin
            .checked_add_signed(delta)
            .unwrap_or(self.wall_origin)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
