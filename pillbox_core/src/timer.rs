//! Cancellable delayed checks for the stability detector.
//!
//! The detector never sleeps. It asks for a check at some later instant and
//! the owner of the queue fires due entries as time advances. Every entry
//! carries the token of the generation it was scheduled in; `cancel_all`
//! retires that generation, and cancelling the session token retires
//! everything for good.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Which delayed check is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Verify that a tare command took effect.
    TareCheck,
    /// Give up waiting for a stable run.
    StabilizeTimeout,
}

#[derive(Debug)]
struct Entry {
    kind: TimerKind,
    due: Instant,
    token: CancelToken,
}

#[derive(Debug)]
pub struct TimerQueue {
    session: CancelToken,
    generation: CancelToken,
    entries: Vec<Entry>,
}

impl TimerQueue {
    pub fn new(session: CancelToken) -> Self {
        Self {
            session,
            generation: CancelToken::new(),
            entries: Vec::new(),
        }
    }

    pub fn schedule(&mut self, kind: TimerKind, due: Instant) {
        if self.session.is_cancelled() {
            return;
        }
        self.entries.push(Entry {
            kind,
            due,
            token: self.generation.clone(),
        });
    }

    /// Drop every pending entry.
    pub fn cancel_all(&mut self) {
        self.generation.cancel();
        self.generation = CancelToken::new();
        self.entries.clear();
    }

    fn live(&self, e: &Entry) -> bool {
        !self.session.is_cancelled() && !e.token.is_cancelled()
    }

    /// Remove and return entries due at or before `now`, earliest first.
    pub fn fire_due(&mut self, now: Instant) -> Vec<(TimerKind, Instant)> {
        let (mut due, rest): (Vec<Entry>, Vec<Entry>) =
            self.entries.drain(..).partition(|e| e.due <= now);
        self.entries = rest;
        due.retain(|e| self.live(e));
        due.sort_by_key(|e| e.due);
        due.into_iter().map(|e| (e.kind, e.due)).collect()
    }

    /// Earliest pending deadline, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| self.live(e))
            .map(|e| e.due)
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.next_due().is_none()
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        self.generation.cancel();
    }
}
