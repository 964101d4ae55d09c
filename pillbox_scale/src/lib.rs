//! Simulated bottle scale.
//!
//! Replays a recorded weight trace (`pillbox_config::TraceRow`) as
//! `SensorEvent`s. Trace weights are the gross load on the scale; a tare sets
//! the zero point to the current gross load, so every later reading is
//! reported net of it, the way the bottle's firmware behaves.
//!
//! The scale and its `TareHandle` share state behind a mutex, so the handle
//! can live in a `DoseSession` while the scale itself runs on a pump thread.
//!
//! A weight row is netted when it is emitted. Tares must therefore be issued
//! before the row is pulled; `SensorSource::next_at` exposes the row's
//! timestamp so a replay can fire due timers first.
pub mod error;
pub mod util;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pillbox_config::{TraceEvent, TraceRow};
use pillbox_traits::{Clock, ScaleLink, SensorEvent, SensorSource};

use crate::error::{Result, ScaleError};

/// How trace timestamps map onto the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Emit rows as fast as they are asked for; timestamps stay relative to
    /// the scale's origin.
    Unpaced,
    /// Wait on the clock until each row's timestamp comes due.
    RealTime,
}

#[derive(Debug, Default)]
struct ScaleState {
    gross_g: f32,
    zero_g: f32,
    tares_seen: u32,
    tares_applied: u32,
    ignore_tares: u32,
    reject_tares: bool,
}

/// Tare command endpoint for a `SimulatedScale`.
#[derive(Debug, Clone)]
pub struct TareHandle {
    shared: Arc<Mutex<ScaleState>>,
}

impl TareHandle {
    fn read<T>(&self, f: impl FnOnce(&ScaleState) -> T) -> Result<T> {
        self.shared
            .lock()
            .map(|s| f(&s))
            .map_err(|_| ScaleError::Poisoned)
    }

    /// Tare commands received, applied or not.
    pub fn tares_seen(&self) -> u32 {
        self.read(|s| s.tares_seen).unwrap_or(0)
    }

    /// Tare commands that moved the zero point.
    pub fn tares_applied(&self) -> u32 {
        self.read(|s| s.tares_applied).unwrap_or(0)
    }

    /// Current zero point in gross grams.
    pub fn zero_g(&self) -> f32 {
        self.read(|s| s.zero_g).unwrap_or(0.0)
    }
}

impl ScaleLink for TareHandle {
    fn tare(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.shared.lock().map_err(|_| ScaleError::Poisoned)?;
        s.tares_seen += 1;
        if s.reject_tares {
            return Err(Box::new(ScaleError::TareRejected));
        }
        if s.ignore_tares > 0 {
            s.ignore_tares -= 1;
            tracing::debug!(gross_g = s.gross_g, "simulated scale ignored tare");
            return Ok(());
        }
        s.zero_g = s.gross_g;
        s.tares_applied += 1;
        tracing::debug!(zero_g = s.zero_g, "simulated scale tared");
        Ok(())
    }
}

pub struct SimulatedScale<C: Clock> {
    rows: Vec<TraceRow>,
    pos: usize,
    clock: C,
    origin: Instant,
    pacing: Pacing,
    shared: Arc<Mutex<ScaleState>>,
}

impl<C: Clock> SimulatedScale<C> {
    /// Row timestamps are offsets from `clock.now()` at construction.
    pub fn new(rows: Vec<TraceRow>, clock: C, pacing: Pacing) -> Self {
        let origin = clock.now();
        Self {
            rows,
            pos: 0,
            clock,
            origin,
            pacing,
            shared: Arc::new(Mutex::new(ScaleState::default())),
        }
    }

    pub fn tare_handle(&self) -> TareHandle {
        TareHandle {
            shared: self.shared.clone(),
        }
    }

    /// Silently drop the first `n` tare commands (a sticky load cell).
    pub fn ignore_first_tares(self, n: u32) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.ignore_tares = n;
        }
        self
    }

    /// Fail every tare command with `ScaleError::TareRejected`.
    pub fn reject_tares(self) -> Self {
        if let Ok(mut s) = self.shared.lock() {
            s.reject_tares = true;
        }
        self
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.pos)
    }

    fn due(&self, row: &TraceRow) -> Instant {
        self.origin + Duration::from_millis(row.ms)
    }

    fn emit(&mut self, row: TraceRow) -> Result<SensorEvent> {
        let at = self.due(&row);
        let ev = match row.event {
            TraceEvent::Weight => {
                let gross = row
                    .grams
                    .filter(|g| g.is_finite())
                    .ok_or_else(|| ScaleError::Trace {
                        row: self.pos,
                        reason: "weight row without a finite weight".into(),
                    })?;
                let mut s = self.shared.lock().map_err(|_| ScaleError::Poisoned)?;
                s.gross_g = gross;
                SensorEvent::Weight {
                    grams: gross - s.zero_g,
                    at,
                }
            }
            TraceEvent::Connected => SensorEvent::Connected { at },
            TraceEvent::Disconnected => SensorEvent::Disconnected { at },
        };
        Ok(ev)
    }

    fn advance(&mut self) -> Option<Result<SensorEvent>> {
        let row = *self.rows.get(self.pos)?;
        let ev = self.emit(row);
        self.pos += 1;
        Some(ev)
    }
}

impl<C: Clock> Iterator for SimulatedScale<C> {
    type Item = SensorEvent;

    /// Unpaced replay; rows that cannot be turned into events are skipped.
    fn next(&mut self) -> Option<SensorEvent> {
        loop {
            match self.advance()? {
                Ok(ev) => return Some(ev),
                Err(e) => tracing::warn!(error = %e, "skipping trace row"),
            }
        }
    }
}

impl<C: Clock> SensorSource for SimulatedScale<C> {
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<SensorEvent>, Box<dyn std::error::Error + Send + Sync>> {
        let Some(row) = self.rows.get(self.pos).copied() else {
            return Ok(None);
        };
        if self.pacing == Pacing::RealTime
            && !util::sleep_until_or_timeout(&self.clock, self.due(&row), timeout)
        {
            return Ok(None);
        }
        match self.advance() {
            Some(Ok(ev)) => Ok(Some(ev)),
            Some(Err(e)) => Err(Box::new(e)),
            None => Ok(None),
        }
    }

    fn is_finished(&self) -> bool {
        self.pos >= self.rows.len()
    }

    fn next_at(&self) -> Option<Instant> {
        self.rows.get(self.pos).map(|row| self.due(row))
    }
}
