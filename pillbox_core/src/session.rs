//! One take-a-dose interaction with the bottle scale.
//!
//! `DoseSession` feeds sensor events through the stability detector, carries
//! out its effects (tare commands, timers) and, once the reading is
//! trustworthy, turns the latest weight into a dose on confirmation.

use std::time::Instant;

use chrono::NaiveDateTime;
use crossbeam_channel as xch;
use pillbox_traits::{ScaleLink, SensorEvent};

use crate::config::StabilityCfg;
use crate::error::{Degradation, PillError};
use crate::inventory::{DoseRecord, apply_dose};
use crate::model::PillBottle;
use crate::stability::{self, DetectorInput, DetectorState, Effect, Phase, Signal};
use crate::timer::{CancelToken, TimerQueue};

/// Notifications published on the session's event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TareComplete { degraded: Option<Degradation> },
    Ready {
        weight_g: f32,
        degraded: Option<Degradation>,
    },
    DoseTaken(DoseRecord),
    Disconnected,
}

impl From<Signal> for SessionEvent {
    fn from(s: Signal) -> Self {
        match s {
            Signal::TareComplete { degraded } => Self::TareComplete { degraded },
            Signal::Ready { weight_g, degraded } => Self::Ready { weight_g, degraded },
        }
    }
}

pub struct DoseSession<L: ScaleLink> {
    link: L,
    cfg: StabilityCfg,
    state: DetectorState,
    timers: TimerQueue,
    token: CancelToken,
    events: Option<xch::Sender<SessionEvent>>,
    connected: bool,
}

impl<L: ScaleLink> std::fmt::Debug for DoseSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoseSession")
            .field("phase", &self.state.phase)
            .field("last_g", &self.state.last_g)
            .field("connected", &self.connected)
            .finish()
    }
}

impl<L: ScaleLink> DoseSession<L> {
    pub fn new(link: L, cfg: StabilityCfg, token: CancelToken) -> Self {
        Self {
            link,
            cfg,
            state: DetectorState::default(),
            timers: TimerQueue::new(token.clone()),
            token,
            events: None,
            connected: false,
        }
    }

    /// Publish signals and confirmed doses on `tx`.
    pub fn with_events(mut self, tx: xch::Sender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn current_weight(&self) -> Option<f32> {
        self.state.last_g
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state.phase, Phase::Ready { .. })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_due()
    }

    /// Stop all pending retries and timeouts for good.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.timers.cancel_all();
    }

    fn publish(&self, ev: SessionEvent) {
        if let Some(tx) = &self.events
            && tx.send(ev).is_err()
        {
            tracing::debug!("session event receiver dropped");
        }
    }

    fn apply(&mut self, input: &DetectorInput, at: Instant) -> Vec<Signal> {
        if self.token.is_cancelled() {
            return Vec::new();
        }
        let before = self.state.phase;
        let (next, out) = stability::step(self.state, input, &self.cfg);
        self.state = next;
        if std::mem::discriminant(&before) != std::mem::discriminant(&self.state.phase) {
            tracing::debug!(from = ?before, to = ?self.state.phase, "detector transition");
        }

        for effect in out.effects {
            match effect {
                Effect::IssueTare => {
                    if let Err(e) = self.link.tare() {
                        tracing::warn!(error = %e, "tare command failed");
                    }
                }
                Effect::Schedule { kind, after } => self.timers.schedule(kind, at + after),
                Effect::CancelTimers => self.timers.cancel_all(),
            }
        }
        for s in &out.signals {
            match s {
                Signal::TareComplete { degraded } => {
                    tracing::info!(degraded = ?degraded, "tare complete");
                }
                Signal::Ready { weight_g, degraded } => {
                    tracing::info!(weight_g, degraded = ?degraded, "reading stable");
                }
            }
            self.publish((*s).into());
        }
        out.signals
    }

    /// Fire every timer due at or before `now`.
    pub fn fire_timers(&mut self, now: Instant) -> Vec<Signal> {
        let mut signals = Vec::new();
        // Handling a timer can schedule another that is already due.
        loop {
            let due = self.timers.fire_due(now);
            if due.is_empty() {
                break;
            }
            for (kind, at) in due {
                signals.extend(self.apply(&DetectorInput::Timer { kind, at }, at));
            }
        }
        signals
    }

    /// Handle one sensor event, firing any timers that fell due before it.
    pub fn handle(&mut self, event: &SensorEvent) -> Vec<Signal> {
        let mut signals = match event.at() {
            Some(at) => self.fire_timers(at),
            None => Vec::new(),
        };
        match event {
            SensorEvent::Weight { grams, at } => {
                signals.extend(self.apply(&DetectorInput::Sample { grams: *grams, at: *at }, *at));
            }
            SensorEvent::Connected { at } => {
                tracing::info!("scale connected");
                self.connected = true;
                signals.extend(self.apply(&DetectorInput::Connected { at: *at }, *at));
            }
            SensorEvent::Disconnected { .. } => {
                tracing::warn!("scale disconnected");
                self.connected = false;
                self.timers.cancel_all();
                self.publish(SessionEvent::Disconnected);
            }
            SensorEvent::ScanFinished { candidates } => {
                tracing::info!(found = candidates.len(), "scale scan finished");
            }
        }
        signals
    }

    /// Record the latest weight as a dose taken from `bottle` at `now`.
    ///
    /// Only allowed once the reading is Ready. The session then waits for a
    /// new connection before it will count again.
    pub fn confirm(
        &mut self,
        bottle: &mut PillBottle,
        now: NaiveDateTime,
    ) -> Result<DoseRecord, PillError> {
        if !self.is_ready() {
            return Err(PillError::State(format!(
                "scale reading is not stable yet (phase: {:?})",
                self.state.phase
            )));
        }
        let weight = self.state.last_g.unwrap_or(0.0);
        let record = apply_dose(bottle, weight, now)?;
        self.state.phase = Phase::AwaitingTare;
        self.timers.cancel_all();
        self.publish(SessionEvent::DoseTaken(record.clone()));
        Ok(record)
    }
}

impl<L: ScaleLink> Drop for DoseSession<L> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
