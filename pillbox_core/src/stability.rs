//! Tare and stabilization state machine for the bottle scale.
//!
//! `step` is pure: it takes the current state and one input and returns the
//! next state plus the signals to surface and the effects (tare commands,
//! timer requests) for the caller to carry out.
//!
//! ```text
//! AwaitingTare ──Connected──▶ Taring(0) ──tare check ok──▶ Stabilizing ──run ≥ N──▶ Ready
//!                                 │ ▲                          │
//!                                 └─┘ retry ≤ max               └──timeout──▶ Ready (degraded)
//! ```

use std::time::{Duration, Instant};

use crate::config::StabilityCfg;
use crate::error::Degradation;
use crate::timer::TimerKind;

/// Smallest step past a deadline, used to re-arm a timeout that fired on it.
const TIMER_TICK: Duration = Duration::from_nanos(1);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Phase {
    #[default]
    AwaitingTare,
    /// A tare was issued; `reference_g` is the reading when it was sent.
    Taring { retries: u8, reference_g: f32 },
    /// Counting consecutive samples inside the ready band.
    Stabilizing {
        run: u32,
        since: Instant,
        degraded: Option<Degradation>,
    },
    Ready { degraded: Option<Degradation> },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectorState {
    pub phase: Phase,
    /// Most recent finite reading, in any phase.
    pub last_g: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorInput {
    Connected { at: Instant },
    Sample { grams: f32, at: Instant },
    Timer { kind: TimerKind, at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    IssueTare,
    Schedule { kind: TimerKind, after: Duration },
    CancelTimers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    TareComplete { degraded: Option<Degradation> },
    Ready {
        weight_g: f32,
        degraded: Option<Degradation>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    pub signals: Vec<Signal>,
    pub effects: Vec<Effect>,
}

impl StepOutput {
    fn effect(mut self, e: Effect) -> Self {
        self.effects.push(e);
        self
    }

    fn signal(mut self, s: Signal) -> Self {
        self.signals.push(s);
        self
    }
}

fn enter_stabilizing(
    last_g: Option<f32>,
    at: Instant,
    degraded: Option<Degradation>,
    cfg: &StabilityCfg,
) -> (DetectorState, StepOutput) {
    let state = DetectorState {
        phase: Phase::Stabilizing {
            run: 0,
            since: at,
            degraded,
        },
        last_g,
    };
    let out = StepOutput::default()
        .signal(Signal::TareComplete { degraded })
        .effect(Effect::Schedule {
            kind: TimerKind::StabilizeTimeout,
            after: cfg.timeout,
        });
    (state, out)
}

fn enter_ready(
    last_g: Option<f32>,
    weight_g: f32,
    degraded: Option<Degradation>,
) -> (DetectorState, StepOutput) {
    let state = DetectorState {
        phase: Phase::Ready { degraded },
        last_g,
    };
    let out = StepOutput::default()
        .effect(Effect::CancelTimers)
        .signal(Signal::Ready { weight_g, degraded });
    (state, out)
}

fn tare_took_effect(w: f32, reference_g: f32, cfg: &StabilityCfg) -> bool {
    (w - reference_g).abs() > cfg.moved_epsilon_g || w.abs() < cfg.zero_epsilon_g
}

/// Advance the detector by one input.
pub fn step(
    state: DetectorState,
    input: &DetectorInput,
    cfg: &StabilityCfg,
) -> (DetectorState, StepOutput) {
    match *input {
        DetectorInput::Connected { .. } => {
            let reference_g = state.last_g.unwrap_or(0.0);
            let next = DetectorState {
                phase: Phase::Taring {
                    retries: 0,
                    reference_g,
                },
                last_g: state.last_g,
            };
            let out = StepOutput::default()
                .effect(Effect::CancelTimers)
                .effect(Effect::IssueTare)
                .effect(Effect::Schedule {
                    kind: TimerKind::TareCheck,
                    after: cfg.tare_settle,
                });
            (next, out)
        }

        DetectorInput::Sample { grams, at } => {
            if !grams.is_finite() {
                tracing::warn!(grams, "ignoring non-finite weight sample");
                return (state, StepOutput::default());
            }
            let last_g = Some(grams);
            match state.phase {
                Phase::Stabilizing {
                    run,
                    since,
                    degraded,
                } => {
                    let run = if grams.abs() <= cfg.ready_epsilon_g {
                        run.saturating_add(1)
                    } else {
                        0
                    };
                    if run >= cfg.required_stable_samples {
                        return enter_ready(last_g, grams, degraded);
                    }
                    if at.saturating_duration_since(since) > cfg.timeout {
                        return enter_ready(last_g, grams, Some(Degradation::SensorTimeout));
                    }
                    let next = DetectorState {
                        phase: Phase::Stabilizing {
                            run,
                            since,
                            degraded,
                        },
                        last_g,
                    };
                    (next, StepOutput::default())
                }
                phase => (DetectorState { phase, last_g }, StepOutput::default()),
            }
        }

        DetectorInput::Timer {
            kind: TimerKind::TareCheck,
            at,
        } => match state.phase {
            Phase::Taring {
                retries,
                reference_g,
            } => {
                let w = state.last_g.unwrap_or(reference_g);
                if tare_took_effect(w, reference_g, cfg) {
                    return enter_stabilizing(state.last_g, at, None, cfg);
                }
                let retries = retries.saturating_add(1);
                if retries <= cfg.max_tare_retries {
                    tracing::debug!(retries, weight_g = w, "tare not applied yet; reissuing");
                    let next = DetectorState {
                        phase: Phase::Taring {
                            retries,
                            reference_g: w,
                        },
                        last_g: state.last_g,
                    };
                    let out = StepOutput::default()
                        .effect(Effect::IssueTare)
                        .effect(Effect::Schedule {
                            kind: TimerKind::TareCheck,
                            after: cfg.tare_settle,
                        });
                    return (next, out);
                }
                tracing::warn!(retries, weight_g = w, "tare retries exhausted");
                enter_stabilizing(state.last_g, at, Some(Degradation::TareExhausted), cfg)
            }
            _ => (state, StepOutput::default()),
        },

        DetectorInput::Timer {
            kind: TimerKind::StabilizeTimeout,
            at,
        } => match state.phase {
            Phase::Stabilizing { since, .. } => {
                let elapsed = at.saturating_duration_since(since);
                if elapsed <= cfg.timeout {
                    // Not past the limit yet; a sample arriving right at it still counts.
                    let out = StepOutput::default().effect(Effect::Schedule {
                        kind: TimerKind::StabilizeTimeout,
                        after: cfg.timeout.saturating_sub(elapsed) + TIMER_TICK,
                    });
                    return (state, out);
                }
                let weight_g = state.last_g.unwrap_or(0.0);
                tracing::warn!(weight_g, "reading did not settle; continuing with last value");
                enter_ready(state.last_g, weight_g, Some(Degradation::SensorTimeout))
            }
            _ => (state, StepOutput::default()),
        },
    }
}
