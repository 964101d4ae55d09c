use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use pillbox_traits::{Clock, ScaleLink, SensorEvent, SensorSource};
use serde::Serialize;

use crate::config::RunnerCfg;
use crate::error::{PillError, Result as CoreResult};
use crate::pump::{EventPump, PumpRecv};
use crate::session::DoseSession;
use crate::stability::Signal;
use crate::util::duration_ms;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The scale reported a disconnect.
    Disconnected,
    /// A replayed trace ran out of events.
    EndOfTrace,
    /// The live source finished or its thread exited.
    SourceFinished,
    /// The shutdown flag was raised.
    Interrupted,
    /// The run hit `max_run`.
    MaxRunElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stop: StopReason,
    pub events: usize,
    pub signals: Vec<Signal>,
}

impl RunSummary {
    fn new(stop: StopReason, events: usize, signals: Vec<Signal>) -> Self {
        Self {
            stop,
            events,
            signals,
        }
    }
}

/// Drive `session` through a recorded event sequence.
///
/// Timers fire at their own deadlines, interleaved with the events by
/// timestamp, so the result does not depend on wall-clock time. Timers due
/// at or before the next event fire before that event is pulled from
/// `source`, so tares they issue already apply to it. If the trace ends
/// without a disconnect, pending timers are run out as if the scale had gone
/// quiet.
///
/// `source` is polled without waiting; use an unpaced source.
pub fn replay<L, S>(session: &mut DoseSession<L>, mut source: S) -> RunSummary
where
    L: ScaleLink,
    S: SensorSource,
{
    let mut signals = Vec::new();
    let mut count = 0usize;
    while !source.is_finished() {
        if let Some(at) = source.next_at() {
            signals.extend(session.fire_timers(at));
        }
        let ev = match source.next_event(Duration::ZERO) {
            Ok(Some(ev)) => ev,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "skipping trace row");
                continue;
            }
        };
        count += 1;
        signals.extend(session.handle(&ev));
        if matches!(ev, SensorEvent::Disconnected { .. }) {
            return RunSummary::new(StopReason::Disconnected, count, signals);
        }
    }
    while let Some(due) = session.next_deadline() {
        signals.extend(session.fire_timers(due));
    }
    tracing::debug!(events = count, "trace replay finished");
    RunSummary::new(StopReason::EndOfTrace, count, signals)
}

/// How long to block for the next event: at most `poll`, and never past the
/// next timer deadline.
#[inline]
fn wait_budget(now: Instant, deadline: Option<Instant>, poll: Duration) -> Duration {
    match deadline {
        Some(d) => d.saturating_duration_since(now).min(poll),
        None => poll,
    }
}

#[inline]
fn connect_timed_out(ever_connected: bool, elapsed: Duration, cfg: &RunnerCfg) -> bool {
    !ever_connected && elapsed >= cfg.connect_timeout
}

/// Drive `session` from a live event pump until the scale disconnects, the
/// source finishes, `shutdown` is raised or `max_run` elapses.
///
/// Fails with `PillError::ConnectTimeout` if no Connected event arrives
/// within `connect_timeout`.
pub fn run_live<L, C>(
    session: &mut DoseSession<L>,
    pump: &EventPump,
    clock: &C,
    cfg: &RunnerCfg,
    shutdown: Option<&AtomicBool>,
) -> CoreResult<RunSummary>
where
    L: ScaleLink,
    C: Clock,
{
    let start = clock.now();
    let mut signals = Vec::new();
    let mut count = 0usize;
    let mut ever_connected = session.is_connected();
    tracing::info!(
        connect_timeout_ms = duration_ms(cfg.connect_timeout),
        max_run_ms = duration_ms(cfg.max_run),
        "live session start"
    );

    loop {
        if shutdown.is_some_and(|f| f.load(Ordering::Relaxed)) {
            session.cancel();
            tracing::info!("live session interrupted");
            return Ok(RunSummary::new(StopReason::Interrupted, count, signals));
        }

        let now = clock.now();
        let elapsed = now.saturating_duration_since(start);
        if connect_timed_out(ever_connected, elapsed, cfg) {
            session.cancel();
            tracing::error!(
                waited_ms = duration_ms(elapsed),
                "scale did not connect"
            );
            return Err(crate::error::Report::new(PillError::ConnectTimeout));
        }
        if elapsed >= cfg.max_run {
            session.cancel();
            tracing::warn!("live session hit its maximum run time");
            return Ok(RunSummary::new(StopReason::MaxRunElapsed, count, signals));
        }

        signals.extend(session.fire_timers(now));

        match pump.recv_timeout(wait_budget(now, session.next_deadline(), cfg.poll)) {
            PumpRecv::Event(ev) => {
                count += 1;
                if matches!(ev, SensorEvent::Connected { .. }) {
                    ever_connected = true;
                }
                signals.extend(session.handle(&ev));
                if matches!(ev, SensorEvent::Disconnected { .. }) {
                    return Ok(RunSummary::new(StopReason::Disconnected, count, signals));
                }
            }
            PumpRecv::Idle => {}
            PumpRecv::Closed => {
                signals.extend(session.fire_timers(clock.now()));
                tracing::debug!(events = count, "live source closed");
                return Ok(RunSummary::new(StopReason::SourceFinished, count, signals));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{connect_timed_out, wait_budget};
    use crate::config::RunnerCfg;
    use std::time::{Duration, Instant};

    #[test]
    fn wait_budget_never_overshoots_a_deadline() {
        let now = Instant::now();
        let poll = Duration::from_millis(50);
        assert_eq!(wait_budget(now, None, poll), poll);
        assert_eq!(
            wait_budget(now, Some(now + Duration::from_millis(10)), poll),
            Duration::from_millis(10)
        );
        assert_eq!(
            wait_budget(now, Some(now + Duration::from_secs(10)), poll),
            poll
        );
    }

    #[test]
    fn overdue_deadline_means_no_wait() {
        let now = Instant::now() + Duration::from_secs(1);
        let past = now - Duration::from_millis(5);
        assert_eq!(
            wait_budget(now, Some(past), Duration::from_millis(50)),
            Duration::ZERO
        );
    }

    #[test]
    fn connect_timeout_only_applies_before_first_connect() {
        let cfg = RunnerCfg {
            connect_timeout: Duration::from_millis(100),
            ..RunnerCfg::default()
        };
        assert!(!connect_timed_out(false, Duration::from_millis(99), &cfg));
        assert!(connect_timed_out(false, Duration::from_millis(100), &cfg));
        assert!(!connect_timed_out(true, Duration::from_secs(60), &cfg));
    }
}
