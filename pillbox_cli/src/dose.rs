//! Dose recording: config mapping, scale assembly and session execution.

use chrono::NaiveDateTime;
use eyre::WrapErr;
use pillbox_config::{TraceEvent, TraceRow};
use pillbox_core::error::{Degradation, Result as CoreResult};
use pillbox_core::pump::EventPump;
use pillbox_core::runner::{self, RunSummary};
use pillbox_core::{CancelToken, DoseSession, RunnerCfg, Signal, StabilityCfg, pills_taken};
use pillbox_scale::{Pacing, SimulatedScale};
use pillbox_traits::SystemClock;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::Ordering;
use uuid::Uuid;

use crate::commands::Ctx;
use crate::store::Shelf;

/// Degradation carried by the last Ready signal of a run, if any.
fn ready_degradation(summary: &RunSummary) -> Option<Degradation> {
    summary
        .signals
        .iter()
        .rev()
        .find_map(|s| match s {
            Signal::Ready { degraded, .. } => Some(*degraded),
            Signal::TareComplete { .. } => None,
        })
        .flatten()
}

/// Run `rows` through a fresh session bound to a simulated scale.
///
/// Unpaced runs replay deterministically; `live` runs play the trace in real
/// time on a pump thread and honour the Ctrl-C flag.
fn run_trace(
    ctx: &Ctx,
    rows: Vec<TraceRow>,
    live: bool,
) -> CoreResult<(DoseSession<pillbox_scale::TareHandle>, RunSummary)> {
    let stability: StabilityCfg = (&ctx.cfg.stability).into();
    let clock = SystemClock::new();
    if live {
        let runner_cfg: RunnerCfg = (&ctx.cfg.runner).into();
        let scale = SimulatedScale::new(rows, clock, Pacing::RealTime);
        let mut session = DoseSession::new(scale.tare_handle(), stability, CancelToken::new());
        let pump = EventPump::spawn(scale, runner_cfg.poll);
        let summary =
            runner::run_live(&mut session, &pump, &clock, &runner_cfg, Some(ctx.shutdown.as_ref()))?;
        if pump.error_count() > 0 {
            tracing::warn!(errors = pump.error_count(), "trace rows failed during live run");
        }
        Ok((session, summary))
    } else {
        let scale = SimulatedScale::new(rows, clock, Pacing::Unpaced);
        let mut session = DoseSession::new(scale.tare_handle(), stability, CancelToken::new());
        let summary = runner::replay(&mut session, scale);
        Ok((session, summary))
    }
}

pub fn dose(
    ctx: &Ctx,
    state: &Path,
    bottle: Option<Uuid>,
    trace: &Path,
    at: NaiveDateTime,
    live: bool,
) -> eyre::Result<()> {
    let rows = pillbox_config::load_weight_trace(trace)
        .wrap_err_with(|| format!("load weight trace {}", trace.display()))?;
    let mut shelf = Shelf::load(state)?;
    let inventory = ctx.inventory();
    let b = shelf.select_mut(bottle)?;

    let started = std::time::Instant::now();
    let (mut session, summary) = run_trace(ctx, rows, live)?;
    tracing::info!(
        stop = ?summary.stop,
        events = summary.events,
        elapsed_ms = pillbox_core::util::duration_ms(started.elapsed()),
        "trace finished"
    );
    if ctx.shutdown.load(Ordering::Relaxed) {
        eyre::bail!("interrupted before the dose was recorded");
    }

    let record = session.confirm(b, at)?;
    let degraded = ready_degradation(&summary);
    let low = b.is_low_stock(&inventory);
    if low {
        tracing::warn!(bottle = %b.id, remaining = b.remaining_pill_count, "low stock");
    }
    let human = format!(
        "Took {} pill(s) of {} ({:.2} g), {} left, {} today{}{}",
        record.pills,
        b.pill.name,
        record.weight_delta_g.abs(),
        record.remaining,
        record.taken_today,
        degraded.map(|d| format!(" [degraded: {d}]")).unwrap_or_default(),
        if low { " (low stock)" } else { "" }
    );
    shelf.save(state)?;

    let out = json!({
        "dose": record,
        "degraded": degraded,
        "low_stock": low,
        "stop": summary.stop,
        "events": summary.events,
    });
    ctx.emit(&out, || human);
    Ok(())
}

fn builtin_trace() -> Vec<TraceRow> {
    let w = |ms, g| TraceRow {
        ms,
        event: TraceEvent::Weight,
        grams: Some(g),
    };
    let ev = |ms, event| TraceRow {
        ms,
        event,
        grams: None,
    };
    vec![
        w(0, 42.0),
        ev(50, TraceEvent::Connected),
        w(200, 42.0),
        w(1100, 42.01),
        w(1200, 42.0),
        w(1300, 42.0),
        w(2500, 41.0),
        w(2600, 41.01),
        w(2700, 41.0),
        ev(3000, TraceEvent::Disconnected),
    ]
}

/// Validate the effective config and push a built-in two-pill trace
/// through the detector.
pub fn self_check(ctx: &Ctx) -> eyre::Result<()> {
    ctx.cfg.validate()?;
    let (session, summary) = run_trace(ctx, builtin_trace(), false)?;
    let weight = session.current_weight().filter(|_| session.is_ready());
    let Some(weight) = weight else {
        eyre::bail!(
            "self-check: built-in trace did not reach a stable reading (stop: {:?})",
            summary.stop
        );
    };
    let pills = pills_taken(weight, 0.5)?;
    if pills != 2 {
        eyre::bail!("self-check: expected 2 pills from the built-in trace, resolved {pills}");
    }
    tracing::info!(weight_g = weight, pills, "self-check passed");
    ctx.emit(
        &json!({ "ok": true, "weight_g": weight, "pills": pills, "degraded": ready_degradation(&summary) }),
        || "ok".to_string(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn ctx() -> Ctx {
        Ctx {
            cfg: pillbox_config::Config::default(),
            json: true,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn builtin_trace_is_a_valid_trace() {
        pillbox_config::validate_trace(&builtin_trace()).unwrap();
    }

    #[test]
    fn builtin_trace_settles_without_degradation() {
        let (session, summary) = run_trace(&ctx(), builtin_trace(), false).unwrap();
        assert!(session.is_ready());
        assert_eq!(ready_degradation(&summary), None);
        let w = session.current_weight().unwrap();
        assert!((w + 1.0).abs() < 0.05, "weight {w}");
    }

    #[test]
    fn self_check_passes_on_defaults() {
        self_check(&ctx()).unwrap();
    }
}
