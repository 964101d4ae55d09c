//! Event pump lifecycle and the live runner's stop conditions.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::NaiveDate;
use pillbox_config::{TraceEvent, TraceRow};
use pillbox_core::config::{RunnerCfg, StabilityCfg};
use pillbox_core::error::PillError;
use pillbox_core::pump::{EventPump, PumpRecv};
use pillbox_core::runner::{StopReason, run_live};
use pillbox_core::session::DoseSession;
use pillbox_core::timer::CancelToken;
use pillbox_scale::{Pacing, SimulatedScale};
use pillbox_traits::{ManualClock, SensorEvent, SensorSource, SystemClock};

struct QuietSource;

impl SensorSource for QuietSource {
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<SensorEvent>, Box<dyn std::error::Error + Send + Sync>> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

fn manual() -> ManualClock {
    ManualClock::new(
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    )
}

fn w(ms: u64, g: f32) -> TraceRow {
    TraceRow {
        ms,
        event: TraceEvent::Weight,
        grams: Some(g),
    }
}

fn ev(ms: u64, event: TraceEvent) -> TraceRow {
    TraceRow {
        ms,
        event,
        grams: None,
    }
}

#[test]
fn pump_thread_exits_on_drop() {
    let pump = EventPump::spawn(QuietSource, Duration::from_millis(10));
    assert_eq!(pump.recv_timeout(Duration::from_millis(20)), PumpRecv::Idle);
    drop(pump);
}

#[test]
fn pump_forwards_every_event_then_closes() {
    let rows = (0..50).map(|i| w(i, 1.0)).collect();
    let scale = SimulatedScale::new(rows, manual(), Pacing::Unpaced);
    let pump = EventPump::spawn(scale, Duration::from_millis(5));
    let mut n = 0;
    loop {
        match pump.recv_timeout(Duration::from_secs(2)) {
            PumpRecv::Event(_) => n += 1,
            PumpRecv::Closed => break,
            PumpRecv::Idle => panic!("pump stalled"),
        }
    }
    assert_eq!(n, 50);
    assert_eq!(pump.error_count(), 0);
}

#[test]
fn live_run_reaches_ready_and_stops_on_disconnect() {
    let rows = vec![
        w(0, 5.0),
        ev(10, TraceEvent::Connected),
        w(30, 5.0),
        w(60, 5.0),
        w(80, 5.0),
        w(100, 5.0),
        w(120, 5.0),
        ev(200, TraceEvent::Disconnected),
    ];
    let clock = SystemClock::new();
    let scale = SimulatedScale::new(rows, clock, Pacing::RealTime);
    let stability = StabilityCfg {
        tare_settle: Duration::from_millis(20),
        timeout: Duration::from_millis(500),
        ..StabilityCfg::default()
    };
    let mut session = DoseSession::new(scale.tare_handle(), stability, CancelToken::new());
    let pump = EventPump::spawn(scale, Duration::from_millis(5));
    let cfg = RunnerCfg {
        connect_timeout: Duration::from_secs(2),
        max_run: Duration::from_secs(5),
        poll: Duration::from_millis(5),
    };

    let summary = run_live(&mut session, &pump, &clock, &cfg, None).unwrap();
    assert_eq!(summary.stop, StopReason::Disconnected);
    assert_eq!(summary.events, 8);
    assert!(session.is_ready());
}

#[test]
fn missing_connect_is_a_timeout_error() {
    let clock = SystemClock::new();
    let scale = SimulatedScale::new(vec![w(60_000, 1.0)], clock, Pacing::RealTime);
    let mut session =
        DoseSession::new(scale.tare_handle(), StabilityCfg::default(), CancelToken::new());
    let pump = EventPump::spawn(scale, Duration::from_millis(5));
    let cfg = RunnerCfg {
        connect_timeout: Duration::from_millis(50),
        max_run: Duration::from_secs(2),
        poll: Duration::from_millis(5),
    };

    let err = run_live(&mut session, &pump, &clock, &cfg, None).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PillError>(),
        Some(&PillError::ConnectTimeout)
    );
}

#[test]
fn raised_shutdown_flag_interrupts() {
    let clock = SystemClock::new();
    let pump = EventPump::spawn(QuietSource, Duration::from_millis(5));
    let scale = SimulatedScale::new(vec![], clock, Pacing::Unpaced);
    let mut session =
        DoseSession::new(scale.tare_handle(), StabilityCfg::default(), CancelToken::new());
    let flag = AtomicBool::new(true);
    let summary = run_live(&mut session, &pump, &clock, &RunnerCfg::default(), Some(&flag)).unwrap();
    assert_eq!(summary.stop, StopReason::Interrupted);
    assert_eq!(summary.events, 0);
}
