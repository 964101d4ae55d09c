use std::time::Duration;

use chrono::NaiveDate;
use pillbox_config::{TraceEvent, TraceRow};
use pillbox_scale::error::ScaleError;
use pillbox_scale::{Pacing, SimulatedScale};
use pillbox_traits::{Clock, ManualClock, ScaleLink, SensorEvent, SensorSource};
use rstest::rstest;

fn clock() -> ManualClock {
    ManualClock::new(
        NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
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

fn grams(e: &SensorEvent) -> f32 {
    match e {
        SensorEvent::Weight { grams, .. } => *grams,
        other => panic!("expected weight, got {other:?}"),
    }
}

#[rstest]
fn tare_zeroes_later_readings() {
    let rows = vec![w(0, 12.0), w(100, 12.0), w(200, 11.5)];
    let mut scale = SimulatedScale::new(rows, clock(), Pacing::Unpaced);
    let mut link = scale.tare_handle();

    assert!((grams(&scale.next().unwrap()) - 12.0).abs() < 1e-6);
    link.tare().unwrap();
    assert!(grams(&scale.next().unwrap()).abs() < 1e-6);
    assert!((grams(&scale.next().unwrap()) + 0.5).abs() < 1e-6);
    assert_eq!(link.tares_applied(), 1);
    assert!(scale.next().is_none());
}

#[rstest]
fn ignored_tares_leave_zero_point() {
    let rows = vec![w(0, 5.0)];
    let mut scale = SimulatedScale::new(rows, clock(), Pacing::Unpaced).ignore_first_tares(2);
    let mut link = scale.tare_handle();
    scale.next();
    link.tare().unwrap();
    link.tare().unwrap();
    assert_eq!(link.zero_g(), 0.0);
    link.tare().unwrap();
    assert_eq!(link.zero_g(), 5.0);
    assert_eq!(link.tares_seen(), 3);
}

#[rstest]
fn rejected_tare_is_an_error() {
    let scale = SimulatedScale::new(vec![], clock(), Pacing::Unpaced).reject_tares();
    let mut link = scale.tare_handle();
    let err = link.tare().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScaleError>(),
        Some(ScaleError::TareRejected)
    ));
}

#[rstest]
fn timestamps_are_offsets_from_origin() {
    let rows = vec![ev(0, TraceEvent::Connected), ev(2500, TraceEvent::Disconnected)];
    let mut scale = SimulatedScale::new(rows, clock(), Pacing::Unpaced);
    let origin = scale.origin();
    let a = scale.next().unwrap();
    let b = scale.next().unwrap();
    assert_eq!(a, SensorEvent::Connected { at: origin });
    assert_eq!(
        b,
        SensorEvent::Disconnected {
            at: origin + Duration::from_millis(2500)
        }
    );
}

#[rstest]
fn paced_source_waits_for_row_time() {
    let c = clock();
    let mut scale = SimulatedScale::new(vec![w(1000, 1.0)], c.clone(), Pacing::RealTime);
    // Manual clock sleeps advance time instead of blocking.
    let first = scale.next_event(Duration::from_millis(400)).unwrap();
    assert!(first.is_none());
    assert!(!scale.is_finished());
    let second = scale.next_event(Duration::from_millis(1000)).unwrap();
    assert!(second.is_some());
    assert!(scale.is_finished());
    assert_eq!(c.ms_since(scale.origin()), 1000);
}

#[rstest]
fn malformed_weight_row_is_skipped_on_replay() {
    let rows = vec![
        TraceRow {
            ms: 0,
            event: TraceEvent::Weight,
            grams: None,
        },
        w(10, 2.0),
    ];
    let mut scale = SimulatedScale::new(rows, clock(), Pacing::Unpaced);
    assert!((grams(&scale.next().unwrap()) - 2.0).abs() < 1e-6);
}
