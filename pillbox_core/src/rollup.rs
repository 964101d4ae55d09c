//! Daily → weekly → monthly adherence rollover.
//!
//! Days are folded into the windows one at a time. Every 7th daily sample
//! closes a week and every 4th weekly sample closes a month, so the open
//! buckets never exceed 7 and 4 entries even across multi-day gaps.

use chrono::NaiveDate;

use crate::model::Adherence;

pub const DAYS_PER_WEEK: usize = 7;
pub const WEEKS_PER_MONTH: usize = 4;
pub const MONTHS_KEPT: usize = 12;

/// Zero days after which every window holds only zeros and the open buckets
/// cycle with period `CYCLE_DAYS`.
const SETTLE_DAYS: u64 = 2 * (DAYS_PER_WEEK * WEEKS_PER_MONTH * MONTHS_KEPT) as u64;
const CYCLE_DAYS: u64 = (DAYS_PER_WEEK * WEEKS_PER_MONTH) as u64;

/// What a call to [`advance`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rollover {
    pub days_passed: u64,
    pub weeks_closed: u64,
    pub months_closed: u64,
}

fn push_capped(v: &mut Vec<u32>, value: u32, cap: usize) {
    v.push(value);
    if v.len() > cap {
        let excess = v.len() - cap;
        v.drain(..excess);
    }
}

fn saturating_sum(v: &[u32]) -> u32 {
    v.iter().fold(0u32, |acc, x| acc.saturating_add(*x))
}

fn fold_day(a: &mut Adherence, tally: u32, out: &mut Rollover) {
    push_capped(&mut a.daily_last7, tally, DAYS_PER_WEEK);
    a.daily_week_bucket.push(tally);
    if a.daily_week_bucket.len() < DAYS_PER_WEEK {
        return;
    }

    let week = saturating_sum(&a.daily_week_bucket);
    a.daily_week_bucket.clear();
    push_capped(&mut a.weekly_last4, week, WEEKS_PER_MONTH);
    a.weekly_month_bucket.push(week);
    out.weeks_closed += 1;
    if a.weekly_month_bucket.len() < WEEKS_PER_MONTH {
        return;
    }

    let month = saturating_sum(&a.weekly_month_bucket);
    a.weekly_month_bucket.clear();
    push_capped(&mut a.monthly_last12, month, MONTHS_KEPT);
    out.months_closed += 1;
}

fn fold_zero_days(a: &mut Adherence, days: u64, out: &mut Rollover) {
    let mut remaining = days;
    if remaining > SETTLE_DAYS {
        for _ in 0..SETTLE_DAYS {
            fold_day(a, 0, out);
        }
        let skipped = (remaining - SETTLE_DAYS) / CYCLE_DAYS * CYCLE_DAYS;
        out.weeks_closed += skipped / DAYS_PER_WEEK as u64;
        out.months_closed += skipped / CYCLE_DAYS;
        remaining = (remaining - SETTLE_DAYS) % CYCLE_DAYS;
    }
    for _ in 0..remaining {
        fold_day(a, 0, out);
    }
}

/// Bring `a` up to `today`: fold the skipped days (as zeros) and the tracked
/// day's tally into the windows, then reset the tally for `today`.
///
/// Idempotent within a day. A `today` before the tracked day leaves `a`
/// untouched.
pub fn advance(a: &mut Adherence, today: NaiveDate) -> Rollover {
    let mut out = Rollover::default();
    let days = (today - a.tracking_date).num_days();
    if days == 0 {
        return out;
    }
    if days < 0 {
        tracing::warn!(
            tracked = %a.tracking_date,
            today = %today,
            "clock moved backwards; adherence rollover skipped"
        );
        return out;
    }

    #[allow(clippy::cast_sign_loss)]
    let days = days as u64;
    out.days_passed = days;

    fold_zero_days(a, days - 1, &mut out);
    let tally = a.pills_taken_today;
    fold_day(a, tally, &mut out);

    a.pills_taken_today = 0;
    a.tracking_date = today;
    tracing::info!(
        days_passed = out.days_passed,
        weeks_closed = out.weeks_closed,
        months_closed = out.months_closed,
        carried = tally,
        "adherence rolled over"
    );
    out
}
