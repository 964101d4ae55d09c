//! Bottle, schedule and report commands.

use chrono::{NaiveDateTime, NaiveTime};
use eyre::WrapErr;
use pillbox_core::reminders;
use pillbox_core::{
    AnalyticsRange, BottleCounter, DoseSchedule, Frequency, InventoryCfg, PillBottle,
    PillCalibrator, PillError, ScheduleEdit, advance, apply_edit, correct_remaining, summarize,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use uuid::Uuid;

use crate::store::Shelf;

/// Everything a command needs besides its own arguments.
pub struct Ctx {
    pub cfg: pillbox_config::Config,
    pub json: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl Ctx {
    pub fn inventory(&self) -> InventoryCfg {
        (&self.cfg.inventory).into()
    }

    /// JSON mode prints `value` as one line; otherwise `human` is printed.
    pub fn emit(&self, value: &Value, human: impl FnOnce() -> String) {
        if self.json {
            println!("{value}");
        } else {
            println!("{}", human());
        }
    }
}

fn fmt_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn fmt_at(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

pub struct NewBottle<'a> {
    pub name: &'a str,
    pub unit_weight: f32,
    pub count: Option<u32>,
    pub total_weight: Option<f32>,
    pub dosage: u32,
    pub frequency: Frequency,
    pub first_dose: NaiveTime,
    pub owner: Option<Uuid>,
    pub safety_lock: bool,
}

pub fn new_bottle(ctx: &Ctx, state: &Path, args: &NewBottle<'_>, at: NaiveDateTime) -> eyre::Result<()> {
    let mut calibrator = PillCalibrator::new();
    calibrator.observe(args.unit_weight);
    let pill = calibrator.capture(args.name, at)?;

    let count = match (args.count, args.total_weight) {
        (Some(n), _) => n,
        (None, Some(total)) => BottleCounter::new(Some(pill.clone())).initial_count(total)?,
        (None, None) => {
            return Err(PillError::Inventory("pass --count or --total-weight".into()).into());
        }
    };
    let schedule = DoseSchedule::new(args.dosage, args.frequency, args.first_dose)?;

    let mut builder = PillBottle::builder()
        .pill(pill)
        .schedule(schedule)
        .initial_count(count)
        .safety_lock(args.safety_lock)
        .created_at(at);
    if let Some(owner) = args.owner {
        builder = builder.owner(owner);
    }
    let bottle = builder.try_build()?;

    let mut shelf = Shelf::load(state)?;
    tracing::info!(
        bottle = %bottle.id,
        pill = %bottle.pill.name,
        count,
        "new bottle"
    );
    let out = json!({
        "bottle_id": bottle.id,
        "pill": bottle.pill.name,
        "unit_weight_g": bottle.pill.unit_weight_g,
        "initial_pill_count": bottle.initial_pill_count,
        "frequency": bottle.schedule.frequency,
        "dosage_amount": bottle.schedule.dosage_amount,
    });
    let human = format!(
        "Added {} ({} pills, {} x {}) as bottle {}",
        bottle.pill.name,
        bottle.initial_pill_count,
        bottle.schedule.dosage_amount,
        bottle.schedule.frequency,
        bottle.id
    );
    shelf.bottles.push(bottle);
    shelf.save(state)?;
    ctx.emit(&out, || human);
    Ok(())
}

pub fn count(ctx: &Ctx, unit_weight: f32, total_weight: f32, at: NaiveDateTime) -> eyre::Result<()> {
    let mut calibrator = PillCalibrator::new();
    calibrator.observe(unit_weight);
    let counter = BottleCounter::new(Some(calibrator.capture("pill", at)?));
    let pills = counter.count(total_weight)?;
    let offered = counter.initial_count(total_weight)?;
    ctx.emit(&json!({ "pills": pills, "initial_count": offered }), || {
        format!("{pills} pills (initial count {offered})")
    });
    Ok(())
}

pub fn schedule(ctx: &Ctx, state: &Path, bottle: Option<Uuid>, at: NaiveDateTime) -> eyre::Result<()> {
    let mut shelf = Shelf::load(state)?;
    let inventory = ctx.inventory();
    let b = shelf.select_mut(bottle)?;
    // Show today's tallies as of `at` without committing the rollover.
    let mut view = b.clone();
    advance(&mut view.adherence, at.date());

    let today = view.dose_times(at.date());
    let next = view.next_dose_after(at);
    let badges = view.time_of_day_badges();
    let plan = reminders::plan(&view);
    let low = view.is_low_stock(&inventory);
    let taken_today = view.has_taken_on(at.date());

    let out = json!({
        "bottle_id": view.id,
        "pill": view.pill.name,
        "dose_times": today,
        "next_dose": next,
        "badges": badges,
        "doses_per_day": view.doses_per_day(),
        "total_daily_pills": view.total_daily_pills(),
        "pills_taken_today": view.adherence.pills_taken_today,
        "taken_today": taken_today,
        "remaining": view.remaining_pill_count,
        "low_stock": low,
        "reminders": plan,
    });
    ctx.emit(&out, || {
        let mut lines = vec![format!(
            "{}: {} x {} ({} pills/day), {} left{}",
            view.pill.name,
            view.schedule.dosage_amount,
            view.schedule.frequency,
            view.total_daily_pills(),
            view.remaining_pill_count,
            if low { " (low stock)" } else { "" }
        )];
        let times: Vec<String> = today.iter().map(|t| fmt_time(t.time())).collect();
        let badges: Vec<String> = badges.iter().map(ToString::to_string).collect();
        lines.push(format!("Today: {} [{}]", times.join(", "), badges.join(", ")));
        if let Some(n) = next {
            lines.push(format!("Next dose: {}", fmt_at(n)));
        }
        lines.push(format!(
            "Taken today: {} pills{}",
            view.adherence.pills_taken_today,
            if taken_today { "" } else { " (none yet)" }
        ));
        for r in &plan {
            lines.push(format!("Reminder {} at {:02}:{:02}: {}", r.id, r.hour, r.minute, r.body));
        }
        lines.join("\n")
    });
    Ok(())
}

pub fn rollover(ctx: &Ctx, state: &Path, at: NaiveDateTime) -> eyre::Result<()> {
    let mut shelf = Shelf::load(state)?;
    let day = at.date();
    let mut rows = Vec::with_capacity(shelf.bottles.len());
    for b in &mut shelf.bottles {
        let r = advance(&mut b.adherence, day);
        rows.push(json!({
            "bottle_id": b.id,
            "days_passed": r.days_passed,
            "weeks_closed": r.weeks_closed,
            "months_closed": r.months_closed,
        }));
    }
    shelf.save(state)?;
    let out = json!({ "date": day, "bottles": rows });
    ctx.emit(&out, || {
        rows.iter()
            .map(|r| {
                format!(
                    "{}: {} days, {} weeks closed, {} months closed",
                    r["bottle_id"].as_str().unwrap_or("?"),
                    r["days_passed"],
                    r["weeks_closed"],
                    r["months_closed"]
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

pub struct Edit {
    pub schedule: ScheduleEdit,
    pub remaining: Option<u32>,
}

pub fn edit(ctx: &Ctx, state: &Path, bottle: Option<Uuid>, edit: &Edit) -> eyre::Result<()> {
    if edit.schedule.is_empty() && edit.remaining.is_none() {
        return Err(PillError::State("nothing to edit".into()).into());
    }
    let mut shelf = Shelf::load(state)?;
    let b = shelf.select_mut(bottle)?;
    if !edit.schedule.is_empty() {
        apply_edit(b, &edit.schedule).wrap_err("apply schedule edit")?;
    }
    if let Some(n) = edit.remaining {
        correct_remaining(b, n).wrap_err("correct remaining pills")?;
    }
    let out = json!({
        "bottle_id": b.id,
        "dosage_amount": b.schedule.dosage_amount,
        "frequency": b.schedule.frequency,
        "first_dose_time": b.schedule.first_dose_time,
        "safety_lock_enabled": b.safety_lock_enabled,
        "remaining": b.remaining_pill_count,
    });
    let human = format!(
        "{}: {} x {}, first dose {}, {} of {} left",
        b.pill.name,
        b.schedule.dosage_amount,
        b.schedule.frequency,
        fmt_time(b.schedule.first_dose_time),
        b.remaining_pill_count,
        b.initial_pill_count
    );
    shelf.save(state)?;
    ctx.emit(&out, || human);
    Ok(())
}

pub fn report(
    ctx: &Ctx,
    state: &Path,
    range: AnalyticsRange,
    owner: Option<Uuid>,
    at: NaiveDateTime,
) -> eyre::Result<()> {
    let mut shelf = Shelf::load(state)?;
    for b in &mut shelf.bottles {
        advance(&mut b.adherence, at.date());
    }
    let summary = summarize(&shelf.bottles, range, owner);
    let out = serde_json::to_value(&summary).wrap_err("serialize report")?;
    ctx.emit(&out, || {
        let mut lines = vec![format!(
            "{} pills over the last {} across {} bottles",
            summary.total_pills,
            out["range"].as_str().unwrap_or("period"),
            summary.bottles_tracked
        )];
        for t in &summary.per_bottle {
            lines.push(format!("  {} ({}): {}", t.pill, t.bottle_id, t.pills));
        }
        lines.join("\n")
    });
    Ok(())
}
