#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `pillbox`: manage pill bottles and record doses from scale traces.

mod cli;
mod commands;
mod dose;
mod error_fmt;
mod logging;
mod store;

use clap::Parser;
use eyre::WrapErr;
use pillbox_core::ScheduleEdit;
use pillbox_traits::{Clock, SystemClock};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::Ctx;

fn load_config(path: Option<&Path>) -> eyre::Result<pillbox_config::Config> {
    let Some(path) = path else {
        return Ok(pillbox_config::Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config file {}", path.display()))?;
    let cfg = pillbox_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config file {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

fn run(cli: Cli, ctx: &Ctx) -> eyre::Result<()> {
    let clock = SystemClock::new();
    let now = |at: Option<chrono::NaiveDateTime>| at.unwrap_or_else(|| clock.local_now());

    match cli.cmd {
        Commands::NewBottle {
            state,
            name,
            unit_weight,
            count,
            total_weight,
            dosage,
            frequency,
            first_dose,
            owner,
            safety_lock,
            at,
        } => commands::new_bottle(
            ctx,
            &state,
            &commands::NewBottle {
                name: &name,
                unit_weight,
                count,
                total_weight,
                dosage,
                frequency: frequency.into(),
                first_dose,
                owner,
                safety_lock,
            },
            now(at),
        ),
        Commands::Count {
            unit_weight,
            total_weight,
        } => commands::count(ctx, unit_weight, total_weight, now(None)),
        Commands::Schedule { state, bottle, at } => {
            commands::schedule(ctx, &state, bottle, now(at))
        }
        Commands::Dose {
            state,
            bottle,
            trace,
            at,
            live,
        } => dose::dose(ctx, &state, bottle, &trace, now(at), live),
        Commands::Rollover { state, at } => commands::rollover(ctx, &state, now(at)),
        Commands::Edit {
            state,
            bottle,
            dosage,
            frequency,
            first_dose,
            safety_lock,
            remaining,
        } => commands::edit(
            ctx,
            &state,
            bottle,
            &commands::Edit {
                schedule: ScheduleEdit {
                    dosage_amount: dosage,
                    frequency: frequency.map(Into::into),
                    first_dose_time: first_dose,
                    safety_lock_enabled: safety_lock,
                },
                remaining,
            },
        ),
        Commands::Report {
            state,
            range,
            owner,
            at,
        } => commands::report(ctx, &state, range.into(), owner, now(at)),
        Commands::SelfCheck => dose::self_check(ctx),
    }
}

fn fail(err: &eyre::Report) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        println!("{}", error_fmt::format_error_json(err));
    } else {
        eprintln!("{}", error_fmt::humanize(err));
        tracing::debug!(error = ?err, "command failed");
    }
    std::process::exit(error_fmt::exit_code_for_error(err));
}

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    let cfg = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => fail(&e),
    };
    if let Err(e) = logging::init(&cli.log_level, cli.json, &cfg.logging) {
        eprintln!("logging disabled: {e}");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let ctx = Ctx {
        cfg,
        json: cli.json,
        shutdown,
    };
    if let Err(e) = run(cli, &ctx) {
        fail(&e);
    }
}
