#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and weight-trace parsing for the pill bottle pipeline.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; omitted keys fall back to the values the
//!   bottle firmware was tuned with.
//! - The weight-trace CSV loader enforces headers and timestamp ordering so
//!   a recorded scale session can be replayed sample for sample.
use serde::Deserialize;

/// Stabilization and tare tuning for the bottle scale.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StabilityCfg {
    /// Tare counts as applied once the reading moves by more than this (g).
    pub moved_epsilon_g: f32,
    /// Tare counts as applied once the reading is closer to zero than this (g).
    pub zero_epsilon_g: f32,
    /// A sample within ±ready_epsilon_g extends the stable run.
    pub ready_epsilon_g: f32,
    /// Consecutive in-band samples required before the reading is trusted.
    pub required_stable_samples: u32,
    /// Give up waiting for a stable run after this long (ms).
    pub timeout_ms: u64,
    /// Tare reissues before falling through to stabilization.
    pub max_tare_retries: u8,
    /// Delay between a tare command and checking its effect (ms).
    pub tare_settle_ms: u64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            moved_epsilon_g: 0.05,
            zero_epsilon_g: 0.2,
            ready_epsilon_g: 0.20,
            required_stable_samples: 3,
            timeout_ms: 5_000,
            max_tare_retries: 5,
            tare_settle_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InventoryCfg {
    /// Low stock once fewer than this many doses remain.
    pub low_stock_doses: u32,
    /// Never report low stock above this floor of pills.
    pub low_stock_min_pills: u32,
}

impl Default for InventoryCfg {
    fn default() -> Self {
        Self {
            low_stock_doses: 3,
            low_stock_min_pills: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerCfg {
    /// Fail a live session if the scale has not connected within this window (ms).
    pub connect_timeout_ms: u64,
    /// Hard cap on a single live session (ms).
    pub max_run_ms: u64,
    /// Upper bound on a single wait for the next sensor event (ms).
    pub poll_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            max_run_ms: 120_000,
            poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub stability: StabilityCfg,
    pub inventory: InventoryCfg,
    pub runner: RunnerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Stability
        let s = &self.stability;
        if !(s.moved_epsilon_g > 0.0 && s.moved_epsilon_g.is_finite()) {
            eyre::bail!("stability.moved_epsilon_g must be > 0");
        }
        if !(s.zero_epsilon_g > 0.0 && s.zero_epsilon_g.is_finite()) {
            eyre::bail!("stability.zero_epsilon_g must be > 0");
        }
        if !(s.ready_epsilon_g > 0.0 && s.ready_epsilon_g.is_finite()) {
            eyre::bail!("stability.ready_epsilon_g must be > 0");
        }
        if s.ready_epsilon_g > 10.0 {
            eyre::bail!("stability.ready_epsilon_g is unreasonably large (>10 g)");
        }
        if s.required_stable_samples == 0 {
            eyre::bail!("stability.required_stable_samples must be >= 1");
        }
        if s.timeout_ms == 0 {
            eyre::bail!("stability.timeout_ms must be >= 1");
        }
        if s.timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("stability.timeout_ms is unreasonably large (>10min)");
        }
        if s.tare_settle_ms == 0 {
            eyre::bail!("stability.tare_settle_ms must be >= 1");
        }

        // Inventory
        if self.inventory.low_stock_doses == 0 {
            eyre::bail!("inventory.low_stock_doses must be >= 1");
        }
        if self.inventory.low_stock_min_pills == 0 {
            eyre::bail!("inventory.low_stock_min_pills must be >= 1");
        }

        // Runner
        if self.runner.connect_timeout_ms == 0 {
            eyre::bail!("runner.connect_timeout_ms must be >= 1");
        }
        if self.runner.max_run_ms < self.runner.connect_timeout_ms {
            eyre::bail!("runner.max_run_ms must be >= runner.connect_timeout_ms");
        }
        if self.runner.poll_ms == 0 {
            eyre::bail!("runner.poll_ms must be >= 1");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{rotation}'");
        }

        Ok(())
    }
}

/// Kind of a recorded scale event.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TraceEvent {
    Weight,
    Connected,
    Disconnected,
}

/// Weight-trace CSV schema.
///
/// Expected headers:
/// ms,event,grams
///
/// `grams` is the gross load on the scale (before any tare) and is left
/// empty for lifecycle events.
///
/// Example:
/// ms,event,grams
/// 0,weight,4.10
/// 100,connected,
/// 200,weight,4.10
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub ms: u64,
    pub event: TraceEvent,
    pub grams: Option<f32>,
}

/// Check ordering and payload rules on an already-parsed trace.
pub fn validate_trace(rows: &[TraceRow]) -> eyre::Result<()> {
    if rows.is_empty() {
        eyre::bail!("weight trace is empty");
    }
    for (i, row) in rows.iter().enumerate() {
        if i > 0 && row.ms < rows[i - 1].ms {
            eyre::bail!(
                "weight trace timestamps must be non-decreasing (row {} at {} ms after {} ms)",
                i + 2,
                row.ms,
                rows[i - 1].ms
            );
        }
        match (row.event, row.grams) {
            (TraceEvent::Weight, None) => {
                eyre::bail!("weight trace row {} is a weight event without grams", i + 2)
            }
            (TraceEvent::Weight, Some(g)) if !g.is_finite() => {
                eyre::bail!("weight trace row {} has a non-finite weight", i + 2)
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn load_weight_trace(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open weight trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["ms", "event", "grams"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "weight trace CSV must have headers 'ms,event,grams', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    validate_trace(&rows)?;
    Ok(rows)
}
