//! `From` implementations bridging `pillbox_config` types to `pillbox_core` types.

use std::time::Duration;

use crate::config::{InventoryCfg, RunnerCfg, StabilityCfg};

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&pillbox_config::StabilityCfg> for StabilityCfg {
    fn from(c: &pillbox_config::StabilityCfg) -> Self {
        Self {
            moved_epsilon_g: c.moved_epsilon_g,
            zero_epsilon_g: c.zero_epsilon_g,
            ready_epsilon_g: c.ready_epsilon_g,
            required_stable_samples: c.required_stable_samples,
            timeout: Duration::from_millis(c.timeout_ms),
            max_tare_retries: c.max_tare_retries,
            tare_settle: Duration::from_millis(c.tare_settle_ms),
        }
    }
}

// ── InventoryCfg ─────────────────────────────────────────────────────────────

impl From<&pillbox_config::InventoryCfg> for InventoryCfg {
    fn from(c: &pillbox_config::InventoryCfg) -> Self {
        Self {
            low_stock_doses: c.low_stock_doses,
            low_stock_min_pills: c.low_stock_min_pills,
        }
    }
}

// ── RunnerCfg ────────────────────────────────────────────────────────────────

impl From<&pillbox_config::RunnerCfg> for RunnerCfg {
    fn from(c: &pillbox_config::RunnerCfg) -> Self {
        Self {
            connect_timeout: Duration::from_millis(c.connect_timeout_ms),
            max_run: Duration::from_millis(c.max_run_ms),
            poll: Duration::from_millis(c.poll_ms),
        }
    }
}
