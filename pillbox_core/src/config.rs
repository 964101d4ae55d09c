//! Runtime configuration for the detector, inventory status and runners.
//!
//! These are separate from the TOML-deserialized config in `pillbox_config`;
//! durations are already converted and the types carry no serde concerns.

use std::time::Duration;

/// Stabilization and tare tuning.
#[derive(Debug, Clone)]
pub struct StabilityCfg {
    /// Tare took effect if the reading moved by more than this (g).
    pub moved_epsilon_g: f32,
    /// Tare took effect if the reading is within this of zero (g).
    pub zero_epsilon_g: f32,
    /// Band around zero that counts as a stable sample (g).
    pub ready_epsilon_g: f32,
    /// Consecutive in-band samples required for Ready.
    pub required_stable_samples: u32,
    /// Stabilization gives up (degraded Ready) after this long.
    pub timeout: Duration,
    /// Tare reissues before falling through to stabilization.
    pub max_tare_retries: u8,
    /// Delay between a tare command and the check of its effect.
    pub tare_settle: Duration,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            moved_epsilon_g: 0.05,
            zero_epsilon_g: 0.2,
            ready_epsilon_g: 0.20,
            required_stable_samples: 3,
            timeout: Duration::from_secs(5),
            max_tare_retries: 5,
            tare_settle: Duration::from_secs(1),
        }
    }
}

/// Low-stock thresholds.
#[derive(Debug, Clone)]
pub struct InventoryCfg {
    pub low_stock_doses: u32,
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

/// Live runner limits.
#[derive(Debug, Clone)]
pub struct RunnerCfg {
    /// No Connected event within this window is a connect timeout.
    pub connect_timeout: Duration,
    /// Hard cap on a live session.
    pub max_run: Duration,
    /// Upper bound on one wait for the next event.
    pub poll: Duration,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_run: Duration::from_secs(120),
            poll: Duration::from_millis(50),
        }
    }
}
