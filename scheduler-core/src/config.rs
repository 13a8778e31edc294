//! Layered configuration for the scheduler core. Constructible in code, or
//! loaded from TOML via `serde` the way this codebase's CLI tools load
//! their config files.

use serde::{Deserialize, Serialize};

/// The DVFS utilization thresholds for the P-state step table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DvfsThresholds {
    pub p0_above: f64,
    pub p1_above: f64,
    pub p2_above: f64,
}

impl Default for DvfsThresholds {
    fn default() -> Self {
        Self {
            p0_above: 0.80,
            p1_above: 0.50,
            p2_above: 0.20,
        }
    }
}

/// All tunables the scheduler core reads at init or on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// `ACTIVE_MACHINES_BUDGET`. Default 64 for the SLA-aware preset.
    pub active_machines_budget: usize,
    /// `VM_MEMORY_OVERHEAD`, the fixed memory tax charged per VM instance.
    pub vm_memory_overhead_bytes: u64,
    /// DVFS step table.
    pub dvfs_thresholds: DvfsThresholds,
    /// Placement score discount for a GPU-capable task on a GPU machine.
    pub gpu_factor: f64,
    /// Deadline-slack ratio gating `BoostPerformance` in the periodic SLA
    /// pass: boost when `eta > (deadline - now) * deadline_slack_ratio`.
    pub deadline_slack_ratio: f64,
    /// Whether C4 deactivates idle machines ("consolidation").
    pub consolidation_enabled: bool,
    /// Whether placement tier 3 (wake a dormant machine) runs when tiers 1
    /// and 2 are exhausted.
    pub wake_on_exhaustion: bool,
    /// Whether `SLAWarning` may additionally request a migration when the
    /// task is GPU-capable and its machine lacks a GPU.
    pub migrate_on_sla_warning: bool,
}

impl Default for SchedulerConfig {
    /// The SLA-aware preset: budget 64, consolidation disabled.
    fn default() -> Self {
        Self {
            active_machines_budget: 64,
            vm_memory_overhead_bytes: 256 * 1024 * 1024,
            dvfs_thresholds: DvfsThresholds::default(),
            gpu_factor: 0.5,
            deadline_slack_ratio: 0.5,
            consolidation_enabled: false,
            wake_on_exhaustion: true,
            migrate_on_sla_warning: true,
        }
    }
}

impl SchedulerConfig {
    /// Round-robin variant: a smaller active-machine budget, no
    /// consolidation, same three-tier placement behavior.
    pub fn round_robin_preset() -> Self {
        Self {
            active_machines_budget: 16,
            ..Self::default()
        }
    }

    /// Energy-conservative preset: the only preset with consolidation
    /// enabled.
    pub fn energy_conservative_preset() -> Self {
        Self {
            consolidation_enabled: true,
            ..Self::default()
        }
    }

    /// Parses a config from TOML text, matching this codebase's CLI
    /// convention of layering a config file over defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
