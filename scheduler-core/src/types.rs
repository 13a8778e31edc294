//! Semantic types shared across the core. These mirror the host's data
//! model (Machine / VM / Task) but are pure value types owned by the
//! core's side of the boundary; the host remains the source of truth for
//! anything numeric that changes as tasks run (see `inventory` module docs).

use serde::{Deserialize, Serialize};

/// Simulator clock, expressed in the host's native microsecond resolution.
pub type TimeUs = u64;

/// CPU instruction-set architecture of a machine, and the architecture a
/// task/VM requires. `Other` keeps the mapping total: a host may report an
/// architecture this core has no default guest mapping for, which the
/// provisioner surfaces as `SchedulerError::UnknownCpu` rather than panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CpuArch {
    X86,
    Power,
    Arm,
    Other(u32),
}

/// Guest operating system a VM runs and a task requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuestType {
    Linux,
    Aix,
    Win,
    Other(u32),
}

impl CpuArch {
    /// The architecture's default guest type, used only at init-time
    /// provisioning. Returns `None` for architectures with no known
    /// default; the caller raises `UnknownCpu`.
    pub fn default_guest_type(self) -> Option<GuestType> {
        match self {
            CpuArch::X86 => Some(GuestType::Linux),
            CpuArch::Power => Some(GuestType::Aix),
            CpuArch::Arm => Some(GuestType::Win),
            CpuArch::Other(_) => None,
        }
    }
}

/// Machine sleep state. S0 is fully on; S5 is off. Intermediate states are
/// modeled so a host that reports them does not confuse the core, but the
/// core itself only ever requests S0 or S5 transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SState {
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
}

impl SState {
    pub fn is_on(self) -> bool {
        matches!(self, SState::S0)
    }
}

/// Processor performance state. P0 is fastest/highest-power, P3 is
/// slowest/lowest-power. Ordered so `PState::P2 > PState::P1` reads as
/// "P2 is slower than P1".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PState {
    P0,
    P1,
    P2,
    P3,
}

impl PState {
    pub const ALL: [PState; 4] = [PState::P0, PState::P1, PState::P2, PState::P3];

    pub fn index(self) -> usize {
        match self {
            PState::P0 => 0,
            PState::P1 => 1,
            PState::P2 => 2,
            PState::P3 => 3,
        }
    }

    /// Picks the P-state for a given utilization ratio per the DVFS step
    /// table. `utilization` is `active_tasks / core_count`.
    pub fn for_utilization(utilization: f64, thresholds: &crate::config::DvfsThresholds) -> PState {
        if utilization > thresholds.p0_above {
            PState::P0
        } else if utilization > thresholds.p1_above {
            PState::P1
        } else if utilization > thresholds.p2_above {
            PState::P2
        } else {
            PState::P3
        }
    }
}

/// SLA class; SLA0 is strictest, SLA3 carries no violation penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlaClass {
    Sla0,
    Sla1,
    Sla2,
    Sla3,
}

/// Per-P-state MIPS figures for a machine, indexed `[P0, P1, P2, P3]`.
pub type MipsTable = [u64; 4];

/// Snapshot of a machine's state as reported by `SimHost::machine_info`.
#[derive(Debug, Clone)]
pub struct MachineInfo {
    pub cpu: CpuArch,
    pub s_state: SState,
    pub p_state: PState,
    pub memory_capacity_bytes: u64,
    pub memory_used_bytes: u64,
    pub num_cores: u32,
    pub active_tasks: u32,
    pub active_vms: u32,
    pub has_gpu: bool,
    pub mips: MipsTable,
}

impl MachineInfo {
    pub fn mips_at(&self, p: PState) -> u64 {
        self.mips[p.index()]
    }

    pub fn utilization(&self) -> f64 {
        if self.num_cores == 0 {
            return 0.0;
        }
        f64::from(self.active_tasks) / f64::from(self.num_cores)
    }
}

/// Snapshot of a VM's state as reported by `SimHost::vm_info`.
#[derive(Debug, Clone)]
pub struct VmInfo {
    pub guest_type: GuestType,
    pub required_cpu: CpuArch,
    /// `None` while the VM is unattached or migrating.
    pub machine_id: Option<crate::ids::MachineId>,
    pub active_tasks: u32,
}

/// Snapshot of a task's requirements as reported by `SimHost::task_info`.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub required_cpu: CpuArch,
    pub required_guest: GuestType,
    pub required_memory_bytes: u64,
    pub arrival_time_us: TimeUs,
    pub target_completion_us: TimeUs,
    pub remaining_instructions: u64,
    pub sla_class: SlaClass,
    pub priority: u32,
    pub gpu_capable: bool,
}
