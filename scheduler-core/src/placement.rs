//! Placement Engine (C3). The three-tier `place` algorithm: reuse a warm
//! VM, else grow in place, else pay the wake-up cost.

use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::host::SimHost;
use crate::ids::{MachineId, TaskId, VmId};
use crate::inventory::FleetInventory;
use crate::provisioner;
use crate::types::{MachineInfo, PState, SlaClass, TaskInfo};

/// Outcome of a placement attempt. No tier in this implementation currently
/// emits `Deferred`; it stays in the type for a future tier that wants to
/// ask the host to retry without reporting a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed(VmId),
    Deferred,
}

/// `load * speed_ratio * gpu_factor`. Lower is better. A degenerate machine
/// report (zero cores, zero MIPS at P0) can drive this to NaN; callers must
/// compare scores with [`score_order`], not raw `<`/`>`, so a NaN candidate
/// always loses to any real one.
fn score(machine: &MachineInfo, task: &TaskInfo, config: &SchedulerConfig) -> f64 {
    let load = if machine.num_cores == 0 {
        f64::INFINITY
    } else {
        f64::from(machine.active_tasks) / f64::from(machine.num_cores)
    };
    let mips_current = machine.mips_at(machine.p_state).max(1);
    let speed_ratio = machine.mips_at(PState::P0) as f64 / mips_current as f64;
    let gpu_factor = if task.gpu_capable && machine.has_gpu {
        config.gpu_factor
    } else {
        1.0
    };
    load * speed_ratio * gpu_factor
}

/// Orders two scores, lower-is-better, with NaN always sorting as worst
/// (as if it were positive infinity) rather than comparing unordered.
fn score_order(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(&b).expect("neither operand is NaN"),
    }
}

fn fits_memory(machine: &MachineInfo, task: &TaskInfo, overhead: u64) -> bool {
    machine
        .memory_used_bytes
        .saturating_add(task.required_memory_bytes)
        .saturating_add(overhead)
        <= machine.memory_capacity_bytes
}

/// Tier 1: reuse an existing, already-attached VM. Returns the winning
/// `(vm, score)` pair, ties broken by lowest `VmId`.
fn best_existing_vm<H: SimHost>(
    host: &H,
    inv: &FleetInventory,
    task: &TaskInfo,
    config: &SchedulerConfig,
) -> Option<VmId> {
    let mut best: Option<(VmId, f64)> = None;

    for &vm_id in inv.vms() {
        if inv.is_vm_migrating(vm_id) {
            continue;
        }
        let vm = host.vm_info(vm_id);
        let Some(machine_id) = vm.machine_id else {
            continue; // unattached during migration
        };
        if vm.guest_type != task.required_guest {
            continue;
        }
        if inv.is_machine_warming(machine_id) {
            continue;
        }
        let machine = host.machine_info(machine_id);
        if !machine.s_state.is_on() {
            continue;
        }
        if machine.cpu != task.required_cpu {
            continue;
        }
        // Overhead already paid for an existing VM; only the task's own
        // memory need still fit.
        if !fits_memory(&machine, task, 0) {
            continue;
        }

        let candidate_score = score(&machine, task, config);
        best = match best {
            Some((best_vm, best_score)) => match score_order(candidate_score, best_score) {
                std::cmp::Ordering::Less => Some((vm_id, candidate_score)),
                std::cmp::Ordering::Greater => Some((best_vm, best_score)),
                std::cmp::Ordering::Equal if vm_id < best_vm => Some((vm_id, candidate_score)),
                std::cmp::Ordering::Equal => Some((best_vm, best_score)),
            },
            None => Some((vm_id, candidate_score)),
        };
    }

    best.map(|(vm, _)| vm)
}

/// Tier 2: the first active machine (by ascending id) meeting CPU and
/// memory constraints (overhead included, since a new VM is created).
fn first_active_machine_with_room<H: SimHost>(
    host: &H,
    inv: &FleetInventory,
    task: &TaskInfo,
    config: &SchedulerConfig,
) -> Option<MachineId> {
    let mut candidates: Vec<MachineId> = inv.machines_by_cpu(task.required_cpu).to_vec();
    candidates.sort();

    candidates.into_iter().find(|&machine_id| {
        if inv.is_machine_warming(machine_id) {
            return false;
        }
        let machine = host.machine_info(machine_id);
        machine.s_state.is_on() && fits_memory(&machine, task, config.vm_memory_overhead_bytes)
    })
}

/// Tier 3: the first dormant (`S5`) machine, by ascending id, matching CPU.
fn first_dormant_machine<H: SimHost>(
    host: &H,
    inv: &FleetInventory,
    task: &TaskInfo,
) -> Option<MachineId> {
    let mut candidates: Vec<MachineId> = inv.machines_by_cpu(task.required_cpu).to_vec();
    candidates.sort();

    candidates.into_iter().find(|&machine_id| {
        !inv.is_machine_warming(machine_id) && !host.machine_info(machine_id).s_state.is_on()
    })
}

/// Runs the full three-tier algorithm and, on success, adds the task to the
/// winning VM and returns it. Returns `Err(Unplaceable)` if every tier
/// (subject to `config.wake_on_exhaustion`) is exhausted.
pub fn place<H: SimHost>(
    host: &mut H,
    inv: &mut FleetInventory,
    config: &SchedulerConfig,
    task_id: TaskId,
) -> Result<Placement, SchedulerError> {
    let task = host.task_info(task_id);

    if let Some(vm) = best_existing_vm(host, inv, &task, config) {
        host.add_task_to_vm(vm, task_id, task.priority);
        info!(%task_id, %vm, tier = 1, "placed task on existing VM");
        return Ok(Placement::Placed(vm));
    }

    if let Some(machine_id) = first_active_machine_with_room(host, inv, &task, config) {
        if task.sla_class == SlaClass::Sla0 {
            let current = host.machine_info(machine_id).p_state;
            if current > PState::P1 {
                host.set_core_performance(machine_id, 0, PState::P1);
            }
        }
        let vm = provisioner::create_vm_on_active_machine(host, inv, machine_id, &task);
        host.add_task_to_vm(vm, task_id, task.priority);
        info!(%task_id, %vm, %machine_id, tier = 2, "placed task on new VM, active machine");
        return Ok(Placement::Placed(vm));
    }

    if config.wake_on_exhaustion {
        if let Some(machine_id) = first_dormant_machine(host, inv, &task) {
            let vm = provisioner::wake_dormant_machine(host, inv, machine_id, &task);
            host.add_task_to_vm(vm, task_id, task.priority);
            info!(%task_id, %vm, %machine_id, tier = 3, "placed task on woken machine");
            return Ok(Placement::Placed(vm));
        }
    }

    warn!(%task_id, "Unplaceable: all placement tiers exhausted");
    Err(SchedulerError::Unplaceable { task: task_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CpuArch, GuestType};

    fn machine(cpu: CpuArch, active_tasks: u32, has_gpu: bool, p_state: PState) -> MachineInfo {
        MachineInfo {
            cpu,
            s_state: crate::types::SState::S0,
            p_state,
            memory_capacity_bytes: 8 * 1024 * 1024 * 1024,
            memory_used_bytes: 0,
            num_cores: 4,
            active_tasks,
            active_vms: 1,
            has_gpu,
            mips: [4000, 3000, 2000, 1000],
        }
    }

    fn task(cpu: CpuArch, guest: GuestType, gpu_capable: bool, sla: SlaClass) -> TaskInfo {
        TaskInfo {
            required_cpu: cpu,
            required_guest: guest,
            required_memory_bytes: 512 * 1024 * 1024,
            arrival_time_us: 0,
            target_completion_us: 0,
            remaining_instructions: 0,
            sla_class: sla,
            priority: 0,
            gpu_capable,
        }
    }

    #[test]
    fn score_prefers_lower_load_and_penalizes_throttled_machines() {
        let config = SchedulerConfig::default();
        let t = task(CpuArch::X86, GuestType::Linux, false, SlaClass::Sla2);
        let idle_fast = machine(CpuArch::X86, 0, false, PState::P0);
        let busy_fast = machine(CpuArch::X86, 3, false, PState::P0);
        let idle_throttled = machine(CpuArch::X86, 0, false, PState::P3);

        assert!(score(&idle_fast, &t, &config) < score(&busy_fast, &t, &config));
        assert!(score(&idle_fast, &t, &config) < score(&idle_throttled, &t, &config));
    }

    #[test]
    fn gpu_capable_task_prefers_gpu_machine_via_discount() {
        let config = SchedulerConfig::default();
        let t = task(CpuArch::X86, GuestType::Linux, true, SlaClass::Sla2);
        let gpu_machine = machine(CpuArch::X86, 1, true, PState::P0);
        let plain_machine = machine(CpuArch::X86, 1, false, PState::P0);

        assert!(score(&gpu_machine, &t, &config) < score(&plain_machine, &t, &config));
    }

    #[test]
    fn score_order_treats_nan_as_worst_in_either_position() {
        assert_eq!(score_order(f64::NAN, 1.0), std::cmp::Ordering::Greater);
        assert_eq!(score_order(1.0, f64::NAN), std::cmp::Ordering::Less);
        assert_eq!(score_order(f64::NAN, f64::NAN), std::cmp::Ordering::Equal);
        assert_eq!(score_order(0.5, 1.0), std::cmp::Ordering::Less);
    }

    #[test]
    fn best_existing_vm_skips_a_nan_scoring_candidate_in_favor_of_a_real_one() {
        use crate::ids::MachineId;
        use crate::inventory::FleetInventory;
        use std::collections::HashMap;

        struct NanHost {
            machines: HashMap<MachineId, MachineInfo>,
            vms: HashMap<VmId, crate::types::VmInfo>,
        }
        impl SimHost for NanHost {
            fn machine_total(&self) -> usize {
                self.machines.len()
            }
            fn machine_ids(&self) -> Vec<MachineId> {
                self.machines.keys().copied().collect()
            }
            fn machine_info(&self, id: MachineId) -> MachineInfo {
                self.machines[&id].clone()
            }
            fn vm_info(&self, id: VmId) -> crate::types::VmInfo {
                self.vms[&id].clone()
            }
            fn task_info(&self, _id: TaskId) -> TaskInfo {
                unreachable!()
            }
            fn is_task_completed(&self, _id: TaskId) -> bool {
                false
            }
            fn set_machine_state(&mut self, _id: MachineId, _state: crate::types::SState) {}
            fn set_core_performance(&mut self, _id: MachineId, _core: u32, _pstate: PState) {}
            fn create_vm(&mut self, _guest: crate::types::GuestType, _cpu: CpuArch) -> VmId {
                unreachable!()
            }
            fn attach_vm(&mut self, _vm: VmId, _machine: MachineId) {}
            fn add_task_to_vm(&mut self, _vm: VmId, _task: TaskId, _priority: u32) {}
            fn migrate_vm(&mut self, _vm: VmId, _dst: MachineId) {}
            fn shutdown_vm(&mut self, _vm: VmId) {}
            fn sla_report(&self, _class: SlaClass) -> f64 {
                0.0
            }
            fn cluster_energy_kwh(&self) -> f64 {
                0.0
            }
        }

        // Machine 0 is degenerate (0 cores, 0 MIPS at P0), which drives
        // `score` to NaN (`INFINITY * 0`); machine 1 is a normal idle fit.
        // Tier 1 must land the task on machine 1, not the NaN-scoring one.
        let mut degenerate = machine(CpuArch::X86, 0, false, PState::P0);
        degenerate.num_cores = 0;
        degenerate.mips = [0, 0, 0, 0];
        let sane = machine(CpuArch::X86, 0, false, PState::P0);

        let host = NanHost {
            machines: HashMap::from([(MachineId(0), degenerate), (MachineId(1), sane)]),
            vms: HashMap::from([
                (
                    VmId(0),
                    crate::types::VmInfo {
                        guest_type: GuestType::Linux,
                        required_cpu: CpuArch::X86,
                        machine_id: Some(MachineId(0)),
                        active_tasks: 0,
                    },
                ),
                (
                    VmId(1),
                    crate::types::VmInfo {
                        guest_type: GuestType::Linux,
                        required_cpu: CpuArch::X86,
                        machine_id: Some(MachineId(1)),
                        active_tasks: 0,
                    },
                ),
            ]),
        };
        let mut inv = FleetInventory::new();
        inv.register_vm(VmId(0));
        inv.register_vm(VmId(1));

        let config = SchedulerConfig::default();
        let t = task(CpuArch::X86, GuestType::Linux, false, SlaClass::Sla2);

        assert_eq!(best_existing_vm(&host, &inv, &t, &config), Some(VmId(1)));
    }
}
