//! Provisioner (C2). Owns machine power-on and VM creation; never decides
//! *which* task goes *where* (that's the Placement Engine, C3); it only
//! carries out "power this machine on" and "create/attach a VM of this
//! guest type" once C3 or `init` has made that decision.

use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::host::SimHost;
use crate::ids::{MachineId, VmId};
use crate::inventory::FleetInventory;
use crate::types::{CpuArch, GuestType, SState, TaskInfo};

/// Runs the init protocol: enumerates machines, groups by architecture,
/// and powers on `min(|G|, floor(T / groups))` machines per group, each
/// carrying one default-guest-type VM.
///
/// Architecture groups with no default guest mapping are skipped entirely
/// (`UnknownCpu`, logged, no machines in that group are touched) rather
/// than partially provisioned.
pub fn init_provision<H: SimHost>(host: &mut H, inv: &mut FleetInventory, config: &SchedulerConfig) {
    for id in host.machine_ids() {
        let arch = host.machine_info(id).cpu;
        inv.register_machine(id, arch);
    }

    let group_count = inv.cpu_group_count().max(1);
    let per_group_budget = config.active_machines_budget / group_count;

    let mut groups: Vec<(CpuArch, Vec<MachineId>)> = inv
        .cpu_groups()
        .map(|(arch, ids)| (*arch, ids.clone()))
        .collect();
    // Deterministic processing order: HashMap iteration order is not
    // stable across runs, so sort by architecture before touching hosts.
    groups.sort_by_key(|(arch, _)| *arch);

    for (arch, machines) in groups {
        let Some(default_guest) = arch.default_guest_type() else {
            warn!(?arch, "UnknownCpu: no default guest mapping, skipping architecture group");
            continue;
        };

        let to_power = machines.len().min(per_group_budget);
        for &machine_id in machines.iter().take(to_power) {
            host.set_machine_state(machine_id, SState::S0);
            let vm = host.create_vm(default_guest, arch);
            host.attach_vm(vm, machine_id);
            inv.register_vm(vm);
            info!(%machine_id, %vm, ?arch, ?default_guest, "provisioned default VM at init");
        }
    }
}

/// Creates a VM of the task's *required* guest type (not the architecture's
/// default) on an already-active machine and attaches it. The caller (C3)
/// is responsible for adding the task to the returned VM.
pub fn create_vm_on_active_machine<H: SimHost>(
    host: &mut H,
    inv: &mut FleetInventory,
    machine_id: MachineId,
    task: &TaskInfo,
) -> VmId {
    let vm = host.create_vm(task.required_guest, task.required_cpu);
    host.attach_vm(vm, machine_id);
    inv.register_vm(vm);
    info!(%machine_id, %vm, guest = ?task.required_guest, "created on-demand VM on active machine");
    vm
}

/// Wakes a dormant (`S5`) machine, marks it warming so C3 does not
/// re-select it before `StateChangeComplete` arrives, and creates the
/// required-guest-type VM on it. The machine is *not* yet selectable by the
/// Placement Engine when this returns.
pub fn wake_dormant_machine<H: SimHost>(
    host: &mut H,
    inv: &mut FleetInventory,
    machine_id: MachineId,
    task: &TaskInfo,
) -> VmId {
    host.set_machine_state(machine_id, SState::S0);
    inv.mark_machine_warming(machine_id);
    let vm = host.create_vm(task.required_guest, task.required_cpu);
    host.attach_vm(vm, machine_id);
    inv.register_vm(vm);
    info!(%machine_id, %vm, guest = ?task.required_guest, "woke dormant machine and created VM");
    vm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SimHost;
    use crate::ids::TaskId;
    use crate::types::{MachineInfo, PState, SlaClass, VmInfo};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeHost {
        machines: HashMap<MachineId, MachineInfo>,
        vms: HashMap<VmId, VmInfo>,
        next_vm: u64,
        state_changes: Vec<(MachineId, SState)>,
        attachments: Vec<(VmId, MachineId)>,
    }

    impl FakeHost {
        fn with_machine(mut self, id: MachineId, cpu: CpuArch, s_state: SState) -> Self {
            self.machines.insert(
                id,
                MachineInfo {
                    cpu,
                    s_state,
                    p_state: PState::P3,
                    memory_capacity_bytes: 8 * 1024 * 1024 * 1024,
                    memory_used_bytes: 0,
                    num_cores: 4,
                    active_tasks: 0,
                    active_vms: 0,
                    has_gpu: false,
                    mips: [4000, 3000, 2000, 1000],
                },
            );
            self
        }
    }

    impl SimHost for FakeHost {
        fn machine_total(&self) -> usize {
            self.machines.len()
        }
        fn machine_ids(&self) -> Vec<MachineId> {
            let mut ids: Vec<_> = self.machines.keys().copied().collect();
            ids.sort();
            ids
        }
        fn machine_info(&self, id: MachineId) -> MachineInfo {
            self.machines[&id].clone()
        }
        fn vm_info(&self, id: VmId) -> VmInfo {
            self.vms[&id].clone()
        }
        fn task_info(&self, _id: TaskId) -> TaskInfo {
            unimplemented!("not needed for provisioner tests")
        }
        fn is_task_completed(&self, _id: TaskId) -> bool {
            false
        }
        fn set_machine_state(&mut self, id: MachineId, state: SState) {
            self.state_changes.push((id, state));
            if let Some(m) = self.machines.get_mut(&id) {
                m.s_state = state;
            }
        }
        fn set_core_performance(&mut self, _id: MachineId, _core: u32, _pstate: PState) {}
        fn create_vm(&mut self, guest: GuestType, cpu: CpuArch) -> VmId {
            let id = VmId(self.next_vm);
            self.next_vm += 1;
            self.vms.insert(
                id,
                VmInfo {
                    guest_type: guest,
                    required_cpu: cpu,
                    machine_id: None,
                    active_tasks: 0,
                },
            );
            id
        }
        fn attach_vm(&mut self, vm: VmId, machine: MachineId) {
            self.attachments.push((vm, machine));
            self.vms.get_mut(&vm).unwrap().machine_id = Some(machine);
        }
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

    #[test]
    fn init_provision_powers_budget_machines_per_group_with_default_guest() {
        let mut host = FakeHost::default()
            .with_machine(MachineId(0), CpuArch::X86, SState::S5)
            .with_machine(MachineId(1), CpuArch::X86, SState::S5)
            .with_machine(MachineId(2), CpuArch::Power, SState::S5);
        let mut inv = FleetInventory::new();
        let config = SchedulerConfig {
            active_machines_budget: 2,
            ..SchedulerConfig::default()
        };

        init_provision(&mut host, &mut inv, &config);

        // 2 groups, budget 2 => floor(2/2) = 1 machine per group.
        assert_eq!(host.state_changes.len(), 2);
        assert_eq!(inv.vms().len(), 2);
        let x86_vm = inv.vms()[0];
        assert_eq!(host.vm_info(x86_vm).guest_type, GuestType::Linux);
    }

    #[test]
    fn init_provision_skips_unknown_architecture_group() {
        let mut host = FakeHost::default().with_machine(MachineId(0), CpuArch::Other(99), SState::S5);
        let mut inv = FleetInventory::new();
        let config = SchedulerConfig::default();

        init_provision(&mut host, &mut inv, &config);

        assert!(host.state_changes.is_empty());
        assert!(inv.vms().is_empty());
    }
}
