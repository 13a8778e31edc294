//! A minimal, synchronous-for-demo-purposes `SimHost` implementation.
//!
//! This is intentionally not a faithful discrete-event simulator: the real
//! event loop and clock are out of scope for the core. `ToyHost` exists
//! only to give `scheduler-core` something concrete to run against in
//! `scheduler-cli`, the way this codebase's `vm-cli` wires a concrete
//! engine behind a small binary. Async acknowledgements
//! (`StateChangeComplete`, `MigrationDone`) are still modeled as a queue
//! the driver loop must explicitly drain and feed back to the scheduler;
//! it is simplified to "settle everything after each step", not collapsed
//! away, so the demo still exercises the warming/migrating exclusion rules.

use scheduler_core::host::SimHost;
use scheduler_core::ids::{MachineId, TaskId, VmId};
use scheduler_core::types::{
    CpuArch, GuestType, MachineInfo, MipsTable, PState, SState, SlaClass, TaskInfo, VmInfo,
};

#[derive(Clone)]
struct MachineRecord {
    cpu: CpuArch,
    s_state: SState,
    p_state: PState,
    memory_capacity_bytes: u64,
    memory_used_bytes: u64,
    num_cores: u32,
    active_tasks: u32,
    active_vms: u32,
    has_gpu: bool,
    mips: MipsTable,
}

#[derive(Clone)]
struct VmRecord {
    guest_type: GuestType,
    required_cpu: CpuArch,
    machine_id: Option<MachineId>,
    active_tasks: u32,
}

#[derive(Clone)]
struct TaskRecord {
    info: TaskInfo,
    completed: bool,
}

pub struct ToyHost {
    machines: Vec<MachineRecord>,
    vms: Vec<VmRecord>,
    tasks: Vec<TaskRecord>,
    pending_state_changes: Vec<MachineId>,
    pending_migrations: Vec<(VmId, MachineId)>,
    energy_kwh: f64,
}

impl ToyHost {
    pub fn new() -> Self {
        Self {
            machines: Vec::new(),
            vms: Vec::new(),
            tasks: Vec::new(),
            pending_state_changes: Vec::new(),
            pending_migrations: Vec::new(),
            energy_kwh: 0.0,
        }
    }

    pub fn add_machine(
        &mut self,
        cpu: CpuArch,
        s_state: SState,
        num_cores: u32,
        has_gpu: bool,
        mips: MipsTable,
    ) -> MachineId {
        let id = MachineId(self.machines.len() as u64);
        self.machines.push(MachineRecord {
            cpu,
            s_state,
            p_state: PState::P3,
            memory_capacity_bytes: 16 * 1024 * 1024 * 1024,
            memory_used_bytes: 0,
            num_cores,
            active_tasks: 0,
            active_vms: 0,
            has_gpu,
            mips,
        });
        id
    }

    pub fn submit_task(&mut self, info: TaskInfo) -> TaskId {
        let id = TaskId(self.tasks.len() as u64);
        self.tasks.push(TaskRecord {
            info,
            completed: false,
        });
        id
    }

    /// Drains and settles every machine warming up since the last drain,
    /// returning the ids so the driver can feed `StateChangeComplete` back
    /// into the scheduler.
    pub fn take_pending_state_changes(&mut self) -> Vec<MachineId> {
        std::mem::take(&mut self.pending_state_changes)
    }

    /// Drains and settles every VM mid-migration, returning the ids so the
    /// driver can feed `MigrationDone` back into the scheduler.
    pub fn take_pending_migrations(&mut self) -> Vec<VmId> {
        let pending = std::mem::take(&mut self.pending_migrations);
        let mut settled = Vec::with_capacity(pending.len());
        for (vm, dst) in pending {
            self.vms[vm.0 as usize].machine_id = Some(dst);
            settled.push(vm);
        }
        settled
    }
}

impl Default for ToyHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost for ToyHost {
    fn machine_total(&self) -> usize {
        self.machines.len()
    }

    fn machine_ids(&self) -> Vec<MachineId> {
        (0..self.machines.len() as u64).map(MachineId).collect()
    }

    fn machine_info(&self, id: MachineId) -> MachineInfo {
        let m = &self.machines[id.0 as usize];
        MachineInfo {
            cpu: m.cpu,
            s_state: m.s_state,
            p_state: m.p_state,
            memory_capacity_bytes: m.memory_capacity_bytes,
            memory_used_bytes: m.memory_used_bytes,
            num_cores: m.num_cores,
            active_tasks: m.active_tasks,
            active_vms: m.active_vms,
            has_gpu: m.has_gpu,
            mips: m.mips,
        }
    }

    fn vm_info(&self, id: VmId) -> VmInfo {
        let vm = &self.vms[id.0 as usize];
        VmInfo {
            guest_type: vm.guest_type,
            required_cpu: vm.required_cpu,
            machine_id: vm.machine_id,
            active_tasks: vm.active_tasks,
        }
    }

    fn task_info(&self, id: TaskId) -> TaskInfo {
        self.tasks[id.0 as usize].info.clone()
    }

    fn is_task_completed(&self, id: TaskId) -> bool {
        self.tasks[id.0 as usize].completed
    }

    fn set_machine_state(&mut self, id: MachineId, state: SState) {
        let m = &mut self.machines[id.0 as usize];
        if m.s_state != state {
            m.s_state = state;
            self.pending_state_changes.push(id);
        }
    }

    fn set_core_performance(&mut self, id: MachineId, _core: u32, pstate: PState) {
        self.machines[id.0 as usize].p_state = pstate;
        // Faster states draw more power; accrue a token amount of energy so
        // `Machine_GetClusterEnergy` is observably non-decreasing.
        self.energy_kwh += match pstate {
            PState::P0 => 0.004,
            PState::P1 => 0.003,
            PState::P2 => 0.002,
            PState::P3 => 0.001,
        };
    }

    fn create_vm(&mut self, guest: GuestType, cpu: CpuArch) -> VmId {
        let id = VmId(self.vms.len() as u64);
        self.vms.push(VmRecord {
            guest_type: guest,
            required_cpu: cpu,
            machine_id: None,
            active_tasks: 0,
        });
        id
    }

    fn attach_vm(&mut self, vm: VmId, machine: MachineId) {
        self.vms[vm.0 as usize].machine_id = Some(machine);
        self.machines[machine.0 as usize].active_vms += 1;
    }

    fn add_task_to_vm(&mut self, vm: VmId, task: TaskId, _priority: u32) {
        let vm_rec = &mut self.vms[vm.0 as usize];
        vm_rec.active_tasks += 1;
        let required_memory = self.tasks[task.0 as usize].info.required_memory_bytes;
        if let Some(machine_id) = vm_rec.machine_id {
            let m = &mut self.machines[machine_id.0 as usize];
            m.active_tasks += 1;
            m.memory_used_bytes += required_memory;
        }
    }

    fn migrate_vm(&mut self, vm: VmId, dst: MachineId) {
        self.vms[vm.0 as usize].machine_id = None;
        self.pending_migrations.push((vm, dst));
    }

    fn shutdown_vm(&mut self, vm: VmId) {
        self.vms[vm.0 as usize].machine_id = None;
    }

    fn sla_report(&self, _class: SlaClass) -> f64 {
        0.0
    }

    fn cluster_energy_kwh(&self) -> f64 {
        self.energy_kwh
    }
}
