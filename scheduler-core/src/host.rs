//! The host boundary. `SimHost` is the one trait the core is generic over;
//! a concrete simulator links against the core by implementing it. Query
//! methods are `&self` and must reflect live, host-owned state; the core
//! caches only identifiers and transient flags (see `inventory`), never
//! numeric fields, because the host mutates those as tasks run.
//!
//! The asynchronous state-control methods (`Machine_SetState`, `VM_Migrate`)
//! return immediately; their completion is delivered later through
//! `Scheduler::state_change_complete` / `Scheduler::migration_done`, not
//! through this trait.

use crate::ids::{MachineId, TaskId, VmId};
use crate::types::{CpuArch, GuestType, MachineInfo, PState, SState, SlaClass, TaskInfo, VmInfo};

pub trait SimHost {
    /// `Machine_GetTotal`.
    fn machine_total(&self) -> usize;

    /// All machine ids known to the host, `0..machine_total()` issued as
    /// opaque ids. Enumerated once at init.
    fn machine_ids(&self) -> Vec<MachineId>;

    /// `Machine_GetInfo`.
    fn machine_info(&self, id: MachineId) -> MachineInfo;

    /// `VM_GetInfo`.
    fn vm_info(&self, id: VmId) -> VmInfo;

    /// `GetTaskInfo`.
    fn task_info(&self, id: TaskId) -> TaskInfo;

    /// `IsTaskCompleted`.
    fn is_task_completed(&self, id: TaskId) -> bool;

    /// `Machine_SetState`; async, confirmed by `StateChangeComplete`.
    fn set_machine_state(&mut self, id: MachineId, state: SState);

    /// `Machine_SetCorePerformance`; sync. `core = 0` broadcasts to all
    /// cores per host contract.
    fn set_core_performance(&mut self, id: MachineId, core: u32, pstate: PState);

    /// `VM_Create`.
    fn create_vm(&mut self, guest: GuestType, cpu: CpuArch) -> VmId;

    /// `VM_Attach`.
    fn attach_vm(&mut self, vm: VmId, machine: MachineId);

    /// `VM_AddTask`.
    fn add_task_to_vm(&mut self, vm: VmId, task: TaskId, priority: u32);

    /// `VM_Migrate`; async, confirmed by `MigrationDone`.
    fn migrate_vm(&mut self, vm: VmId, dst: MachineId);

    /// `VM_Shutdown`.
    fn shutdown_vm(&mut self, vm: VmId);

    /// `GetSLAReport`, percent of violations for the given class.
    fn sla_report(&self, class: SlaClass) -> f64;

    /// `Machine_GetClusterEnergy`, in KW-hour.
    fn cluster_energy_kwh(&self) -> f64;
}
