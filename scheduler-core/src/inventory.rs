//! Fleet Inventory (C1).
//!
//! A pure cache of identifiers and transient flags. The host remains the
//! source of truth for every numeric field (memory used, active task
//! counts, ...); caching those here would drift as the host mutates them
//! between events. What *must* live here, because nothing else tracks it,
//! is: which machines belong to which CPU group (fixed at init), which VMs
//! the core has created (for orderly shutdown), and which machines/VMs are
//! mid-transition and therefore must not be re-selected.

use std::collections::{HashMap, HashSet};

use crate::ids::{MachineId, VmId};
use crate::types::CpuArch;

#[derive(Debug, Default)]
pub struct FleetInventory {
    by_cpu: HashMap<CpuArch, Vec<MachineId>>,
    created_vms: Vec<VmId>,
    warming_machines: HashSet<MachineId>,
    migrating_vms: HashSet<VmId>,
}

impl FleetInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a machine under its CPU architecture group. Called once
    /// per machine during `InitScheduler` enumeration; architecture is
    /// immutable for a machine's lifetime so this is never revisited.
    pub fn register_machine(&mut self, id: MachineId, arch: CpuArch) {
        self.by_cpu.entry(arch).or_default().push(id);
    }

    /// `machines_by_cpu(arch)`.
    pub fn machines_by_cpu(&self, arch: CpuArch) -> &[MachineId] {
        self.by_cpu.get(&arch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cpu_groups(&self) -> impl Iterator<Item = (&CpuArch, &Vec<MachineId>)> {
        self.by_cpu.iter()
    }

    pub fn cpu_group_count(&self) -> usize {
        self.by_cpu.len()
    }

    /// Records that the core created `vm`, so it can be shut down exactly
    /// once at `SimulationComplete`.
    pub fn register_vm(&mut self, vm: VmId) {
        self.created_vms.push(vm);
    }

    /// `vms()`: every VM the core has ever created, in creation order.
    pub fn vms(&self) -> &[VmId] {
        &self.created_vms
    }

    /// A machine has an `S0` request in flight; exclude it from selection
    /// until `mark_machine_settled` is called.
    pub fn mark_machine_warming(&mut self, id: MachineId) {
        self.warming_machines.insert(id);
    }

    /// `StateChangeComplete(id)` arrived; the machine is selectable again.
    pub fn mark_machine_settled(&mut self, id: MachineId) {
        self.warming_machines.remove(&id);
    }

    pub fn is_machine_warming(&self, id: MachineId) -> bool {
        self.warming_machines.contains(&id)
    }

    /// `mark_vm_migrating(vm, dst)`. `dst` is accepted to mirror the host
    /// API shape though the inventory only needs the exclusion set; the
    /// pending destination itself is the host's bookkeeping.
    pub fn mark_vm_migrating(&mut self, vm: VmId, _dst: MachineId) {
        self.migrating_vms.insert(vm);
    }

    /// `mark_vm_settled(vm)`: `MigrationDone(vm)` arrived.
    pub fn mark_vm_settled(&mut self, vm: VmId) {
        self.migrating_vms.remove(&vm);
    }

    pub fn is_vm_migrating(&self, vm: VmId) -> bool {
        self.migrating_vms.contains(&vm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_machines_by_architecture() {
        let mut inv = FleetInventory::new();
        inv.register_machine(MachineId(0), CpuArch::X86);
        inv.register_machine(MachineId(1), CpuArch::Power);
        inv.register_machine(MachineId(2), CpuArch::X86);

        assert_eq!(inv.machines_by_cpu(CpuArch::X86), &[MachineId(0), MachineId(2)]);
        assert_eq!(inv.machines_by_cpu(CpuArch::Power), &[MachineId(1)]);
        assert!(inv.machines_by_cpu(CpuArch::Arm).is_empty());
        assert_eq!(inv.cpu_group_count(), 2);
    }

    #[test]
    fn tracks_warming_and_migrating_exclusion_sets() {
        let mut inv = FleetInventory::new();
        let m = MachineId(7);
        let vm = VmId(3);

        assert!(!inv.is_machine_warming(m));
        inv.mark_machine_warming(m);
        assert!(inv.is_machine_warming(m));
        inv.mark_machine_settled(m);
        assert!(!inv.is_machine_warming(m));

        assert!(!inv.is_vm_migrating(vm));
        inv.mark_vm_migrating(vm, MachineId(9));
        assert!(inv.is_vm_migrating(vm));
        inv.mark_vm_settled(vm);
        assert!(!inv.is_vm_migrating(vm));
    }

    #[test]
    fn remembers_every_vm_it_created() {
        let mut inv = FleetInventory::new();
        inv.register_vm(VmId(0));
        inv.register_vm(VmId(1));
        assert_eq!(inv.vms(), &[VmId(0), VmId(1)]);
    }
}
