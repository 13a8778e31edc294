//! SLA Deadline Tracker (C5). Owns per-task deadline metadata, re-estimates
//! completion risk on every periodic tick, and reacts to the host's
//! `SLAWarning` / `MigrationDone` / `HandleTaskCompletion` callbacks.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::host::SimHost;
use crate::ids::{MachineId, TaskId, VmId};
use crate::inventory::FleetInventory;
use crate::types::{PState, SlaClass, TimeUs};

/// State machine for an ActiveTask: `Placed -> (Boosted?) ->
/// (Migrating?) -> Completed | LateAbandoned`. Boost and Migrating are not
/// mutually exclusive; `Completed`/`LateAbandoned` are terminal and, once
/// reached, the record is removed from the tracker rather than kept around
/// in a terminal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTaskState {
    Placed,
    Boosted,
    Migrating,
    BoostedAndMigrating,
}

/// Core-owned metadata for a task between placement and completion.
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub sla_class: SlaClass,
    pub deadline_us: TimeUs,
    pub vm: VmId,
    boosted: bool,
    migrating: bool,
    late: bool,
}

impl ActiveTask {
    pub fn state(&self) -> ActiveTaskState {
        match (self.boosted, self.migrating) {
            (true, true) => ActiveTaskState::BoostedAndMigrating,
            (true, false) => ActiveTaskState::Boosted,
            (false, true) => ActiveTaskState::Migrating,
            (false, false) => ActiveTaskState::Placed,
        }
    }

    pub fn is_late(&self) -> bool {
        self.late
    }
}

#[derive(Debug, Default)]
pub struct SlaTracker {
    active: HashMap<TaskId, ActiveTask>,
}

impl SlaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the ActiveTask record at placement time.
    pub fn register(&mut self, task_id: TaskId, vm: VmId, sla_class: SlaClass, deadline_us: TimeUs) {
        self.active.insert(
            task_id,
            ActiveTask {
                sla_class,
                deadline_us,
                vm,
                boosted: false,
                migrating: false,
                late: false,
            },
        );
    }

    pub fn get(&self, task_id: TaskId) -> Option<&ActiveTask> {
        self.active.get(&task_id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// `HandleTaskCompletion`: removes the ActiveTask record. No other
    /// action; the next `SchedulerCheck` may consolidate the now-idler
    /// machine (C4's concern, not C5's).
    pub fn on_task_complete(&mut self, task_id: TaskId) {
        self.active.remove(&task_id);
    }

    /// `MigrationDone`: the VM settles, and every ActiveTask record riding
    /// it is no longer `migrating`.
    pub fn on_migration_done(&mut self, vm: VmId) {
        for record in self.active.values_mut() {
            if record.vm == vm {
                record.migrating = false;
            }
        }
    }

    /// Periodic pass: re-estimate ETA for every not-yet-late task and
    /// boost performance when at risk.
    pub fn periodic_pass<H: SimHost>(
        &mut self,
        host: &mut H,
        inv: &FleetInventory,
        config: &SchedulerConfig,
        now: TimeUs,
    ) {
        let task_ids: Vec<TaskId> = self.active.keys().copied().collect();
        for task_id in task_ids {
            self.assess_one(host, inv, config, now, task_id);
        }
    }

    fn assess_one<H: SimHost>(
        &mut self,
        host: &mut H,
        inv: &FleetInventory,
        config: &SchedulerConfig,
        now: TimeUs,
        task_id: TaskId,
    ) {
        let Some(record) = self.active.get_mut(&task_id) else {
            return;
        };
        if now > record.deadline_us {
            if !record.late {
                record.late = true;
                debug!(%task_id, "LateTask: deadline already elapsed, no recovery from core");
            }
            return;
        }

        let vm = host.vm_info(record.vm);
        let Some(machine_id) = vm.machine_id else {
            return; // unattached / migrating, no machine to boost
        };
        if inv.is_machine_warming(machine_id) {
            return;
        }

        let machine = host.machine_info(machine_id);
        let task = host.task_info(task_id);
        let mips = machine.mips_at(machine.p_state).max(1);
        let eta_seconds = task.remaining_instructions as f64 / (mips as f64 * 1_000_000.0);
        let eta_us = eta_seconds * 1_000_000.0;
        let remaining_slack_us = (record.deadline_us - now) as f64;

        if eta_us > remaining_slack_us * config.deadline_slack_ratio {
            boost_machine(host, machine_id);
            record.boosted = true;
            info!(%task_id, %machine_id, eta_us, remaining_slack_us, "BoostPerformance: at risk of missing deadline");
        }
    }

    /// Reactive pass on `SLAWarning(task)`: boost immediately, and
    /// optionally request a migration for a GPU-capable task stranded on a
    /// non-GPU machine.
    pub fn on_sla_warning<H: SimHost>(
        &mut self,
        host: &mut H,
        inv: &mut FleetInventory,
        config: &SchedulerConfig,
        task_id: TaskId,
    ) {
        let Some(record) = self.active.get_mut(&task_id) else {
            warn!(%task_id, "SLAWarning for a task with no ActiveTask record");
            return;
        };
        let vm = host.vm_info(record.vm);
        let Some(machine_id) = vm.machine_id else {
            return;
        };

        boost_machine(host, machine_id);
        record.boosted = true;
        info!(%task_id, %machine_id, "BoostPerformance: reacting to SLAWarning");

        if !config.migrate_on_sla_warning {
            return;
        }
        let task = host.task_info(task_id);
        let machine = host.machine_info(machine_id);
        if !task.gpu_capable || machine.has_gpu {
            return;
        }

        if let Some(dst) = find_gpu_destination(host, inv, machine_id, task.required_cpu) {
            let vm_id = record.vm;
            host.migrate_vm(vm_id, dst);
            inv.mark_vm_migrating(vm_id, dst);
            record.migrating = true;
            info!(%task_id, %vm_id, destination = %dst, "requested migration to GPU-bearing machine");
        }
    }
}

fn boost_machine<H: SimHost>(host: &mut H, machine_id: MachineId) {
    host.set_core_performance(machine_id, 0, PState::P0);
}

/// Finds the first active, non-warming, GPU-bearing machine of the given
/// CPU architecture that is not the task's current machine.
fn find_gpu_destination<H: SimHost>(
    host: &H,
    inv: &FleetInventory,
    current: MachineId,
    cpu: crate::types::CpuArch,
) -> Option<MachineId> {
    let mut candidates: Vec<MachineId> = inv.machines_by_cpu(cpu).to_vec();
    candidates.sort();
    candidates.into_iter().find(|&id| {
        id != current
            && !inv.is_machine_warming(id)
            && host.machine_info(id).s_state.is_on()
            && host.machine_info(id).has_gpu
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_task_state_reflects_boost_and_migration_flags() {
        let mut tracker = SlaTracker::new();
        tracker.register(TaskId(1), VmId(1), SlaClass::Sla1, 1_000_000);
        assert_eq!(tracker.get(TaskId(1)).unwrap().state(), ActiveTaskState::Placed);
    }

    #[test]
    fn task_completion_removes_the_record() {
        let mut tracker = SlaTracker::new();
        tracker.register(TaskId(1), VmId(1), SlaClass::Sla1, 1_000_000);
        assert_eq!(tracker.len(), 1);
        tracker.on_task_complete(TaskId(1));
        assert!(tracker.is_empty());
    }

    #[test]
    fn migration_done_clears_migrating_flag_for_matching_vm() {
        let mut tracker = SlaTracker::new();
        tracker.register(TaskId(1), VmId(5), SlaClass::Sla1, 1_000_000);
        tracker.active.get_mut(&TaskId(1)).unwrap().migrating = true;
        tracker.on_migration_done(VmId(5));
        assert_eq!(tracker.get(TaskId(1)).unwrap().state(), ActiveTaskState::Placed);
    }
}
