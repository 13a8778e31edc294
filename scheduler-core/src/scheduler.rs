//! Wires C1-C5 behind the host-exposed handler surface. `Scheduler<H>` is
//! the single owning value a host constructs once at `InitScheduler` and
//! drops after `SimulationComplete`; there is no file-scope or
//! thread-local state anywhere in this crate.

use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::dvfs;
use crate::host::SimHost;
use crate::ids::{MachineId, TaskId, VmId};
use crate::inventory::FleetInventory;
use crate::placement::{self, Placement};
use crate::provisioner;
use crate::sla::SlaTracker;
use crate::types::{SlaClass, TimeUs};

pub struct Scheduler<H: SimHost> {
    config: SchedulerConfig,
    inventory: FleetInventory,
    sla: SlaTracker,
    init_time_us: Option<TimeUs>,
    _host: std::marker::PhantomData<H>,
}

impl<H: SimHost> Scheduler<H> {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            inventory: FleetInventory::new(),
            sla: SlaTracker::new(),
            init_time_us: None,
            _host: std::marker::PhantomData,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Exposed for tests/tooling that want to inspect placement without
    /// going through a full handler round trip.
    pub fn inventory(&self) -> &FleetInventory {
        &self.inventory
    }

    pub fn active_task_count(&self) -> usize {
        self.sla.len()
    }

    /// `InitScheduler()`: runs the Provisioner's init protocol.
    pub fn init_scheduler(&mut self, t: TimeUs, host: &mut H) {
        self.init_time_us = Some(t);
        provisioner::init_provision(host, &mut self.inventory, &self.config);
        info!(t, "scheduler initialized");
    }

    /// `HandleNewTask(t, task)`: runs the three-tier Placement Engine and,
    /// on success, registers the ActiveTask record with C5.
    pub fn handle_new_task(&mut self, _t: TimeUs, host: &mut H, task_id: TaskId) {
        match placement::place(host, &mut self.inventory, &self.config, task_id) {
            Ok(Placement::Placed(vm)) => {
                let task = host.task_info(task_id);
                self.sla
                    .register(task_id, vm, task.sla_class, task.target_completion_us);
            }
            Ok(Placement::Deferred) => {
                info!(%task_id, "placement deferred");
            }
            Err(err) => {
                error!(%task_id, %err, "placement failed");
            }
        }
    }

    /// `HandleTaskCompletion(t, task)`.
    pub fn handle_task_completion(&mut self, _t: TimeUs, _host: &mut H, task_id: TaskId) {
        self.sla.on_task_complete(task_id);
    }

    /// `MemoryWarning(t, machine)`: logged, not remediated.
    pub fn memory_warning(&mut self, _t: TimeUs, _host: &mut H, machine: MachineId) {
        error!(%machine, "MemoryOvercommit reported by host");
    }

    /// `MigrationDone(t, vm)`: the VM settles and becomes re-selectable.
    pub fn migration_done(&mut self, _t: TimeUs, _host: &mut H, vm: VmId) {
        self.inventory.mark_vm_settled(vm);
        self.sla.on_migration_done(vm);
        info!(%vm, "migration complete, VM re-selectable");
    }

    /// `SchedulerCheck(t)`: C4's DVFS/consolidation tick, then C5's
    /// periodic deadline re-estimation pass.
    pub fn scheduler_check(&mut self, t: TimeUs, host: &mut H) {
        dvfs::tick(host, &mut self.inventory, &self.config);
        self.sla.periodic_pass(host, &self.inventory, &self.config, t);
    }

    /// `SLAWarning(t, task)`: C5's reactive pass.
    pub fn sla_warning(&mut self, _t: TimeUs, host: &mut H, task: TaskId) {
        self.sla
            .on_sla_warning(host, &mut self.inventory, &self.config, task);
    }

    /// `StateChangeComplete(t, machine)`: the machine settles and becomes
    /// re-selectable.
    pub fn state_change_complete(&mut self, _t: TimeUs, _host: &mut H, machine: MachineId) {
        self.inventory.mark_machine_settled(machine);
        info!(%machine, "state change complete, machine re-selectable");
    }

    /// `SimulationComplete(t)`: reports SLA0..SLA2 violation percentages,
    /// cluster energy, and elapsed sim time, then shuts down every VM the
    /// core created.
    pub fn simulation_complete(&mut self, t: TimeUs, host: &mut H) {
        for class in [SlaClass::Sla0, SlaClass::Sla1, SlaClass::Sla2] {
            let pct = host.sla_report(class);
            info!(?class, violation_percent = pct, "final SLA report");
        }
        let energy = host.cluster_energy_kwh();
        let elapsed_seconds = self
            .init_time_us
            .map(|start| (t.saturating_sub(start)) as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        info!(energy_kwh = energy, elapsed_seconds, "simulation complete");

        for &vm in self.inventory.vms() {
            host.shutdown_vm(vm);
        }
    }
}
