//! DVFS & Consolidation Controller (C4). Runs on every `SchedulerCheck`
//! tick: sets each active machine's P-state from observed utilization, and
//! optionally consolidates idle machines to `S5`.

use tracing::info;

use crate::config::SchedulerConfig;
use crate::host::SimHost;
use crate::inventory::FleetInventory;
use crate::types::{PState, SState};

/// One DVFS + consolidation pass over every machine the core knows about.
/// The P-state is written unconditionally every tick, even if unchanged
/// from the last tick.
pub fn tick<H: SimHost>(host: &mut H, inv: &mut FleetInventory, config: &SchedulerConfig) {
    let mut all_machines: Vec<_> = inv.cpu_groups().flat_map(|(_, ids)| ids.clone()).collect();
    all_machines.sort();

    for machine_id in all_machines {
        if inv.is_machine_warming(machine_id) {
            continue;
        }
        let machine = host.machine_info(machine_id);
        if !machine.s_state.is_on() {
            continue;
        }

        let target = PState::for_utilization(machine.utilization(), &config.dvfs_thresholds);
        host.set_core_performance(machine_id, 0, target);

        if config.consolidation_enabled && machine.active_tasks == 0 && machine.active_vms == 0 {
            host.set_machine_state(machine_id, SState::S5);
            inv.mark_machine_warming(machine_id);
            info!(%machine_id, "consolidating idle machine to S5");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DvfsThresholds;
    use crate::types::PState;

    #[test]
    fn utilization_maps_to_the_four_p_state_bands() {
        let t = DvfsThresholds::default();
        assert_eq!(PState::for_utilization(1.00, &t), PState::P0);
        assert_eq!(PState::for_utilization(0.81, &t), PState::P0);
        assert_eq!(PState::for_utilization(0.75, &t), PState::P1);
        assert_eq!(PState::for_utilization(0.50, &t), PState::P2);
        assert_eq!(PState::for_utilization(0.30, &t), PState::P2);
        assert_eq!(PState::for_utilization(0.20, &t), PState::P3);
        assert_eq!(PState::for_utilization(0.0, &t), PState::P3);
    }
}
