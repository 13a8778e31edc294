//! Demonstration harness for `scheduler-core`. Not a simulator: it wires a
//! toy in-process host behind `Scheduler<ToyHost>` and drives a short,
//! hand-authored event script so the crate's behavior is observable end to
//! end without a real discrete-event runtime.

mod toy_host;

use clap::{Parser, ValueEnum};
use scheduler_core::types::{CpuArch, GuestType, SState, SlaClass, TaskInfo};
use scheduler_core::{Scheduler, SchedulerConfig};
use toy_host::ToyHost;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Preset {
    SlaAware,
    RoundRobin,
    EnergyConservative,
}

/// Runs a small synthetic workload through the scheduler core.
#[derive(Parser, Debug)]
#[command(name = "scheduler-cli", about = "Demo driver for scheduler-core")]
struct Args {
    /// Which `SchedulerConfig` preset to run.
    #[arg(long, value_enum, default_value_t = Preset::SlaAware)]
    preset: Preset,

    /// Number of synthetic tasks to submit.
    #[arg(long, default_value_t = 6)]
    tasks: u32,
}

fn config_for(preset: Preset) -> SchedulerConfig {
    match preset {
        Preset::SlaAware => SchedulerConfig::default(),
        Preset::RoundRobin => SchedulerConfig::round_robin_preset(),
        Preset::EnergyConservative => SchedulerConfig::energy_conservative_preset(),
    }
}

/// Settles every async callback the host has queued since the last drain.
/// A real host would deliver these through the simulator's own event
/// queue at the appropriate future timestamp; this harness settles them
/// immediately, which is a simplification of the demo driver only.
fn drain_callbacks(scheduler: &mut Scheduler<ToyHost>, host: &mut ToyHost, t: u64) {
    for machine in host.take_pending_state_changes() {
        scheduler.state_change_complete(t, host, machine);
    }
    for vm in host.take_pending_migrations() {
        scheduler.migration_done(t, host, vm);
    }
}

fn build_fleet(host: &mut ToyHost) {
    for _ in 0..4 {
        host.add_machine(CpuArch::X86, SState::S5, 8, false, [4000, 3000, 2000, 1000]);
    }
    for _ in 0..2 {
        host.add_machine(CpuArch::Power, SState::S5, 8, false, [3500, 2700, 1900, 900]);
    }
    host.add_machine(CpuArch::Arm, SState::S5, 4, true, [2500, 2000, 1500, 800]);
}

fn submit_tasks(host: &mut ToyHost, count: u32) -> Vec<scheduler_core::ids::TaskId> {
    (0..count)
        .map(|i| {
            let gpu_capable = i % 5 == 0;
            host.submit_task(TaskInfo {
                required_cpu: CpuArch::X86,
                required_guest: GuestType::Linux,
                required_memory_bytes: 512 * 1024 * 1024,
                arrival_time_us: u64::from(i) * 1_000_000,
                target_completion_us: u64::from(i) * 1_000_000 + 30_000_000,
                remaining_instructions: 2_000_000_000,
                sla_class: if i % 3 == 0 { SlaClass::Sla0 } else { SlaClass::Sla2 },
                priority: 5,
                gpu_capable,
            })
        })
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = config_for(args.preset);

    let mut host = ToyHost::new();
    build_fleet(&mut host);
    let task_ids = submit_tasks(&mut host, args.tasks);

    let mut scheduler: Scheduler<ToyHost> = Scheduler::new(config);

    let t0 = 0;
    scheduler.init_scheduler(t0, &mut host);
    drain_callbacks(&mut scheduler, &mut host, t0);

    for (i, task_id) in task_ids.into_iter().enumerate() {
        let t = (i as u64) * 1_000_000;
        scheduler.handle_new_task(t, &mut host, task_id);
        drain_callbacks(&mut scheduler, &mut host, t);
    }

    let t_check = 5_000_000;
    scheduler.scheduler_check(t_check, &mut host);
    drain_callbacks(&mut scheduler, &mut host, t_check);

    println!(
        "active tasks after scheduling pass: {}",
        scheduler.active_task_count()
    );

    let t_end = 60_000_000;
    scheduler.simulation_complete(t_end, &mut host);
}
