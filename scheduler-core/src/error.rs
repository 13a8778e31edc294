//! Error kinds for the scheduler core.
//!
//! Per the propagation policy, the core never throws across the host
//! boundary: every public handler on [`crate::scheduler::Scheduler`] returns
//! `()`. `SchedulerError` exists for the internal helpers (the provisioner,
//! the placement engine) whose *callers within the core* need to distinguish
//! failure kinds before deciding how to log them and whether state changed.

use thiserror::Error;

use crate::ids::TaskId;
use crate::types::CpuArch;

/// Unified error type for the scheduler core's internal fallible operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// A CPU architecture with no default guest type mapping. Raised by
    /// the provisioner at init; the affected group is skipped.
    #[error("unknown CPU architecture with no default guest mapping: {arch:?}")]
    UnknownCpu { arch: CpuArch },

    /// All three placement tiers were exhausted.
    #[error("task {task} could not be placed: all placement tiers exhausted")]
    Unplaceable { task: TaskId },

    /// A `SimHost` implementation returned a query result the core cannot
    /// act on (e.g. an id it has no record of). This is a host-side
    /// contract violation, kept distinct from scheduler logic errors above.
    #[error("host query inconsistency: {0}")]
    HostQuery(String),
}
