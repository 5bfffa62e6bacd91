//! Launching and stopping the sample workload.

pub mod launcher;
pub mod lifecycle;

pub use launcher::{LaunchError, WorkloadProcess, launch_workload};
pub use lifecycle::kill::{
    NixSignals, ProcessGroup, ProcessGroupTerminator, SignalSender, TeardownError,
    WorkloadTerminator,
};
