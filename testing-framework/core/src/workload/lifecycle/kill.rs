use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use thiserror::Error;
use tracing::debug;

/// Process-group id of a launched workload. The workload is the group leader,
/// so the id equals the leader's pid.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProcessGroup(i32);

impl ProcessGroup {
    #[must_use]
    pub const fn from_leader_pid(pid: i32) -> Self {
        Self(pid)
    }

    #[must_use]
    pub const fn id(self) -> i32 {
        self.0
    }

    /// Negative pid addressing every member of the group.
    #[must_use]
    pub const fn signal_target(self) -> Pid {
        Pid::from_raw(-self.0)
    }
}

#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("failed to signal workload process group {group}: {source}")]
    Signal {
        group: i32,
        #[source]
        source: Errno,
    },
}

/// Raw signal delivery, split out so tests can observe the target.
pub trait SignalSender: Send + Sync {
    fn send(&self, target: Pid, signal: Signal) -> Result<(), Errno>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NixSignals;

impl SignalSender for NixSignals {
    fn send(&self, target: Pid, signal: Signal) -> Result<(), Errno> {
        signal::kill(target, signal)
    }
}

/// Terminates a workload together with every process it spawned.
pub trait WorkloadTerminator: Send + Sync {
    fn terminate(&self, group: ProcessGroup) -> Result<(), TeardownError>;
}

/// POSIX group kill: `SIGKILL` sent to the negated process-group id.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessGroupTerminator<S = NixSignals> {
    signals: S,
}

impl ProcessGroupTerminator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            signals: NixSignals,
        }
    }
}

impl<S: SignalSender> ProcessGroupTerminator<S> {
    #[must_use]
    pub const fn with_signals(signals: S) -> Self {
        Self { signals }
    }
}

impl<S: SignalSender> WorkloadTerminator for ProcessGroupTerminator<S> {
    fn terminate(&self, group: ProcessGroup) -> Result<(), TeardownError> {
        debug!(group = group.id(), "killing workload process group");
        self.signals
            .send(group.signal_target(), Signal::SIGKILL)
            .map_err(|source| TeardownError::Signal {
                group: group.id(),
                source,
            })
    }
}

/// Best-effort group kill used when a workload is dropped without teardown.
pub fn kill_group(group: ProcessGroup) {
    let _ = signal::kill(group.signal_target(), Signal::SIGKILL);
}
