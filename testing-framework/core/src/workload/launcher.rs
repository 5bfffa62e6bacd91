use std::{
    io,
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{
    fs,
    process::{Child, Command},
};
use tracing::{debug, info, warn};

use super::lifecycle::kill::{ProcessGroup, TeardownError, WorkloadTerminator, kill_group};
use crate::scenario::config::TESTING_ID_ENV;

const EXECUTE_BITS: u32 = 0o111;
const SHELL: &str = "bash";
/// Runs the script passed as `$0`; scripts without a `#!` line run as shell
/// scripts.
const RUN_SCRIPT: &str = r#""$0""#;

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("file {path} does not exist")]
    MissingScript { path: PathBuf },
    #[error("failed to inspect {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to make {path} executable: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start application '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("application '{path}' exited before its pid could be recorded")]
    MissingPid { path: PathBuf },
}

/// A running workload script, leader of its own process group.
///
/// Owned exclusively by the scenario. Call [`WorkloadProcess::teardown`] to
/// stop it; dropping it without teardown still kills the whole group.
#[derive(Debug)]
pub struct WorkloadProcess {
    child: Child,
    pid: u32,
    group: ProcessGroup,
    torn_down: bool,
}

impl WorkloadProcess {
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub const fn process_group(&self) -> ProcessGroup {
        self.group
    }

    /// Kills the whole process group, then reaps the leader. Signal delivery
    /// failures are returned; reap failures are only logged.
    pub async fn teardown(mut self, terminator: &dyn WorkloadTerminator) -> Result<(), TeardownError> {
        info!(pid = self.pid, group = self.group.id(), "stopping workload");
        terminator.terminate(self.group)?;
        self.torn_down = true;

        match self.child.wait().await {
            Ok(status) => debug!(pid = self.pid, %status, "workload reaped"),
            Err(err) => debug!(pid = self.pid, error = %err, "failed to reap workload"),
        }
        Ok(())
    }
}

impl Drop for WorkloadProcess {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        warn!(
            pid = self.pid,
            group = self.group.id(),
            "workload dropped without teardown; killing process group"
        );
        kill_group(self.group);
    }
}

/// Starts `script_path` through `bash` in a new process group with
/// `TESTING_ID` added to the inherited environment. The shell leads the group.
///
/// Nothing is spawned when the script is missing or cannot be made executable.
pub async fn launch_workload(script_path: &Path, test_id: &str) -> Result<WorkloadProcess, LaunchError> {
    let exists = fs::try_exists(script_path)
        .await
        .map_err(|source| LaunchError::Inspect {
            path: script_path.to_path_buf(),
            source,
        })?;
    if !exists {
        return Err(LaunchError::MissingScript {
            path: script_path.to_path_buf(),
        });
    }

    make_executable(script_path)
        .await
        .map_err(|source| LaunchError::Permissions {
            path: script_path.to_path_buf(),
            source,
        })?;

    let program = std::path::absolute(script_path).map_err(|source| LaunchError::Spawn {
        path: script_path.to_path_buf(),
        source,
    })?;

    debug!(script = %program.display(), test_id, "spawning workload process");

    let child = Command::new(SHELL)
        .arg("-c")
        .arg(RUN_SCRIPT)
        .arg(&program)
        .env(TESTING_ID_ENV, test_id)
        .process_group(0)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            path: program.clone(),
            source,
        })?;

    let Some(pid) = child.id() else {
        return Err(LaunchError::MissingPid { path: program });
    };
    let group = ProcessGroup::from_leader_pid(pid as i32);

    info!(pid, group = group.id(), script = %program.display(), "workload started");

    Ok(WorkloadProcess {
        child,
        pid,
        group,
        torn_down: false,
    })
}

async fn make_executable(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path).await?.permissions();
    let mode = permissions.mode();
    if mode & EXECUTE_BITS == EXECUTE_BITS {
        return Ok(());
    }
    permissions.set_mode(mode | EXECUTE_BITS);
    fs::set_permissions(path, permissions).await
}
