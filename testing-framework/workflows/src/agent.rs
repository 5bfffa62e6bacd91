use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};

use apm_testing_core::{
    scenario::{AgentProvisioner, ScenarioConfig, TestGroupResult, TestResult},
    timeouts::AGENT_SETTLE_SECS,
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::{fs, process::Command, time::sleep};
use tracing::{debug, info, warn};

pub const DEFAULT_AGENT_CTL: &str =
    "/opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl";
pub const DEFAULT_AGENT_CONFIG_TARGET: &str = "/opt/aws/amazon-cloudwatch-agent/bin/config.json";
pub const DEFAULT_RESOURCES_DIR: &str = "./agent_configs";

const COPY_STEP: &str = "copy agent config";
const FETCH_STEP: &str = "fetch agent config";

#[derive(Debug, Error)]
pub enum AgentCtlError {
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status:?}: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Installs the agent config and restarts the agent through its control
/// program (`-a fetch-config -m ec2 -s -c file:<config>`).
#[derive(Clone, Debug)]
pub struct AgentCtlProvisioner {
    group_name: String,
    ctl: PathBuf,
    config_source: PathBuf,
    config_target: PathBuf,
    settle: Duration,
}

impl AgentCtlProvisioner {
    #[must_use]
    pub fn new(
        group_name: impl Into<String>,
        ctl: impl Into<PathBuf>,
        config_source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            ctl: ctl.into(),
            config_source: config_source.into(),
            config_target: PathBuf::from(DEFAULT_AGENT_CONFIG_TARGET),
            settle: Duration::from_secs(AGENT_SETTLE_SECS),
        }
    }

    /// Provisioner for `config`, taking the control program and resources
    /// directory from `APM_AGENT_CTL` / `APM_RESOURCES_DIR` when set. The
    /// settle wait comes from `config.timeouts`.
    #[must_use]
    pub fn from_config(config: &ScenarioConfig) -> Self {
        let resources = apm_testing_env::apm_resources_dir()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR));
        Self::from_config_in(config, &resources)
    }

    #[must_use]
    pub fn from_config_in(config: &ScenarioConfig, resources_dir: &Path) -> Self {
        let ctl =
            apm_testing_env::apm_agent_ctl().unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_CTL));
        Self::new(
            config.test_name.clone(),
            ctl,
            resources_dir.join(&config.agent_config_file),
        )
        .with_settle(config.timeouts.agent_settle)
    }

    #[must_use]
    pub fn with_ctl(mut self, ctl: impl Into<PathBuf>) -> Self {
        self.ctl = ctl.into();
        self
    }

    #[must_use]
    pub fn with_config_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.config_target = target.into();
        self
    }

    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub fn config_target(&self) -> &Path {
        &self.config_target
    }

    async fn copy_config(&self) -> Result<(), AgentCtlError> {
        fs::copy(&self.config_source, &self.config_target)
            .await
            .map_err(|source| AgentCtlError::Copy {
                from: self.config_source.clone(),
                to: self.config_target.clone(),
                source,
            })?;
        debug!(
            from = %self.config_source.display(),
            to = %self.config_target.display(),
            "agent config installed"
        );
        Ok(())
    }

    async fn fetch_config(&self) -> Result<Output, AgentCtlError> {
        let mut cmd = Command::new(&self.ctl);
        cmd.arg("-a")
            .arg("fetch-config")
            .arg("-m")
            .arg("ec2")
            .arg("-s")
            .arg("-c")
            .arg(format!("file:{}", self.config_target.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let command = format!("{} -a fetch-config", self.ctl.display());
        info!(%command, "starting agent");
        run_ctl_command(cmd, &command).await
    }
}

#[async_trait]
impl AgentProvisioner for AgentCtlProvisioner {
    async fn run(&self) -> TestGroupResult {
        let mut results = Vec::new();

        if let Err(err) = self.copy_config().await {
            warn!(error = %err, "agent config copy failed");
            results.push(TestResult::failed(COPY_STEP, err.to_string()));
            return TestGroupResult::new(&self.group_name, results);
        }
        results.push(TestResult::successful(COPY_STEP));

        match self.fetch_config().await {
            Ok(output) => {
                debug!(
                    stdout = %String::from_utf8_lossy(&output.stdout),
                    "agent ctl output"
                );
                results.push(TestResult::successful(FETCH_STEP));
            }
            Err(err) => {
                warn!(error = %err, "agent failed to start");
                results.push(TestResult::failed(FETCH_STEP, err.to_string()));
                return TestGroupResult::new(&self.group_name, results);
            }
        }

        info!(settle_secs = self.settle.as_secs(), "waiting for agent to settle");
        sleep(self.settle).await;

        TestGroupResult::new(&self.group_name, results)
    }
}

async fn run_ctl_command(mut cmd: Command, command: &str) -> Result<Output, AgentCtlError> {
    let output = cmd.output().await.map_err(|source| AgentCtlError::Spawn {
        command: command.to_owned(),
        source,
    })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(AgentCtlError::Failed {
            command: command.to_owned(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs as std_fs, os::unix::fs::PermissionsExt as _};

    use apm_testing_core::{scenario::Status, timeouts::Timeouts};
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn fake_ctl(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("agent-ctl");
        std_fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std_fs::set_permissions(&path, std_fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn provisioner(dir: &TempDir, ctl: PathBuf) -> AgentCtlProvisioner {
        AgentCtlProvisioner::from_config_in(&ScenarioConfig::default(), dir.path())
            .with_config_target(dir.path().join("installed.json"))
            .with_settle(Duration::ZERO)
            .with_ctl(ctl)
    }

    #[tokio::test]
    #[serial]
    async fn installs_config_and_runs_fetch_config() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("config.json"), r#"{"traces":{}}"#).unwrap();
        let args_file = dir.path().join("args");
        let ctl = fake_ctl(&dir, &format!("echo \"$@\" > {}", args_file.display()));
        let provisioner = provisioner(&dir, ctl);

        let group = provisioner.run().await;

        assert_eq!(group.status(), Status::Successful, "{group}");
        assert_eq!(group.name, "APMTest/EC2");
        assert_eq!(
            std_fs::read_to_string(provisioner.config_target()).unwrap(),
            r#"{"traces":{}}"#
        );
        let args = std_fs::read_to_string(args_file).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "-a fetch-config -m ec2 -s -c file:{}",
                provisioner.config_target().display()
            )
        );
    }

    #[test]
    fn settle_wait_follows_the_scenario_timeouts() {
        let config = ScenarioConfig::default().with_timeouts(Timeouts {
            agent_settle: Duration::from_secs(7),
            ..Timeouts::default()
        });

        let provisioner = AgentCtlProvisioner::from_config_in(&config, Path::new("/resources"));

        assert_eq!(provisioner.settle, Duration::from_secs(7));
        assert_eq!(provisioner.config_source, Path::new("/resources/config.json"));
    }

    #[tokio::test]
    #[serial]
    async fn missing_config_skips_the_agent() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let ctl = fake_ctl(&dir, &format!("touch {}", marker.display()));

        let group = provisioner(&dir, ctl).run().await;

        assert_eq!(group.status(), Status::Failed);
        assert_eq!(group.test_results.len(), 1);
        assert_eq!(group.test_results[0].name, COPY_STEP);
        assert!(!marker.exists());
    }

    #[tokio::test]
    #[serial]
    async fn failing_ctl_reports_stderr() {
        let dir = TempDir::new().unwrap();
        std_fs::write(dir.path().join("config.json"), "{}").unwrap();
        let ctl = fake_ctl(&dir, "echo 'agent not installed' >&2\nexit 3");

        let group = provisioner(&dir, ctl).run().await;

        assert_eq!(group.status(), Status::Failed);
        let failure = group.failures().next().unwrap();
        assert_eq!(failure.name, FETCH_STEP);
        let detail = failure.detail.as_deref().unwrap();
        assert!(detail.contains("Some(3)"), "{detail}");
        assert!(detail.contains("agent not installed"), "{detail}");
    }
}
