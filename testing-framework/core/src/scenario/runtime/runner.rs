use std::fmt;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    scenario::{
        HttpReadinessError, MetricValidator, ProbeReport, ReadinessProbe, Scenario,
        TestGroupResult,
    },
    workload::{LaunchError, TeardownError, launch_workload},
};

/// Steps of a run, in the order they are reached.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum ScenarioPhase {
    Idle,
    AgentProvisioned,
    WorkloadRunning,
    WorkloadReady,
    MetricsSettled,
    MetricsValidated,
    TornDown,
}

impl ScenarioPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AgentProvisioned => "agent-provisioned",
            Self::WorkloadRunning => "workload-running",
            Self::WorkloadReady => "workload-ready",
            Self::MetricsSettled => "metrics-settled",
            Self::MetricsValidated => "metrics-validated",
            Self::TornDown => "torn-down",
        }
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to install agent with APM config\n{report}")]
    Provisioning { report: TestGroupResult },
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("failed to call the test service: {0}")]
    Readiness(#[from] HttpReadinessError),
    #[error("failed to validate APM metrics\n{report}")]
    Validation { report: TestGroupResult },
    #[error("failed to stop application: {0}")]
    Teardown(#[from] TeardownError),
}

impl ScenarioError {
    /// Human label of the step that failed.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::Provisioning { .. } => "agent provisioning",
            Self::Launch(_) => "workload launch",
            Self::Readiness(_) => "readiness probe",
            Self::Validation { .. } => "metric validation",
            Self::Teardown(_) => "teardown",
        }
    }

    /// Group results attached to the failure, if any.
    #[must_use]
    pub const fn report(&self) -> Option<&TestGroupResult> {
        match self {
            Self::Provisioning { report } | Self::Validation { report } => Some(report),
            _ => None,
        }
    }
}

/// Everything a successful run observed.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub phase: ScenarioPhase,
    pub agent: TestGroupResult,
    pub probe: ProbeReport,
    pub metrics: TestGroupResult,
}

/// Drives a [`Scenario`] through provisioning, traffic, validation and
/// teardown.
///
/// Once the workload has started it is torn down on every exit path. When
/// both the run and the teardown fail, the run's error is returned and the
/// teardown error is logged.
#[derive(Debug)]
pub struct Runner {
    phase: ScenarioPhase,
}

impl Runner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: ScenarioPhase::Idle,
        }
    }

    /// Last phase reached.
    #[must_use]
    pub const fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    pub async fn run(&mut self, scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
        let config = scenario.config();
        info!(
            test_name = %config.test_name,
            test_id = %config.test_id,
            script = %config.script_path.display(),
            "starting scenario"
        );

        let agent = scenario.provisioner().run().await;
        if !agent.status().is_successful() {
            error!("failed to install agent with APM config\n{agent}");
            return Err(ScenarioError::Provisioning { report: agent });
        }
        self.advance(ScenarioPhase::AgentProvisioned);

        let workload = launch_workload(&config.script_path, &config.test_id).await?;
        self.advance(ScenarioPhase::WorkloadRunning);

        let outcome = self.drive_workload(scenario).await;
        let teardown = workload.teardown(scenario.terminator()).await;

        match (outcome, teardown) {
            (Ok((probe, metrics)), Ok(())) => {
                self.advance(ScenarioPhase::TornDown);
                info!("scenario complete");
                Ok(ScenarioReport {
                    phase: self.phase,
                    agent,
                    probe,
                    metrics,
                })
            }
            (Ok(_), Err(err)) => {
                error!(error = %err, "teardown failed");
                Err(err.into())
            }
            (Err(err), Ok(())) => {
                error!(step = err.step(), error = %err, "scenario failed; workload stopped");
                Err(err)
            }
            (Err(err), Err(teardown_err)) => {
                error!(step = err.step(), error = %err, "scenario failed");
                warn!(error = %teardown_err, "teardown after failure also failed");
                Err(err)
            }
        }
    }

    async fn drive_workload(
        &mut self,
        scenario: &Scenario,
    ) -> Result<(ProbeReport, TestGroupResult), ScenarioError> {
        let config = scenario.config();

        let probe = ReadinessProbe::from_timeouts(&config.timeouts)
            .wait_until_serving(scenario.traffic())
            .await?;
        self.advance(ScenarioPhase::WorkloadReady);

        let wait = config.timeouts.propagation_wait;
        info!(wait_secs = wait.as_secs(), "waiting for metrics and traces to be exported");
        sleep(wait).await;
        self.advance(ScenarioPhase::MetricsSettled);

        let metrics = MetricValidator::from_timeouts(&config.timeouts)
            .validate_all(
                scenario.metrics_client(),
                scenario.dimensions(),
                scenario.catalog(),
                &config.namespace,
                &config.test_name,
            )
            .await;

        if !metrics.status().is_successful() {
            error!("failed to validate APM metrics\n{metrics}");
            return Err(ScenarioError::Validation { report: metrics });
        }
        self.advance(ScenarioPhase::MetricsValidated);

        Ok((probe, metrics))
    }

    fn advance(&mut self, phase: ScenarioPhase) {
        info!(from = %self.phase, to = %phase, "scenario phase");
        self.phase = phase;
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
