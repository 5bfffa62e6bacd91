use anyhow::{Context as _, Result};
use apm_testing_core::{
    scenario::{Runner, Scenario, ScenarioConfig, config::DEFAULT_SCRIPT_PATH},
    timeouts::Timeouts,
};
use serial_test::serial;
use tests_workflows::ScenarioBuilderExt as _;

const TEST_ID: &str = "tests-workflows";

#[tokio::test]
#[serial]
#[ignore = "requires an EC2 host with the agent installed and the sample application"]
async fn apm_ec2_metrics_are_published() -> Result<()> {
    let metrics_url = apm_testing_env::apm_metrics_query_url()
        .context("APM_METRICS_QUERY_URL must point at the metrics backend")?;

    let config =
        ScenarioConfig::new(DEFAULT_SCRIPT_PATH, TEST_ID).with_timeouts(Timeouts::from_env());
    let scenario = Scenario::builder(config.clone())
        .with_agent_ctl(&config)
        .with_apm_ec2_catalog()
        .with_env_dimensions()
        .try_with_metrics_query_url_str(&metrics_url)?
        .build()?;

    let report = Runner::new()
        .run(&scenario)
        .await
        .context("APM EC2 scenario failed")?;
    println!("{}\n{}", report.agent, report.metrics);
    Ok(())
}
