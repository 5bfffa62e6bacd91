use std::{fs::File, io::BufWriter, path::PathBuf, process};

use anyhow::{Context as _, Result};
use apm_testing_core::{
    scenario::{
        DimensionFactory, Runner, Scenario, ScenarioConfig, ScenarioError, ScenarioReport, Status,
        TestGroupResult,
        config::{DEFAULT_SCRIPT_PATH, DEFAULT_TEST_ID, DEFAULT_TRAFFIC_URL},
    },
    timeouts::Timeouts,
};
use apm_testing_workflows::{
    AgentCtlProvisioner, BuilderInputError, ScenarioBuilderExt as _,
    agent::DEFAULT_RESOURCES_DIR,
};
use clap::Parser;
use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Run the APM EC2 scenario against a locally installed agent.
#[derive(Debug, Parser)]
#[command(name = "apm-ec2-runner")]
struct Args {
    /// Path to the workload launch script.
    #[arg(long, default_value = DEFAULT_SCRIPT_PATH)]
    path: PathBuf,

    /// Exported to the workload as `TESTING_ID`.
    #[arg(long = "test.id", default_value = DEFAULT_TEST_ID)]
    test_id: String,

    #[arg(long, default_value = DEFAULT_TRAFFIC_URL)]
    traffic_url: Url,

    /// Prometheus-compatible query endpoint [env: APM_METRICS_QUERY_URL].
    #[arg(long)]
    metrics_query_url: Option<String>,

    /// Value for dimensions resolved at runtime [env: APM_INSTANCE_ID].
    #[arg(long)]
    instance_id: Option<String>,

    /// Directory holding the agent config [env: APM_RESOURCES_DIR].
    #[arg(long)]
    resources_dir: Option<PathBuf>,

    /// Write a JSON summary of the run to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    test_name: &'a str,
    test_id: &'a str,
    status: Status,
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe_attempts: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<&'a TestGroupResult>,
}

impl<'a> RunSummary<'a> {
    fn new(
        config: &'a ScenarioConfig,
        runner: &Runner,
        outcome: &'a Result<ScenarioReport, ScenarioError>,
    ) -> Self {
        let mut summary = Self {
            test_name: &config.test_name,
            test_id: &config.test_id,
            status: Status::Successful,
            phase: runner.phase().label(),
            failed_step: None,
            error: None,
            probe_attempts: None,
            groups: Vec::new(),
        };
        match outcome {
            Ok(report) => {
                summary.probe_attempts = Some(report.probe.attempt);
                summary.groups = vec![&report.agent, &report.metrics];
            }
            Err(err) => {
                summary.status = Status::Failed;
                summary.failed_step = Some(err.step());
                summary.error = Some(err.to_string());
                summary.groups = err.report().into_iter().collect();
            }
        }
        summary
    }
}

fn init_tracing() {
    let filter = apm_testing_env::rust_log()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    info!(path = %args.path.display(), test_id = %args.test_id, "starting APM EC2 runner");

    if let Err(err) = run(args).await {
        warn!("APM EC2 scenario failed: {err:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = ScenarioConfig::new(args.path, args.test_id)
        .with_traffic_url(args.traffic_url)
        .with_timeouts(Timeouts::from_env());

    let metrics_url = args
        .metrics_query_url
        .or_else(apm_testing_env::apm_metrics_query_url)
        .ok_or(BuilderInputError::Missing {
            field: "metrics_query_url",
            env: "APM_METRICS_QUERY_URL",
        })?;
    let resources_dir = args
        .resources_dir
        .or_else(apm_testing_env::apm_resources_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCES_DIR));

    let dimensions = match args.instance_id {
        Some(instance_id) => {
            DimensionFactory::from_env().with_value(DimensionFactory::INSTANCE_ID_KEY, instance_id)
        }
        None => DimensionFactory::from_env(),
    };

    let scenario = Scenario::builder(config.clone())
        .with_provisioner(AgentCtlProvisioner::from_config_in(&config, &resources_dir))
        .with_apm_ec2_catalog()
        .with_dimensions(dimensions)
        .try_with_metrics_query_url_str(&metrics_url)?
        .build()
        .context("building APM EC2 scenario failed")?;

    let mut runner = Runner::new();
    let outcome = runner.run(&scenario).await;

    {
        let summary = RunSummary::new(&config, &runner, &outcome);
        for group in &summary.groups {
            println!("{group}");
        }
        if let Some(path) = &args.report {
            let file = File::create(path)
                .with_context(|| format!("creating report file {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &summary)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(report = %path.display(), "run report written");
        }
    }

    outcome.context("running APM EC2 scenario failed")?;
    info!("APM EC2 scenario passed");
    Ok(())
}
