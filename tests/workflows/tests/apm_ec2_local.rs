//! Drives the APM EC2 scenario end to end on the local host: a real workload
//! process and a real HTTP gateway, with the agent and the metrics backend
//! replaced by in-process fakes.

use std::{
    fs,
    os::unix::fs::PermissionsExt as _,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use apm_testing_core::{
    scenario::{
        AgentProvisioner, DimensionFactory, DimensionInstruction, MetricsClient, Runner, Scenario,
        ScenarioConfig, ScenarioPhase, Status, TestGroupResult, TestResult,
    },
    timeouts::Timeouts,
};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serial_test::serial;
use tempfile::TempDir;
use tests_workflows::ScenarioBuilderExt as _;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpListener,
};

struct InstalledAgent;

#[async_trait]
impl AgentProvisioner for InstalledAgent {
    async fn run(&self) -> TestGroupResult {
        TestGroupResult::new("APMTest/EC2", vec![TestResult::successful("agent running")])
    }
}

#[derive(Default)]
struct RecordingMetrics {
    seen: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl MetricsClient for RecordingMetrics {
    async fn validate_metric(
        &self,
        dimensions: &DimensionFactory,
        _namespace: &str,
        metric_name: &str,
        instructions: &[DimensionInstruction],
    ) -> TestResult {
        match dimensions.resolve(instructions) {
            Ok(resolved) => {
                self.seen
                    .lock()
                    .unwrap()
                    .push((metric_name.to_owned(), resolved.len()));
                TestResult::successful(metric_name)
            }
            Err(err) => TestResult::failed(metric_name, err.to_string()),
        }
    }
}

/// Minimal HTTP/1.1 server answering each connection with the next status in
/// `statuses`, then 200 forever.
async fn gateway(statuses: Vec<u16>) -> (Url, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let served = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&served);

    tokio::spawn(async move {
        let mut statuses = statuses.into_iter();
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0_u8; 1024];
            let _ = stream.read(&mut buf).await;
            let status = StatusCode::from_u16(statuses.next().unwrap_or(200)).unwrap();
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            let _ = stream.write_all(response.as_bytes()).await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    let url = Url::parse(&format!("http://{addr}/api/gateway/owners/1")).unwrap();
    (url, served)
}

fn workload_script(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("run_java_application.sh");
    fs::write(&path, "#!/bin/sh\nexec sleep 600\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    path
}

fn fast_timeouts() -> Timeouts {
    Timeouts {
        probe_backoff_step: Duration::from_millis(20),
        probe_request_timeout: Duration::from_secs(5),
        propagation_wait: Duration::from_millis(50),
        metric_retry_delay: Duration::from_millis(20),
        ..Timeouts::default()
    }
}

#[tokio::test]
#[serial]
async fn apm_ec2_scenario_against_local_gateway() {
    let dir = TempDir::new().unwrap();
    let (url, served) = gateway(vec![503]).await;
    let metrics = Arc::new(RecordingMetrics::default());

    let config = ScenarioConfig::new(workload_script(&dir), "local-run")
        .with_traffic_url(url)
        .with_timeouts(fast_timeouts());
    let scenario = Scenario::builder(config)
        .with_provisioner(InstalledAgent)
        .with_shared_metrics_client(Arc::clone(&metrics) as Arc<dyn MetricsClient>)
        .with_apm_ec2_catalog()
        .build()
        .unwrap();

    let mut runner = Runner::new();
    let report = runner.run(&scenario).await.unwrap();

    assert_eq!(runner.phase(), ScenarioPhase::TornDown);
    assert_eq!(report.probe.attempt, 2);
    assert_eq!(report.probe.status, StatusCode::OK);
    assert_eq!(report.probe.waits, [Duration::from_nanos(10_000)]);
    assert_eq!(served.load(Ordering::SeqCst), 2);

    assert_eq!(report.metrics.status(), Status::Successful);
    let seen = metrics.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        [
            ("Latency".to_owned(), 2),
            ("Error".to_owned(), 2),
            ("Fault".to_owned(), 2),
        ]
    );
}

#[tokio::test]
#[serial]
async fn unreachable_gateway_fails_readiness_and_stops_workload() {
    let dir = TempDir::new().unwrap();
    // bind then drop to get a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = Url::parse(&format!("http://127.0.0.1:{port}/api/gateway/owners/1")).unwrap();

    let config = ScenarioConfig::new(workload_script(&dir), "local-run")
        .with_traffic_url(url)
        .with_timeouts(Timeouts {
            probe_attempts: 3,
            ..fast_timeouts()
        });
    let scenario = Scenario::builder(config)
        .with_provisioner(InstalledAgent)
        .with_metrics_client(RecordingMetrics::default())
        .with_apm_ec2_catalog()
        .build()
        .unwrap();

    let mut runner = Runner::new();
    let err = runner.run(&scenario).await.unwrap_err();

    assert_eq!(err.step(), "readiness probe");
    assert_eq!(runner.phase(), ScenarioPhase::WorkloadRunning);
}
