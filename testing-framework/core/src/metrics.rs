//! Prometheus-backed [`MetricsClient`].

use std::{fmt::Write as _, time::Duration};

use async_trait::async_trait;
use prometheus_http_query::Client as PrometheusClient;
use reqwest::Url;
use thiserror::Error;
use tracing::debug;

use crate::scenario::{DimensionFactory, DimensionInstruction, MetricsClient, TestResult};

const DEFAULT_LOOKBACK: Duration = Duration::from_secs(10 * 60);
const NAMESPACE_LABEL: &str = "namespace";

#[derive(Debug, Error)]
#[error("{message}")]
pub struct MetricsError {
    message: String,
}

impl MetricsError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Checks that a metric has at least one sample in the lookback window.
#[derive(Clone)]
pub struct PrometheusMetricsClient {
    client: PrometheusClient,
    lookback: Duration,
}

impl PrometheusMetricsClient {
    pub fn new(base_url: Url) -> Result<Self, MetricsError> {
        let client = PrometheusClient::try_from(base_url.as_str())
            .map_err(|err| MetricsError::new(format!("invalid metrics query url {base_url}: {err}")))?;
        Ok(Self {
            client,
            lookback: DEFAULT_LOOKBACK,
        })
    }

    async fn sample_count(&self, query: &str) -> Result<usize, MetricsError> {
        let response = self
            .client
            .query(query)
            .get()
            .await
            .map_err(|err| MetricsError::new(format!("query failed: {err}")))?;

        Ok(response
            .data()
            .as_vector()
            .map_or(0, |vector| vector.len()))
    }
}

#[async_trait]
impl MetricsClient for PrometheusMetricsClient {
    async fn validate_metric(
        &self,
        dimensions: &DimensionFactory,
        namespace: &str,
        metric_name: &str,
        instructions: &[DimensionInstruction],
    ) -> TestResult {
        let resolved = match dimensions.resolve(instructions) {
            Ok(resolved) => resolved,
            Err(err) => return TestResult::failed(metric_name, err.to_string()),
        };

        let query = build_query(metric_name, namespace, &resolved, self.lookback);
        debug!(metric = metric_name, %query, "querying metrics backend");

        match self.sample_count(&query).await {
            Ok(0) => TestResult::failed(metric_name, format!("no datapoints for {query}")),
            Ok(_) => TestResult::successful(metric_name),
            Err(err) => TestResult::failed(metric_name, err.to_string()),
        }
    }
}

/// `last_over_time(<metric>{namespace="…",k="v",…}[<lookback>s])`
#[must_use]
pub fn build_query(
    metric_name: &str,
    namespace: &str,
    dimensions: &[(String, String)],
    lookback: Duration,
) -> String {
    let mut selector = format!("{NAMESPACE_LABEL}=\"{}\"", escape_value(namespace));
    for (key, value) in dimensions {
        let _ = write!(selector, ",{}=\"{}\"", label_name(key), escape_value(value));
    }
    format!(
        "last_over_time({}{{{selector}}}[{}s])",
        label_name(metric_name),
        lookback.as_secs().max(1)
    )
}

/// Maps an arbitrary dimension key onto `[a-zA-Z_][a-zA-Z0-9_]*`.
fn label_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn escape_value(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_sanitizes_keys_and_escapes_values() {
        let query = build_query(
            "Latency",
            "AWS/APM",
            &[
                ("HostedIn.EC2.Environment".to_owned(), "ec2:default".to_owned()),
                ("Service".to_owned(), "say \"hi\"".to_owned()),
            ],
            Duration::from_secs(300),
        );

        assert_eq!(
            query,
            r#"last_over_time(Latency{namespace="AWS/APM",HostedIn_EC2_Environment="ec2:default",Service="say \"hi\""}[300s])"#
        );
    }

    #[test]
    fn label_names_never_start_with_a_digit() {
        assert_eq!(label_name("5xx"), "_5xx");
        assert_eq!(label_name(""), "_");
    }

    #[tokio::test]
    async fn unresolvable_dimensions_fail_without_querying() {
        let client =
            PrometheusMetricsClient::new(Url::parse("http://127.0.0.1:9").unwrap()).unwrap();

        let result = client
            .validate_metric(
                &DimensionFactory::new(),
                "AWS/APM",
                "Latency",
                &[DimensionInstruction::unknown("InstanceId")],
            )
            .await;

        assert!(!result.status.is_successful());
        assert_eq!(
            result.detail.as_deref(),
            Some("no runtime value available for dimension 'InstanceId'")
        );
    }
}
