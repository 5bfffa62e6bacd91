use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::{DimensionFactory, MetricCatalog, MetricSpec, MetricsClient, TestGroupResult, TestResult};
use crate::timeouts::Timeouts;

/// Validates every catalog metric with a bounded number of attempts each.
///
/// A metric stops retrying at its first successful attempt; otherwise the
/// validator waits `retry_delay` between attempts and keeps the last result.
#[derive(Clone, Copy, Debug)]
pub struct MetricValidator {
    retry_count: usize,
    retry_delay: Duration,
}

impl MetricValidator {
    #[must_use]
    pub const fn new(retry_count: usize, retry_delay: Duration) -> Self {
        Self {
            retry_count,
            retry_delay,
        }
    }

    #[must_use]
    pub const fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.metric_retry_count, timeouts.metric_retry_delay)
    }

    pub async fn validate_all(
        &self,
        client: &dyn MetricsClient,
        dimensions: &DimensionFactory,
        catalog: &dyn MetricCatalog,
        namespace: &str,
        group_name: &str,
    ) -> TestGroupResult {
        let metrics = catalog.metrics();
        info!(
            group = group_name,
            namespace,
            metrics = metrics.len(),
            retries = self.retry_count,
            "validating metrics"
        );

        let mut results = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            results.push(self.validate_one(client, dimensions, namespace, metric).await);
        }

        TestGroupResult::new(group_name, results)
    }

    pub async fn validate_one(
        &self,
        client: &dyn MetricsClient,
        dimensions: &DimensionFactory,
        namespace: &str,
        metric: &MetricSpec,
    ) -> TestResult {
        let mut last = TestResult::failed(metric.name.as_str(), "metric was never checked");

        for attempt in 1..=self.retry_count {
            last = client
                .validate_metric(dimensions, namespace, &metric.name, &metric.instructions)
                .await;

            if last.status.is_successful() {
                info!(metric = %metric.name, attempt, "metric validated");
                return last;
            }

            warn!(
                metric = %metric.name,
                attempt,
                detail = last.detail.as_deref().unwrap_or_default(),
                "metric not found yet"
            );

            if attempt < self.retry_count {
                sleep(self.retry_delay).await;
            }
        }

        last
    }
}

impl Default for MetricValidator {
    fn default() -> Self {
        Self::from_timeouts(&Timeouts::default())
    }
}
