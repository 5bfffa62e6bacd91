use async_trait::async_trait;

use super::{DimensionFactory, DimensionInstruction, TestGroupResult, TestResult};

/// Installs and configures the agent under test, reporting pass/fail.
#[async_trait]
pub trait AgentProvisioner: Send + Sync {
    async fn run(&self) -> TestGroupResult;
}

/// Single-attempt metric check against the metrics backend. Implementations
/// must be idempotent so the validator can retry them.
#[async_trait]
pub trait MetricsClient: Send + Sync {
    async fn validate_metric(
        &self,
        dimensions: &DimensionFactory,
        namespace: &str,
        metric_name: &str,
        instructions: &[DimensionInstruction],
    ) -> TestResult;
}

/// A metric expected to be published, with the dimensions it must carry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub instructions: Vec<DimensionInstruction>,
}

/// Ordered list of metrics the scenario validates.
pub trait MetricCatalog: Send + Sync {
    fn metrics(&self) -> Vec<MetricSpec>;
}

impl MetricCatalog for Vec<MetricSpec> {
    fn metrics(&self) -> Vec<MetricSpec> {
        self.clone()
    }
}
