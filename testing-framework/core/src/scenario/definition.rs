use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::{
    AgentProvisioner, DimensionFactory, HttpTarget, MetricCatalog, MetricsClient, ScenarioConfig,
    TrafficTarget,
};
use crate::workload::{ProcessGroupTerminator, WorkloadTerminator};

#[derive(Debug, Error)]
pub enum ScenarioBuildError {
    #[error("scenario requires an agent provisioner")]
    MissingProvisioner,
    #[error("scenario requires a metrics client")]
    MissingMetricsClient,
    #[error("scenario requires a metric catalog")]
    MissingCatalog,
    #[error("failed to build HTTP client for {url}: {source}")]
    HttpClient {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Immutable description of one APM run: configuration plus the collaborators
/// the runner drives.
pub struct Scenario {
    config: ScenarioConfig,
    provisioner: Box<dyn AgentProvisioner>,
    metrics_client: Arc<dyn MetricsClient>,
    catalog: Box<dyn MetricCatalog>,
    dimensions: DimensionFactory,
    traffic: Box<dyn TrafficTarget>,
    terminator: Box<dyn WorkloadTerminator>,
}

impl Scenario {
    #[must_use]
    pub fn builder(config: ScenarioConfig) -> Builder {
        Builder::new(config)
    }

    #[must_use]
    pub const fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    #[must_use]
    pub fn provisioner(&self) -> &dyn AgentProvisioner {
        self.provisioner.as_ref()
    }

    #[must_use]
    pub fn metrics_client(&self) -> &dyn MetricsClient {
        self.metrics_client.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn MetricCatalog {
        self.catalog.as_ref()
    }

    #[must_use]
    pub const fn dimensions(&self) -> &DimensionFactory {
        &self.dimensions
    }

    #[must_use]
    pub fn traffic(&self) -> &dyn TrafficTarget {
        self.traffic.as_ref()
    }

    #[must_use]
    pub fn terminator(&self) -> &dyn WorkloadTerminator {
        self.terminator.as_ref()
    }
}

/// Builder used by callers to assemble a scenario.
pub struct Builder {
    config: ScenarioConfig,
    provisioner: Option<Box<dyn AgentProvisioner>>,
    metrics_client: Option<Arc<dyn MetricsClient>>,
    catalog: Option<Box<dyn MetricCatalog>>,
    dimensions: DimensionFactory,
    traffic: Option<Box<dyn TrafficTarget>>,
    terminator: Option<Box<dyn WorkloadTerminator>>,
}

impl Builder {
    #[must_use]
    pub fn new(config: ScenarioConfig) -> Self {
        Self {
            config,
            provisioner: None,
            metrics_client: None,
            catalog: None,
            dimensions: DimensionFactory::default(),
            traffic: None,
            terminator: None,
        }
    }

    #[must_use]
    pub fn with_provisioner<P>(mut self, provisioner: P) -> Self
    where
        P: AgentProvisioner + 'static,
    {
        self.provisioner = Some(Box::new(provisioner));
        self
    }

    #[must_use]
    pub fn with_metrics_client<M>(mut self, client: M) -> Self
    where
        M: MetricsClient + 'static,
    {
        self.metrics_client = Some(Arc::new(client));
        self
    }

    /// Share an already constructed client (e.g. one the caller keeps
    /// inspecting after the run).
    #[must_use]
    pub fn with_shared_metrics_client(mut self, client: Arc<dyn MetricsClient>) -> Self {
        self.metrics_client = Some(client);
        self
    }

    #[must_use]
    pub fn with_catalog<C>(mut self, catalog: C) -> Self
    where
        C: MetricCatalog + 'static,
    {
        self.catalog = Some(Box::new(catalog));
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: DimensionFactory) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Replace the HTTP target built from `ScenarioConfig::traffic_url`.
    #[must_use]
    pub fn with_traffic_target<T>(mut self, target: T) -> Self
    where
        T: TrafficTarget + 'static,
    {
        self.traffic = Some(Box::new(target));
        self
    }

    /// Replace the default process-group terminator.
    #[must_use]
    pub fn with_terminator<T>(mut self, terminator: T) -> Self
    where
        T: WorkloadTerminator + 'static,
    {
        self.terminator = Some(Box::new(terminator));
        self
    }

    pub fn build(self) -> Result<Scenario, ScenarioBuildError> {
        let Self {
            config,
            provisioner,
            metrics_client,
            catalog,
            dimensions,
            traffic,
            terminator,
        } = self;

        let provisioner = provisioner.ok_or(ScenarioBuildError::MissingProvisioner)?;
        let metrics_client = metrics_client.ok_or(ScenarioBuildError::MissingMetricsClient)?;
        let catalog = catalog.ok_or(ScenarioBuildError::MissingCatalog)?;

        let traffic = match traffic {
            Some(traffic) => traffic,
            None => Box::new(
                HttpTarget::new(
                    config.traffic_url.clone(),
                    config.timeouts.probe_request_timeout,
                )
                .map_err(|source| ScenarioBuildError::HttpClient {
                    url: config.traffic_url.to_string(),
                    source,
                })?,
            ),
        };
        let terminator =
            terminator.unwrap_or_else(|| Box::new(ProcessGroupTerminator::new()));

        debug!(
            script = %config.script_path.display(),
            test_id = %config.test_id,
            traffic = %traffic.describe(),
            metrics = catalog.metrics().len(),
            "scenario built"
        );

        Ok(Scenario {
            config,
            provisioner,
            metrics_client,
            catalog,
            dimensions,
            traffic,
            terminator,
        })
    }
}
