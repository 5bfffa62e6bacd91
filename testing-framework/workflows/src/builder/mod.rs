use apm_testing_core::{
    metrics::PrometheusMetricsClient,
    scenario::{Builder as CoreScenarioBuilder, DimensionFactory, ScenarioConfig},
};

use crate::{agent::AgentCtlProvisioner, apm_ec2::ApmEc2Catalog};

#[derive(Debug, thiserror::Error)]
pub enum BuilderInputError {
    #[error("invalid url for {field}: '{value}': {message}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        message: String,
    },
    #[error("{field} is required (flag or {env})")]
    Missing {
        field: &'static str,
        env: &'static str,
    },
}

/// Extension methods wiring the APM EC2 collaborators into a scenario.
pub trait ScenarioBuilderExt: Sized {
    /// Validate `Latency`, `Error` and `Fault` with the EC2 dimensions.
    #[must_use]
    fn with_apm_ec2_catalog(self) -> Self;

    /// Provision the agent through its control program for `config`.
    #[must_use]
    fn with_agent_ctl(self, config: &ScenarioConfig) -> Self;

    /// Resolve runtime dimensions from the environment.
    #[must_use]
    fn with_env_dimensions(self) -> Self;

    /// Query metrics from a Prometheus-compatible endpoint.
    fn try_with_metrics_query_url_str(self, url: &str) -> Result<Self, BuilderInputError>;
}

impl ScenarioBuilderExt for CoreScenarioBuilder {
    fn with_apm_ec2_catalog(self) -> Self {
        self.with_catalog(ApmEc2Catalog::new())
    }

    fn with_agent_ctl(self, config: &ScenarioConfig) -> Self {
        self.with_provisioner(AgentCtlProvisioner::from_config(config))
    }

    fn with_env_dimensions(self) -> Self {
        self.with_dimensions(DimensionFactory::from_env())
    }

    fn try_with_metrics_query_url_str(self, url: &str) -> Result<Self, BuilderInputError> {
        let invalid = |message: String| BuilderInputError::InvalidUrl {
            field: "metrics_query_url",
            value: url.to_string(),
            message,
        };
        let parsed = reqwest::Url::parse(url).map_err(|err| invalid(err.to_string()))?;
        let client = PrometheusMetricsClient::new(parsed).map_err(|err| invalid(err.to_string()))?;
        Ok(self.with_metrics_client(client))
    }
}

#[cfg(test)]
mod tests {
    use apm_testing_core::scenario::Scenario;

    use super::*;

    #[test]
    fn rejects_malformed_metrics_url() {
        let err = Scenario::builder(ScenarioConfig::default())
            .try_with_metrics_query_url_str("not a url")
            .err()
            .unwrap();

        assert!(matches!(
            err,
            BuilderInputError::InvalidUrl {
                field: "metrics_query_url",
                ..
            }
        ));
    }

    #[test]
    fn assembles_the_apm_ec2_scenario() {
        let config = ScenarioConfig::default();
        let scenario = Scenario::builder(config.clone())
            .with_agent_ctl(&config)
            .with_apm_ec2_catalog()
            .with_env_dimensions()
            .try_with_metrics_query_url_str("http://localhost:9090")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(scenario.catalog().metrics().len(), 3);
        assert_eq!(scenario.config().namespace, "AWS/APM");
    }
}
