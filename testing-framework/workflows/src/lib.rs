pub mod agent;
pub mod apm_ec2;
pub mod builder;

pub use agent::{AgentCtlError, AgentCtlProvisioner};
pub use apm_ec2::{APM_METRIC_NAMES, ApmEc2Catalog, ec2_server_consumer_instructions};
pub use builder::{BuilderInputError, ScenarioBuilderExt};
