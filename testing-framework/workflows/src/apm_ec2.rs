use apm_testing_core::scenario::{DimensionInstruction, MetricCatalog, MetricSpec};

/// Metrics the agent publishes for every instrumented service.
pub const APM_METRIC_NAMES: [&str; 3] = ["Latency", "Error", "Fault"];

pub const EC2_ENVIRONMENT: &str = "ec2:default";
pub const GATEWAY_SERVICE: &str = "api-gateway";

/// Dimensions carried by server-side metrics of a service hosted on a plain
/// EC2 instance.
#[must_use]
pub fn ec2_server_consumer_instructions() -> Vec<DimensionInstruction> {
    vec![
        DimensionInstruction::known("HostedIn.EC2.Environment", EC2_ENVIRONMENT),
        DimensionInstruction::known("Service", GATEWAY_SERVICE),
    ]
}

/// `Latency`, `Error` and `Fault`, each checked against the EC2 server
/// consumer dimensions.
#[derive(Clone, Debug, Default)]
pub struct ApmEc2Catalog {
    extra_instructions: Vec<DimensionInstruction>,
}

impl ApmEc2Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an additional dimension on every metric, e.g.
    /// `DimensionInstruction::unknown("InstanceId")`.
    #[must_use]
    pub fn with_instruction(mut self, instruction: DimensionInstruction) -> Self {
        self.extra_instructions.push(instruction);
        self
    }
}

impl MetricCatalog for ApmEc2Catalog {
    fn metrics(&self) -> Vec<MetricSpec> {
        let mut instructions = ec2_server_consumer_instructions();
        instructions.extend(self.extra_instructions.iter().cloned());

        APM_METRIC_NAMES
            .iter()
            .map(|name| MetricSpec {
                name: (*name).to_owned(),
                instructions: instructions.clone(),
            })
            .collect()
    }
}
