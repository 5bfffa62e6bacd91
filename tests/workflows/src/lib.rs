pub use apm_testing_workflows::{ApmEc2Catalog, ScenarioBuilderExt};
