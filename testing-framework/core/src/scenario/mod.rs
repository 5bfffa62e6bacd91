//! Scenario model and runtime for the APM end-to-end run.

mod capabilities;
pub mod config;
mod definition;
pub mod dimension;
pub mod http_probe;
mod runtime;
pub mod status;
pub mod validation;

pub use capabilities::{AgentProvisioner, MetricCatalog, MetricSpec, MetricsClient};
pub use config::ScenarioConfig;
pub use definition::{Builder, Scenario, ScenarioBuildError};
pub use dimension::{DimensionFactory, DimensionInstruction, ExpectedDimensionValue};
pub use http_probe::{HttpReadinessError, HttpTarget, ProbeReport, ReadinessProbe, TrafficTarget};
pub use runtime::{Runner, ScenarioError, ScenarioPhase, ScenarioReport};
pub use status::{Status, TestGroupResult, TestResult};
pub use validation::MetricValidator;

/// Type-erased error used by scenario collaborators.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
