mod runner;

pub use runner::{Runner, ScenarioError, ScenarioPhase, ScenarioReport};
