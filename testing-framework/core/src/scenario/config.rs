use std::path::PathBuf;

use reqwest::Url;

use crate::timeouts::Timeouts;

pub const DEFAULT_SCRIPT_PATH: &str = "./resources/run_java_application.sh";
pub const DEFAULT_TEST_ID: &str = "unknown";
pub const DEFAULT_TRAFFIC_URL: &str = "http://localhost:8080/api/gateway/owners/1";
pub const DEFAULT_NAMESPACE: &str = "AWS/APM";
pub const DEFAULT_TEST_NAME: &str = "APMTest/EC2";
pub const DEFAULT_AGENT_CONFIG_FILE: &str = "config.json";
pub const TESTING_ID_ENV: &str = "TESTING_ID";

/// Inputs for one scenario run, built once at start and never mutated.
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub script_path: PathBuf,
    pub test_id: String,
    pub traffic_url: Url,
    pub namespace: String,
    pub test_name: String,
    pub agent_config_file: String,
    pub timeouts: Timeouts,
}

impl ScenarioConfig {
    #[must_use]
    pub fn new(script_path: impl Into<PathBuf>, test_id: impl Into<String>) -> Self {
        Self {
            script_path: script_path.into(),
            test_id: test_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_traffic_url(mut self, url: Url) -> Self {
        self.traffic_url = url;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from(DEFAULT_SCRIPT_PATH),
            test_id: DEFAULT_TEST_ID.to_owned(),
            traffic_url: default_traffic_url(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            test_name: DEFAULT_TEST_NAME.to_owned(),
            agent_config_file: DEFAULT_AGENT_CONFIG_FILE.to_owned(),
            timeouts: Timeouts::default(),
        }
    }
}

fn default_traffic_url() -> Url {
    Url::parse(DEFAULT_TRAFFIC_URL).unwrap_or_else(|_| unreachable!("default url is valid"))
}
