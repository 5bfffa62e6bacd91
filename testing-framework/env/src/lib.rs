use std::{env, path::PathBuf};

#[must_use]
pub fn slow_test_env() -> bool {
    env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true")
}

#[must_use]
pub fn rust_log() -> Option<String> {
    env::var("RUST_LOG").ok()
}

/// Prometheus-compatible base URL the metrics client queries.
#[must_use]
pub fn apm_metrics_query_url() -> Option<String> {
    non_empty_var("APM_METRICS_QUERY_URL")
}

/// Instance id used to resolve dimensions whose value is only known at runtime.
#[must_use]
pub fn apm_instance_id() -> Option<String> {
    non_empty_var("APM_INSTANCE_ID")
}

#[must_use]
pub fn apm_agent_ctl() -> Option<PathBuf> {
    non_empty_var("APM_AGENT_CTL").map(PathBuf::from)
}

#[must_use]
pub fn apm_resources_dir() -> Option<PathBuf> {
    non_empty_var("APM_RESOURCES_DIR").map(PathBuf::from)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_owned())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn set(key: &str, value: &str) {
        // SAFETY: tests touching the environment are serialized.
        unsafe { env::set_var(key, value) }
    }

    fn unset(key: &str) {
        // SAFETY: tests touching the environment are serialized.
        unsafe { env::remove_var(key) }
    }

    #[test]
    #[serial]
    fn blank_values_are_treated_as_unset() {
        set("APM_INSTANCE_ID", "   ");
        assert_eq!(apm_instance_id(), None);

        set("APM_INSTANCE_ID", " i-0abc ");
        assert_eq!(apm_instance_id().as_deref(), Some("i-0abc"));
        unset("APM_INSTANCE_ID");
    }

    #[test]
    #[serial]
    fn slow_env_requires_literal_true() {
        set("SLOW_TEST_ENV", "1");
        assert!(!slow_test_env());

        set("SLOW_TEST_ENV", "true");
        assert!(slow_test_env());
        unset("SLOW_TEST_ENV");
    }
}
