use std::{env, time::Duration};

pub const PROBE_ATTEMPTS: usize = 9;
pub const PROBE_BACKOFF_STEP_SECS: u64 = 10;
/// Delay after a 5xx response. The value is nanoseconds, matching the literal
/// the scenario was written with; override it explicitly if seconds were meant.
pub const SERVER_ERROR_RETRY_DELAY_NANOS: u64 = 10_000;
pub const PROBE_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const PROPAGATION_WAIT_SECS: u64 = 60;
pub const METRIC_RETRY_COUNT: usize = 3;
pub const METRIC_RETRY_DELAY_SECS: u64 = 15;
pub const AGENT_SETTLE_SECS: u64 = 30;

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_duration(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_u64(key, default))
}

fn env_count(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

pub fn probe_attempts() -> usize {
    env_count("APM_PROBE_ATTEMPTS", PROBE_ATTEMPTS)
}

pub fn probe_backoff_step() -> Duration {
    env_duration("APM_PROBE_BACKOFF_STEP_SECS", PROBE_BACKOFF_STEP_SECS)
}

pub fn server_error_retry_delay() -> Duration {
    Duration::from_nanos(env_u64(
        "APM_SERVER_ERROR_RETRY_DELAY_NANOS",
        SERVER_ERROR_RETRY_DELAY_NANOS,
    ))
}

pub fn probe_request_timeout() -> Duration {
    crate::adjust_timeout(env_duration(
        "APM_PROBE_REQUEST_TIMEOUT_SECS",
        PROBE_REQUEST_TIMEOUT_SECS,
    ))
}

pub fn propagation_wait() -> Duration {
    env_duration("APM_PROPAGATION_WAIT_SECS", PROPAGATION_WAIT_SECS)
}

pub fn metric_retry_count() -> usize {
    env_count("APM_METRIC_RETRY_COUNT", METRIC_RETRY_COUNT)
}

pub fn metric_retry_delay() -> Duration {
    env_duration("APM_METRIC_RETRY_DELAY_SECS", METRIC_RETRY_DELAY_SECS)
}

pub fn agent_settle() -> Duration {
    env_duration("APM_AGENT_SETTLE_SECS", AGENT_SETTLE_SECS)
}

/// Every wait and retry ceiling the scenario uses, resolved once at start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub probe_attempts: usize,
    pub probe_backoff_step: Duration,
    pub server_error_retry_delay: Duration,
    pub probe_request_timeout: Duration,
    pub propagation_wait: Duration,
    pub metric_retry_count: usize,
    pub metric_retry_delay: Duration,
    pub agent_settle: Duration,
}

impl Timeouts {
    /// Defaults overlaid with any `APM_*` environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            probe_attempts: probe_attempts(),
            probe_backoff_step: probe_backoff_step(),
            server_error_retry_delay: server_error_retry_delay(),
            probe_request_timeout: probe_request_timeout(),
            propagation_wait: propagation_wait(),
            metric_retry_count: metric_retry_count(),
            metric_retry_delay: metric_retry_delay(),
            agent_settle: agent_settle(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_attempts: PROBE_ATTEMPTS,
            probe_backoff_step: Duration::from_secs(PROBE_BACKOFF_STEP_SECS),
            server_error_retry_delay: Duration::from_nanos(SERVER_ERROR_RETRY_DELAY_NANOS),
            probe_request_timeout: Duration::from_secs(PROBE_REQUEST_TIMEOUT_SECS),
            propagation_wait: Duration::from_secs(PROPAGATION_WAIT_SECS),
            metric_retry_count: METRIC_RETRY_COUNT,
            metric_retry_delay: Duration::from_secs(METRIC_RETRY_DELAY_SECS),
            agent_settle: Duration::from_secs(AGENT_SETTLE_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn env_overrides_replace_defaults() {
        // SAFETY: environment mutation is serialized across tests.
        unsafe {
            env::set_var("APM_PROPAGATION_WAIT_SECS", "5");
            env::set_var("APM_METRIC_RETRY_COUNT", "0");
            env::set_var("APM_SERVER_ERROR_RETRY_DELAY_NANOS", "10000000000");
            env::set_var("APM_AGENT_SETTLE_SECS", "2");
        }

        let timeouts = Timeouts::from_env();
        assert_eq!(timeouts.propagation_wait, Duration::from_secs(5));
        // zero is rejected, the ceiling falls back to the default
        assert_eq!(timeouts.metric_retry_count, METRIC_RETRY_COUNT);
        assert_eq!(timeouts.server_error_retry_delay, Duration::from_secs(10));
        assert_eq!(timeouts.agent_settle, Duration::from_secs(2));

        unsafe {
            env::remove_var("APM_PROPAGATION_WAIT_SECS");
            env::remove_var("APM_METRIC_RETRY_COUNT");
            env::remove_var("APM_SERVER_ERROR_RETRY_DELAY_NANOS");
            env::remove_var("APM_AGENT_SETTLE_SECS");
        }
    }

    #[test]
    fn default_server_error_delay_is_nanoseconds() {
        assert_eq!(
            Timeouts::default().server_error_retry_delay,
            Duration::from_micros(10)
        );
    }
}
