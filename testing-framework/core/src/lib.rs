pub mod metrics;
pub mod scenario;
pub mod timeouts;
pub mod workload;

use std::{ops::Mul as _, time::Duration};

/// In slow test environments, use 2x timeout.
#[must_use]
pub fn adjust_timeout(d: Duration) -> Duration {
    if apm_testing_env::slow_test_env() {
        d.mul(2)
    } else {
        d
    }
}
