use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, StatusCode, Url};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::DynError;
use crate::timeouts::Timeouts;

/// Something the prober can send a single request to.
#[async_trait]
pub trait TrafficTarget: Send + Sync {
    fn describe(&self) -> String;

    /// Issue one request. `Err` means no HTTP response arrived at all.
    async fn send(&self) -> Result<StatusCode, DynError>;
}

/// Plain `GET` against a fixed URL; only the status code is inspected.
#[derive(Clone, Debug)]
pub struct HttpTarget {
    client: ReqwestClient,
    url: Url,
}

impl HttpTarget {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = ReqwestClient::builder().timeout(request_timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl TrafficTarget for HttpTarget {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn send(&self) -> Result<StatusCode, DynError> {
        let response = self.client.get(self.url.clone()).send().await?;
        Ok(response.status())
    }
}

/// Error raised when no probe attempt received a usable response.
#[derive(Debug, Error)]
#[error("no successful response from {target} after {attempts} attempts (last: {last_failure})")]
pub struct HttpReadinessError {
    target: String,
    attempts: usize,
    last_failure: String,
}

impl HttpReadinessError {
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    #[must_use]
    pub fn last_failure(&self) -> &str {
        &self.last_failure
    }
}

/// Result of a successful readiness probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProbeReport {
    pub attempt: usize,
    pub status: StatusCode,
    /// Sleeps taken before the successful attempt, in order.
    pub waits: Vec<Duration>,
}

/// Sends traffic until the workload answers with a non-5xx status.
///
/// Attempts are numbered from 1. A transport failure on attempt `i` backs off
/// for `i * backoff_step` (linear); a 5xx waits `server_error_delay`. Nothing
/// sleeps after the final attempt.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessProbe {
    attempts: usize,
    backoff_step: Duration,
    server_error_delay: Duration,
}

impl ReadinessProbe {
    #[must_use]
    pub const fn new(attempts: usize, backoff_step: Duration, server_error_delay: Duration) -> Self {
        Self {
            attempts,
            backoff_step,
            server_error_delay,
        }
    }

    #[must_use]
    pub const fn from_timeouts(timeouts: &Timeouts) -> Self {
        Self::new(
            timeouts.probe_attempts,
            timeouts.probe_backoff_step,
            timeouts.server_error_retry_delay,
        )
    }

    /// Backoff applied after a transport failure on `attempt`.
    #[must_use]
    pub fn transport_backoff(&self, attempt: usize) -> Duration {
        self.backoff_step
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }

    pub async fn wait_until_serving(
        &self,
        target: &dyn TrafficTarget,
    ) -> Result<ProbeReport, HttpReadinessError> {
        let description = target.describe();
        info!(
            target = %description,
            attempts = self.attempts,
            backoff_step_secs = self.backoff_step.as_secs(),
            "sending traffic to workload"
        );

        let mut waits = Vec::new();
        let mut last_failure = String::from("no attempt made");

        for attempt in 1..=self.attempts {
            let wait = match target.send().await {
                Ok(status) if status.as_u16() >= 500 => {
                    warn!(attempt, status = status.as_u16(), "returned failure response");
                    last_failure = format!("status {status}");
                    self.server_error_delay
                }
                Ok(status) => {
                    info!(attempt, status = status.as_u16(), "successfully sent out the request");
                    return Ok(ProbeReport {
                        attempt,
                        status,
                        waits,
                    });
                }
                Err(err) => {
                    warn!(attempt, error = %err, "failed to send out request");
                    last_failure = err.to_string();
                    self.transport_backoff(attempt)
                }
            };

            if attempt < self.attempts {
                debug!(attempt, wait_ms = wait.as_millis(), "backing off before next request");
                sleep(wait).await;
                waits.push(wait);
            }
        }

        Err(HttpReadinessError {
            target: description,
            attempts: self.attempts,
            last_failure,
        })
    }
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self::from_timeouts(&Timeouts::default())
    }
}
