//! Readiness polling against remote resources
//!
//! Resource creation on the platform is asynchronous; the only way to learn
//! the outcome is to describe the resource again. The poller drives that at
//! a fixed cadence, with no client-side concurrency: {Pending, Ready,
//! Failed}, transitions driven solely by the remote responses.

use crate::client::ApiError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Readiness reported by one probe of a remote resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Resource is still being worked on
    Pending,
    /// Resource reached its usable state
    Ready,
    /// Resource entered a failed state
    Failed(String),
}

/// Error raised when a resource does not become ready
#[derive(Debug, Error)]
pub enum PollError {
    #[error("{resource} entered a failed state: {reason}")]
    ResourceFailed { resource: String, reason: String },

    #[error("{resource} not ready after {attempts} attempts")]
    TimedOut { resource: String, attempts: usize },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Fixed-cadence readiness poller
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    max_attempts: usize,
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Derive a poller that keeps this cadence but covers at least
    /// `timeout_secs` of wall time
    pub fn covering(&self, timeout_secs: u64) -> Self {
        let interval_secs = self.interval.as_secs().max(1);
        Self::new(
            self.interval,
            (timeout_secs / interval_secs).max(1) as usize,
        )
    }

    /// Probe until the resource is ready, it fails, or attempts run out
    pub async fn wait_for<F, Fut>(&self, resource: &str, mut probe: F) -> Result<(), PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Readiness, ApiError>>,
    {
        for attempt in 1..=self.max_attempts {
            match probe().await? {
                Readiness::Ready => {
                    debug!("{} ready after {} attempt(s)", resource, attempt);
                    return Ok(());
                }
                Readiness::Failed(reason) => {
                    return Err(PollError::ResourceFailed {
                        resource: resource.to_string(),
                        reason,
                    });
                }
                Readiness::Pending => {
                    debug!(
                        "{} pending (attempt {}/{})",
                        resource, attempt, self.max_attempts
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        }

        Err(PollError::TimedOut {
            resource: resource.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), 120)
    }
}
