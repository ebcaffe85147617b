//! Waiter - Polls an operation until it reaches a target status
//!
//! The refresh function is called immediately, then once per poll interval.
//! Each observation falls into one of these cases:
//!
//! - status in the pending set: keep polling
//! - status in the target set: done
//! - any other status: abort with [`WaitError::UnexpectedState`]
//! - [`ClientError::NotFound`]: empty observation, the service has not caught up
//! - [`ClientError::Transient`]: keep polling, the deadline still applies
//! - any other error: abort immediately
//!
//! The poll interval sleep is the only suspension point besides the refresh
//! itself. Waiting never cancels the remote operation.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

use crate::client::{ClientError, OperationRecord, status};

/// Default delay between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest delay between two polls; a zero interval is raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default overall deadline (60 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Something carrying a status that can be waited on
pub trait Observed {
    fn status(&self) -> &str;

    /// Extra diagnostics attached when the status is unexpected
    fn detail(&self) -> Option<String> {
        None
    }
}

impl Observed for String {
    fn status(&self) -> &str {
        self
    }
}

impl Observed for OperationRecord {
    fn status(&self) -> &str {
        &self.status
    }

    fn detail(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("; "))
        }
    }
}

/// Parameters of a single wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl WaitSpec {
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Wait for a provisioning or termination record to succeed
    pub fn record_succeeded() -> Self {
        Self::new(
            [status::CREATED, status::IN_PROGRESS],
            [status::SUCCEEDED],
        )
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.iter().any(|s| s == status)
    }

    pub fn is_target(&self, status: &str) -> bool {
        self.target.iter().any(|s| s == status)
    }
}

/// Errors returned by [`wait_for_target`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The deadline passed before a target status was observed
    Timeout {
        timeout: Duration,
        attempts: u32,
        last_status: Option<String>,
    },

    /// A status outside both the pending and the target set was observed
    UnexpectedState {
        status: String,
        expected: Vec<String>,
        detail: Option<String>,
    },

    /// The refresh function failed with a non-retryable error
    Aborted(#[source] ClientError),
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout {
                timeout,
                attempts,
                last_status,
            } => write!(
                f,
                "Timed out after {:?} ({} polls), last observed status: {}",
                timeout,
                attempts,
                last_status.as_deref().unwrap_or("no observation yet")
            ),
            Self::UnexpectedState {
                status,
                expected,
                detail,
            } => {
                write!(
                    f,
                    "Unexpected status {} (expected one of: {})",
                    status,
                    expected.join(", ")
                )?;
                if let Some(detail) = detail {
                    write!(f, ": {}", detail)?;
                }
                Ok(())
            }
            Self::Aborted(err) => write!(f, "Polling aborted: {}", err),
        }
    }
}

/// Poll `refresh` until it reports a status in `spec.target`
///
/// Returns the observation that reached the target. Total time spent is
/// bounded by `spec.timeout` plus one poll interval and refresh latency.
pub async fn wait_for_target<R, F, Fut>(spec: &WaitSpec, mut refresh: F) -> Result<R, WaitError>
where
    R: Observed,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, ClientError>>,
{
    let started = Instant::now();
    let poll_interval = spec.poll_interval.max(MIN_POLL_INTERVAL);
    let mut attempts: u32 = 0;
    let mut last_status: Option<String> = None;

    loop {
        attempts = attempts.saturating_add(1);
        match refresh().await {
            Ok(observed) => {
                let current = observed.status();
                // Pending wins if the sets overlap; they should not.
                if spec.is_pending(current) {
                    log::debug!("Poll {}: status {} still pending", attempts, current);
                    last_status = Some(current.to_string());
                } else if spec.is_target(current) {
                    log::debug!("Poll {}: reached target status {}", attempts, current);
                    return Ok(observed);
                } else {
                    return Err(WaitError::UnexpectedState {
                        status: current.to_string(),
                        expected: spec.target.clone(),
                        detail: observed.detail(),
                    });
                }
            }
            Err(ClientError::NotFound(message)) => {
                log::debug!("Poll {}: nothing visible yet ({})", attempts, message);
            }
            Err(ClientError::Transient(message)) => {
                log::warn!("Poll {}: transient failure, retrying: {}", attempts, message);
            }
            Err(err) => return Err(WaitError::Aborted(err)),
        }

        let elapsed = started.elapsed();
        if elapsed >= spec.timeout {
            return Err(WaitError::Timeout {
                timeout: spec.timeout,
                attempts,
                last_status,
            });
        }
        sleep(poll_interval.min(spec.timeout - elapsed)).await;
    }
}
