use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ProbeConfig;

/// One submission target: endpoint, payload and the fixed call parameters.
///
/// Immutable once built; the orchestrator may submit it several times.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub endpoint: String,
    pub payload: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl JobRequest {
    pub fn new(
        endpoint: impl Into<String>,
        payload: Map<String, Value>,
        headers: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
            headers,
            timeout,
        }
    }

    /// Last path segment of the endpoint, used as a short name in logs.
    pub fn service_name(&self) -> &str {
        self.endpoint
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.endpoint)
    }
}

/// Retry bounds and fixed delays shared by every stage of a job attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub link_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            poll_interval: Duration::from_secs(5),
            link_retry_delay: Duration::from_secs(5),
        }
    }
}

impl From<&ProbeConfig> for RetryPolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            link_retry_delay: Duration::from_secs(config.link_retry_delay_secs),
        }
    }
}

impl RetryPolicy {
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.max_retries)
    }
}

/// Bounded retry counter. Each stage owns its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    used: u32,
    max: u32,
}

impl RetryBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }

    /// Consumes one retry. Returns `false` once the budget is used up.
    pub fn spend(&mut self) -> bool {
        if self.used < self.max {
            self.used += 1;
        }
        !self.is_exhausted()
    }
}

/// How a job attempt ended. Rendered into the persisted status string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Generation succeeded and at least one image link was fetchable.
    Delivered,
    /// Generation succeeded but no image link became fetchable.
    ArtifactsUnreachable,
    /// Every submission came back `failed` or timed out.
    SubmissionExhausted,
    /// The job never left `processing` within the poll budget.
    PollingExhausted,
    /// The API answered with a status outside the known set.
    UnexpectedStatus { status: String, message: String },
    /// Non-200 answer or transport fault.
    RequestFailed(String),
}

impl Termination {
    pub fn status(&self) -> String {
        match self {
            Termination::Delivered => "success".to_string(),
            Termination::ArtifactsUnreachable => "failed: maximum retries exceeded".to_string(),
            Termination::SubmissionExhausted => "failed".to_string(),
            Termination::PollingExhausted => "failed: max_retries exceeded".to_string(),
            Termination::UnexpectedStatus { status, message } => format!("{status}: {message}"),
            Termination::RequestFailed(reason) => format!("failed: {reason}"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Delivered)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status())
    }
}
