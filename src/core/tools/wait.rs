//! Bounded polling for elements that may not exist yet.

use std::time::Duration;

use tokio::time::{Instant, sleep};

use super::effector::{HostEffector, ToolResult};

/// Longest wait a single tool call may request.
pub const MAX_WAIT: Duration = Duration::from_secs(10);

/// Smallest poll interval, so a zero interval cannot spin.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep looking for an element, and how often.
///
/// A zero timeout means a single immediate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            interval: Duration::from_millis(100),
        }
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_WAIT),
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Same interval, different timeout (capped at [`MAX_WAIT`]).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::new(timeout, self.interval)
    }
}

/// Poll `effector` until `lookup` resolves or the policy's timeout elapses.
///
/// Timing out is not an error: it yields `Ok(false)`. Host failures propagate.
pub async fn wait_for_element(
    effector: &dyn HostEffector,
    lookup: &str,
    policy: WaitPolicy,
) -> ToolResult<bool> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        if effector.element_exists(lookup).await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        sleep(policy.interval.min(deadline - now)).await;
    }
}
