use crate::BrowserResult;
use std::future::Future;
use std::time::Duration;

/// Bounds of a wait-and-recheck loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_iterations: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_iterations: u32, interval: Duration) -> Self {
        Self {
            max_iterations,
            interval,
        }
    }
}

impl Default for PollPolicy {
    /// One check per second for five minutes
    fn default() -> Self {
        Self::new(300, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The condition held on the given 1-based iteration
    Resolved { iterations: u32 },
    Exhausted,
}

impl PollOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Sleeps `interval`, then runs `check`, up to `max_iterations` times
///
/// Stops early once `check` returns true. Errors from `check` end the poll.
pub async fn poll_until<F, Fut>(policy: PollPolicy, mut check: F) -> BrowserResult<PollOutcome>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = BrowserResult<bool>>,
{
    for iteration in 1..=policy.max_iterations {
        tokio::time::sleep(policy.interval).await;
        if check(iteration).await? {
            return Ok(PollOutcome::Resolved {
                iterations: iteration,
            });
        }
    }
    Ok(PollOutcome::Exhausted)
}
