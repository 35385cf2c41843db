//! Retry and error classification
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 404 | Skip, never retried |
//! | HTTP 403 | Handed to the protection check |
//! | Configured retry code (429, 5xx, ...) | Retry with exponential backoff |
//! | Other 4xx/5xx | Skip |
//! | Navigation timeout / network error | Retry with exponential backoff |
//! | Browser context lost | Fresh context, then retry |
//! | Anything else | Skip |

use crate::config::Config;
use crate::BrowserError;
use std::time::Duration;

const NOT_FOUND: u16 = 404;
const FORBIDDEN: u16 = 403;

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// What to do after a failed fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry {
        delay: Duration,
        /// Throw away the browser context before the next attempt
        reset_context: bool,
    },
    Skip {
        reason: String,
    },
}

/// Bounded retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    retry_times: u32,
    retry_codes: Vec<u16>,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retry_times: u32, retry_codes: Vec<u16>, backoff: Duration) -> Self {
        Self {
            retry_times,
            retry_codes,
            backoff,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.limits.retry_times,
            config.limits.retry_http_codes.clone(),
            Duration::from_millis(config.limits.retry_backoff_ms),
        )
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    fn can_retry(&self, attempt: u32) -> bool {
        attempt <= self.retry_times
    }

    /// Classifies the status of a page that did load
    ///
    /// `None` means the page should go on to the protection check and
    /// extraction. `attempt` is the 1-based number of the attempt that
    /// produced `status`.
    pub fn classify_status(&self, status: Option<u16>, attempt: u32) -> Option<RetryDecision> {
        let code = status?;

        if code < 400 || code == FORBIDDEN {
            return None;
        }

        if code == NOT_FOUND {
            return Some(RetryDecision::Skip {
                reason: "HTTP 404".to_string(),
            });
        }

        if self.retry_codes.contains(&code) {
            if self.can_retry(attempt) {
                return Some(RetryDecision::Retry {
                    delay: self.backoff(attempt),
                    reset_context: false,
                });
            }
            return Some(RetryDecision::Skip {
                reason: format!("HTTP {} after {} attempts", code, attempt),
            });
        }

        Some(RetryDecision::Skip {
            reason: format!("HTTP {}", code),
        })
    }

    /// Classifies a navigation that produced no page at all
    pub fn classify_error(&self, error: &BrowserError, attempt: u32) -> RetryDecision {
        let transient = matches!(
            error,
            BrowserError::Timeout { .. }
                | BrowserError::Network { .. }
                | BrowserError::Navigation { .. }
                | BrowserError::ContextLost(_)
        );

        if !transient {
            return RetryDecision::Skip {
                reason: error.to_string(),
            };
        }

        if !self.can_retry(attempt) {
            return RetryDecision::Skip {
                reason: format!("{} (gave up after {} attempts)", error, attempt),
            };
        }

        RetryDecision::Retry {
            delay: self.backoff(attempt),
            reset_context: matches!(error, BrowserError::ContextLost(_)),
        }
    }
}
