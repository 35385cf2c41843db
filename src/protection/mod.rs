//! Bot-protection detection and the human-in-the-loop bypass
//!
//! One predicate ([`is_challenge`]) decides whether a page is a challenge
//! interstitial. It is shared by the first inspection of a freshly loaded page
//! and by every iteration of the bypass poll, and pages that timed out during
//! navigation go through the same inspection before anything else happens.

mod bypass;
mod poll;

pub use bypass::{ProtectionHandler, Verdict};
pub use poll::{poll_until, PollOutcome, PollPolicy};

use crate::browser::BrowserPage;
use crate::BrowserResult;

/// Title substrings shown by challenge interstitials
pub const CHALLENGE_TITLES: &[&str] = &[
    "Just a moment...",
    "Security Challenge",
    "Attention Required",
];

/// Body substrings shown while a challenge is active
pub const CHALLENGE_BODY_MARKERS: &[&str] = &[
    "Waiting for you to skip the captcha",
    "challenges.cloudflare.com/turnstile",
    "cdn-cgi/challenge-platform",
    "cf_chl_",
];

/// Status returned by most protection walls
pub const CHALLENGE_STATUS: u16 = 403;

/// True when the title or body carries a known challenge marker
pub fn has_challenge_markers(title: &str, body: &str) -> bool {
    CHALLENGE_TITLES.iter().any(|marker| title.contains(marker))
        || CHALLENGE_BODY_MARKERS.iter().any(|marker| body.contains(marker))
}

/// True when a loaded page is a challenge
///
/// # Examples
///
/// ```
/// use team_scraper::protection::is_challenge;
///
/// assert!(is_challenge("Just a moment...", "", Some(200)));
/// assert!(is_challenge("Our Team", "", Some(403)));
/// assert!(!is_challenge("Our Team", "<h3>Jane</h3>", Some(200)));
/// ```
pub fn is_challenge(title: &str, body: &str, status: Option<u16>) -> bool {
    status == Some(CHALLENGE_STATUS) || has_challenge_markers(title, body)
}

/// Title and body read from a live page
#[derive(Debug, Clone)]
pub struct PageProbe {
    pub title: String,
    pub body: String,
}

impl PageProbe {
    pub async fn read<P: BrowserPage>(page: &P) -> BrowserResult<Self> {
        Ok(Self {
            title: page.title().await?,
            body: page.content().await?,
        })
    }

    pub fn has_markers(&self) -> bool {
        has_challenge_markers(&self.title, &self.body)
    }
}
