use super::poll::{poll_until, PollPolicy};
use super::{is_challenge, PageProbe};
use crate::browser::BrowserPage;
use crate::config::Config;
use crate::state::ProtectionState;
use crate::BrowserResult;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// What the crawl should do with an inspected page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Extraction may proceed on `content`
    Clear {
        content: String,
        /// True when a challenge was solved by a person first
        solved: bool,
    },
    /// Challenge with nobody to solve it; the whole session must stop
    Blocked,
    /// Nobody solved the challenge in time; skip only this page
    Abandoned,
}

/// Runs the per-page protection state machine
#[derive(Debug, Clone)]
pub struct ProtectionHandler {
    policy: PollPolicy,
    snapshot_path: Option<PathBuf>,
}

impl ProtectionHandler {
    pub fn new(policy: PollPolicy, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            policy,
            snapshot_path,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            PollPolicy::new(
                config.browser.max_polls,
                Duration::from_millis(config.browser.poll_interval_ms),
            ),
            config.browser.storage_state_path.as_ref().map(PathBuf::from),
        )
    }

    /// Inspects a loaded page and, when possible, waits for a person to pass
    /// its challenge
    ///
    /// Never closes `page`; the caller owns the handle.
    pub async fn inspect<P: BrowserPage>(
        &self,
        page: &P,
        status: Option<u16>,
        interactive: bool,
    ) -> BrowserResult<Verdict> {
        let probe = PageProbe::read(page).await?;
        let state = ProtectionState::inspect(is_challenge(&probe.title, &probe.body, status));

        if state.allows_extraction() {
            return Ok(Verdict::Clear {
                content: probe.body,
                solved: false,
            });
        }

        warn!(
            "Bot protection detected on {} (status: {:?}, title: {:?})",
            page.url(),
            status,
            probe.title
        );

        let state = state.escalate(interactive);
        if state == ProtectionState::Blocked {
            error!(
                "Challenge on {} cannot be solved without a visible browser; stopping",
                page.url()
            );
            return Ok(Verdict::Blocked);
        }

        if let Err(e) = page.bring_to_front().await {
            warn!("Could not bring the challenge page to the front: {}", e);
        }
        info!(
            "Waiting up to {} checks for the challenge on {} to be solved in the browser window",
            self.policy.max_iterations,
            page.url()
        );

        let outcome = poll_until(self.policy, |_| async move {
            let probe = PageProbe::read(page).await?;
            Ok(!probe.has_markers())
        })
        .await?;

        let state = state.resolve(outcome.is_resolved());
        if state != ProtectionState::Clear {
            warn!("Challenge on {} was not solved in time; skipping page", page.url());
            return Ok(Verdict::Abandoned);
        }

        info!("Challenge solved on {}", page.url());
        if let Some(path) = &self.snapshot_path {
            if let Err(e) = page.save_auth_snapshot(path).await {
                warn!("Failed to save auth snapshot to {}: {}", path.display(), e);
            }
        }

        Ok(Verdict::Clear {
            content: page.content().await?,
            solved: true,
        })
    }
}
