use super::{ButtonLocator, ButtonPress};
use crate::browser::BrowserPage;
use crate::config::{Config, WaitState};
use crate::BrowserResult;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Waits used by in-page actions
#[derive(Debug, Clone, Copy)]
pub struct ActionTiming {
    /// Settle time after a page-changing click or a finished sequence
    pub settle: Duration,
    /// Pause between intermediate steps of a sequence
    pub step_delay: Duration,
    /// Pause after each scroll
    pub scroll_delay: Duration,
    /// How long a pre-scrape target may take to appear
    pub pre_click_timeout: Duration,
    /// How long a post-pagination click target may take to appear
    pub post_click_timeout: Duration,
    pub wait_state: WaitState,
    pub ready_timeout: Duration,
}

impl ActionTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle: Duration::from_secs(config.limits.page_delay),
            step_delay: Duration::from_millis(config.pagination.step_delay_ms),
            scroll_delay: Duration::from_secs(config.pagination.scroll_delay),
            pre_click_timeout: Duration::from_secs(10),
            post_click_timeout: Duration::from_secs(5),
            wait_state: config.limits.wait_state,
            ready_timeout: Duration::from_millis(config.limits.timeout),
        }
    }

    /// No waiting at all
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            step_delay: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            pre_click_timeout: Duration::ZERO,
            post_click_timeout: Duration::ZERO,
            wait_state: WaitState::Load,
            ready_timeout: Duration::ZERO,
        }
    }
}

/// Summary of a click-sequence run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Iterations in which every step was clicked
    pub completed_iterations: u32,
    pub clicks: u32,
}

/// Repeats a click sequence until a step is missing or `max_iterations` is hit
///
/// A step that is absent or hidden ends the whole run; that is how "no more
/// pages" shows up, so it is not an error. A failing click also ends the run.
pub async fn run_click_sequence<P: BrowserPage>(
    page: &P,
    steps: &[String],
    max_iterations: u32,
    timing: &ActionTiming,
) -> BrowserResult<SequenceReport> {
    let mut report = SequenceReport::default();
    if steps.is_empty() {
        return Ok(report);
    }

    info!(
        "Starting click sequence of {} steps (max {} iterations)",
        steps.len(),
        max_iterations
    );

    'iterations: for iteration in 1..=max_iterations {
        for (index, step) in steps.iter().enumerate() {
            if !page.is_visible(step).await? {
                info!(
                    "Step {} '{}' not found or hidden on iteration {}; sequence finished",
                    index + 1,
                    step,
                    iteration
                );
                break 'iterations;
            }

            match page.click(step).await {
                Ok(true) => report.clicks += 1,
                Ok(false) => {
                    info!("Step {} '{}' disappeared before the click", index + 1, step);
                    break 'iterations;
                }
                Err(e) => {
                    warn!("Click on '{}' failed: {}", step, e);
                    break 'iterations;
                }
            }

            let last = index + 1 == steps.len();
            tokio::time::sleep(if last { timing.settle } else { timing.step_delay }).await;
        }
        report.completed_iterations = iteration;
    }

    info!(
        "Click sequence complete: {} iterations, {} clicks",
        report.completed_iterations, report.clicks
    );
    Ok(report)
}

/// Scrolls to the bottom `count` times, pausing after each
pub async fn run_scrolls<P: BrowserPage>(
    page: &P,
    count: u32,
    timing: &ActionTiming,
) -> BrowserResult<()> {
    info!("Starting infinite scroll ({} times)", count);
    for i in 1..=count {
        debug!("Scroll {}/{}", i, count);
        page.scroll_to_bottom().await?;
        tokio::time::sleep(timing.scroll_delay).await;
    }
    Ok(())
}

/// Clicks cookie banners and reveal buttons before extraction
///
/// Each target gets a visibility wait; a missing or failing target is only a
/// warning. Returns the number of successful clicks.
pub async fn run_pre_clicks<P: BrowserPage>(
    page: &P,
    selectors: &[String],
    timing: &ActionTiming,
) -> BrowserResult<usize> {
    let mut clicked = 0;
    for (i, selector) in selectors.iter().enumerate() {
        debug!("Pre-scrape click {}/{}: '{}'", i + 1, selectors.len(), selector);

        if !page.wait_for_visible(selector, timing.pre_click_timeout).await? {
            warn!("Pre-scrape selector '{}' not found or hidden", selector);
            continue;
        }

        match page.click(selector).await {
            Ok(true) => {
                clicked += 1;
                tokio::time::sleep(timing.settle).await;
            }
            Ok(false) => warn!("Pre-scrape selector '{}' vanished before the click", selector),
            Err(e) => warn!("Error clicking pre-scrape selector '{}': {}", selector, e),
        }
    }
    Ok(clicked)
}

/// Presses a pagination button and any follow-up buttons
///
/// Returns false when the button itself could not be found, in which case
/// the page shows unfiltered content and should not be extracted.
pub async fn press_button<P: BrowserPage>(
    page: &P,
    press: &ButtonPress,
    timing: &ActionTiming,
) -> BrowserResult<bool> {
    let pressed = match &press.button {
        ButtonLocator::Css(selector) => page.click(selector).await?,
        ButtonLocator::Text { selector, text } => page.click_matching_text(selector, text).await?,
    };
    if !pressed {
        warn!("Pagination button for '{}' not found", press.value);
        return Ok(false);
    }

    for selector in &press.post_clicks {
        if !page.wait_for_visible(selector, timing.post_click_timeout).await? {
            warn!("Post-pagination selector '{}' not visible", selector);
            continue;
        }
        if !page.click(selector).await? {
            warn!("Post-pagination selector '{}' vanished before the click", selector);
        }
        tokio::time::sleep(timing.step_delay).await;
    }

    if let Err(e) = page.wait_for_ready(timing.wait_state, timing.ready_timeout).await {
        warn!("Page did not settle after pressing '{}': {}", press.value, e);
    }
    Ok(true)
}
