//! Crawler module for staff-page traversal
//!
//! This module contains the core crawling logic, including:
//! - The per-session visited set, queue, and page counters
//! - Retry and error classification for page loads
//! - Overall crawl coordination
//! - Progress events for presentation layers

mod coordinator;
mod progress;
mod retry;
mod session;

pub use crate::output::CrawlReport;
pub use coordinator::{Coordinator, FAILED_PAGE_ARTIFACT};
pub use progress::ProgressEvent;
pub use retry::{RetryDecision, RetryPolicy};
pub use session::{
    CrawlSession, ListingTarget, PageRequest, ProfileContext, ScheduleOutcome,
};

use crate::browser::{Browser, HttpBrowser};
use crate::config::{Config, EngineKind};
use crate::output::{open_sink, RecordSink};
use crate::ScraperError;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the output sink for the configured format
/// 2. Launch the configured browser engine
/// 3. Visit listing pages, handling protection and pagination
/// 4. Visit profile pages when cards link to them
/// 5. Write each record as soon as it is extracted
///
/// # Arguments
///
/// * `config` - A validated configuration
/// * `config_hash` - Fingerprint of the configuration file, stored with SQLite runs
/// * `progress` - Optional receiver of progress events
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(ScraperError)` - A fatal condition stopped the crawl
///
/// # Example
///
/// ```no_run
/// use team_scraper::config::load_config_with_hash;
/// use team_scraper::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("team.toml"))?;
/// let report = run_crawl(config, &hash, None).await?;
/// println!("{} records", report.records_emitted);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    progress: Option<UnboundedSender<ProgressEvent>>,
) -> Result<CrawlReport, ScraperError> {
    let output = config.output_path();
    let sink = open_sink(
        config.output.format,
        &output,
        config_hash,
        &config.target.url,
    )?;
    info!("Writing records to {}", sink.describe());

    match config.browser.engine {
        EngineKind::Http => {
            let browser = HttpBrowser::new(&config.browser.user_agent)?;
            drive(config, browser, sink, progress).await
        }
        EngineKind::Chromium => launch_chromium(config, sink, progress).await,
    }
}

#[cfg(feature = "chromium")]
async fn launch_chromium(
    config: Config,
    sink: Box<dyn RecordSink + Send>,
    progress: Option<UnboundedSender<ProgressEvent>>,
) -> Result<CrawlReport, ScraperError> {
    use crate::browser::{ChromiumBrowser, ChromiumOptions};

    let browser = ChromiumBrowser::launch(ChromiumOptions::from_config(&config)).await?;
    drive(config, browser, sink, progress).await
}

#[cfg(not(feature = "chromium"))]
async fn launch_chromium(
    _config: Config,
    _sink: Box<dyn RecordSink + Send>,
    _progress: Option<UnboundedSender<ProgressEvent>>,
) -> Result<CrawlReport, ScraperError> {
    Err(ScraperError::Browser(crate::BrowserError::Unsupported(
        "chromium engine (built without the `chromium` feature)",
    )))
}

async fn drive<B: Browser>(
    config: Config,
    browser: B,
    sink: Box<dyn RecordSink + Send>,
    progress: Option<UnboundedSender<ProgressEvent>>,
) -> Result<CrawlReport, ScraperError> {
    let mut coordinator = Coordinator::new(config, browser, sink)?;
    if let Some(tx) = progress {
        coordinator = coordinator.with_progress(tx);
    }
    coordinator.run().await
}
