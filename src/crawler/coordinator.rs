//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop, which drives each page through:
//! - Fetching with bounded retries
//! - The bot-protection check and human bypass
//! - Pre-scrape clicks and pagination actions
//! - Extraction, with records written to the sink as they are found
//! - Scheduling of newly discovered pages and profile pages
//!
//! Every page handle opened here is closed here, on every exit path.

use crate::browser::{Browser, BrowserPage, Loaded, NavigationOptions};
use crate::config::Config;
use crate::crawler::progress::{Progress, ProgressEvent};
use crate::crawler::retry::{RetryDecision, RetryPolicy};
use crate::crawler::session::{
    CrawlSession, ListingTarget, PageRequest, ProfileContext, ScheduleOutcome,
};
use crate::extract::{Extractor, PersonRecord};
use crate::output::{CrawlReport, RecordSink};
use crate::pagination::{
    press_button, run_click_sequence, run_pre_clicks, run_scrolls, ActionTiming, PaginationMode,
    PaginationTarget,
};
use crate::protection::{PageProbe, ProtectionHandler, Verdict};
use crate::state::SessionPhase;
use crate::{BrowserError, ScraperError, UrlError};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use url::Url;

/// File written when the first page yields nothing
pub const FAILED_PAGE_ARTIFACT: &str = "debug_failed_page.html";

/// Main crawler coordinator structure
pub struct Coordinator<B: Browser> {
    config: Config,
    browser: B,
    sink: Box<dyn RecordSink + Send>,
    extractor: Extractor,
    pagination: Option<PaginationMode>,
    protection: ProtectionHandler,
    retry: RetryPolicy,
    timing: ActionTiming,
    navigation: NavigationOptions,
    pre_clicks: Vec<String>,
    page_delay: Duration,
    download_delay: Duration,
    last_request: Option<Instant>,
    progress: Progress,
    report: CrawlReport,
}

impl<B: Browser> Coordinator<B> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    /// * `browser` - The engine pages are opened in
    /// * `sink` - Where records are written
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(ScraperError)` - A selector in the configuration does not compile
    pub fn new(
        config: Config,
        browser: B,
        sink: Box<dyn RecordSink + Send>,
    ) -> Result<Self, ScraperError> {
        let extractor = Extractor::new(&config)?;
        let pagination = PaginationMode::from_config(&config)?;
        let report = CrawlReport::new(&config.target.url, sink.describe());

        Ok(Self {
            extractor,
            pagination,
            protection: ProtectionHandler::from_config(&config),
            retry: RetryPolicy::from_config(&config),
            timing: ActionTiming::from_config(&config),
            navigation: NavigationOptions::from_config(&config),
            pre_clicks: config.pre_scrape_clicks(),
            page_delay: Duration::from_secs(config.limits.page_delay),
            download_delay: Duration::from_secs(config.limits.download_delay),
            last_request: None,
            progress: Progress::default(),
            report,
            config,
            browser,
            sink,
        })
    }

    /// Streams progress events to `tx`
    pub fn with_progress(mut self, tx: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Progress::new(tx);
        self
    }

    /// Replaces the waits used by in-page actions and between pages
    pub fn with_timing(
        mut self,
        timing: ActionTiming,
        page_delay: Duration,
        download_delay: Duration,
    ) -> Self {
        self.timing = timing;
        self.page_delay = page_delay;
        self.download_delay = download_delay;
        self
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the protection handler
    pub fn with_protection(mut self, protection: ProtectionHandler) -> Self {
        self.protection = protection;
        self
    }

    /// Runs the crawl to completion
    ///
    /// The sink is finished and the browser shut down whether or not the
    /// crawl succeeds.
    pub async fn run(mut self) -> Result<CrawlReport, ScraperError> {
        let started = Instant::now();
        let mut session = CrawlSession::new(&self.config.target.url, self.config.limits.max_pages)?;

        info!(
            "Starting crawl of {} (max {} pages, pagination: {})",
            self.config.target.url,
            self.config.limits.max_pages,
            self.pagination.as_ref().map_or("none", |p| p.name())
        );

        let outcome = self.crawl(&mut session).await;
        session.enter(SessionPhase::Done);

        let finished = self.sink.finish();
        if let Err(e) = self.browser.shutdown().await {
            warn!("Browser did not shut down cleanly: {}", e);
        }

        self.report.duration = started.elapsed();
        self.progress.emit(ProgressEvent::Finished {
            pages: self.report.pages_extracted,
            records: self.report.records_emitted,
        });

        if let Err(e) = &outcome {
            error!("Crawl stopped: {}", e);
        }
        outcome?;
        finished?;

        info!(
            "Crawl completed: {} records from {} pages in {:?}",
            self.report.records_emitted, self.report.pages_extracted, self.report.duration
        );

        Ok(self.report)
    }

    async fn crawl(&mut self, session: &mut CrawlSession) -> Result<(), ScraperError> {
        while let Some(request) = session.next_request() {
            match request {
                PageRequest::Listing(target) => {
                    if !session.begin_listing() {
                        info!(
                            "Page limit {} reached, abandoning {}",
                            self.config.limits.max_pages,
                            target.url()
                        );
                        self.report.pages_abandoned += 1;
                        continue;
                    }
                    self.process_listing(session, target).await?;
                }
                PageRequest::Profile { url, context } => {
                    self.process_profile(session, url, context).await?;
                }
            }
        }

        debug!(
            "Queue drained after {} listing pages ({} targets visited)",
            session.page_counter(),
            session.visited_count()
        );
        Ok(())
    }

    async fn process_listing(
        &mut self,
        session: &mut CrawlSession,
        target: ListingTarget,
    ) -> Result<(), ScraperError> {
        let url = target.url().to_string();
        info!(
            "Page {}/{}: {}",
            session.page_counter(),
            self.config.limits.max_pages,
            url
        );
        self.progress.emit(ProgressEvent::PageStarted {
            number: session.page_counter(),
            max_pages: self.config.limits.max_pages,
            url: url.clone(),
        });

        let Some(loaded) = self.fetch(session, &url).await? else {
            return Ok(());
        };
        let Loaded {
            page,
            status,
            timed_out,
        } = loaded;
        if timed_out {
            warn!("Timed out loading {}; extracting what rendered", url);
        }

        let result = self.handle_listing(session, &page, status, &target).await;
        self.release(page).await;
        result
    }

    async fn handle_listing(
        &mut self,
        session: &mut CrawlSession,
        page: &B::Page,
        status: Option<u16>,
        target: &ListingTarget,
    ) -> Result<(), ScraperError> {
        let url = target.url();
        tokio::time::sleep(self.page_delay).await;

        let Some(content) = self.check_protection(session, page, status).await? else {
            return Ok(());
        };

        session.enter(SessionPhase::OnPageActions);
        let Some(html) = self.run_page_actions(session, page, target, content).await else {
            self.skip(url, "pagination button not found".to_string());
            return Ok(());
        };

        session.enter(SessionPhase::Extract);
        let page_url = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
        let cards = self.extractor.extract_cards(&html, &page_url);
        info!("Found {} items on {}", cards.len(), url);
        self.progress.emit(ProgressEvent::ItemsFound {
            url: url.to_string(),
            count: cards.len(),
        });

        if cards.is_empty() {
            if session.on_first_page() && !self.config.has_pagination() {
                let artifact = self.capture_failed_page(&html);
                return Err(ScraperError::EmptyFirstPage {
                    selector: self.config.container_selector(),
                    artifact,
                });
            }
            info!("No items on {}, continuing", url);
        }

        for card in cards {
            let Some(profile_url) = card.profile_url.clone() else {
                let record = card.into_record(&self.config.target.url, url);
                self.emit(record)?;
                continue;
            };

            let context = ProfileContext {
                name: card.name.clone(),
                position: card.position.clone(),
                listing_url: url.to_string(),
            };
            match session.schedule_profile(profile_url.clone(), context)? {
                ScheduleOutcome::ListingPage => {
                    debug!("Profile link {} is a listing page, keeping the card", profile_url);
                    let record = card.into_record(&self.config.target.url, url);
                    self.emit(record)?;
                }
                ScheduleOutcome::AlreadyVisited => {
                    debug!("Profile already queued: {}", profile_url);
                }
                ScheduleOutcome::Scheduled
                | ScheduleOutcome::PageLimit
                | ScheduleOutcome::NotSchedulable => {}
            }
        }
        self.report.pages_extracted += 1;

        self.paginate(session, &html, &page_url)?;
        Ok(())
    }

    /// Runs the protection state machine; `None` means the page was abandoned
    async fn check_protection(
        &mut self,
        session: &mut CrawlSession,
        page: &B::Page,
        status: Option<u16>,
    ) -> Result<Option<String>, ScraperError> {
        session.enter(SessionPhase::ProtectionCheck);
        let interactive = self.browser.is_interactive();

        if status == Some(403) {
            warn!("HTTP 403 on {}, likely bot detection", page.url());
        }

        let verdict = match self.protection.inspect(page, status, interactive).await {
            Ok(verdict) => verdict,
            Err(e) => {
                self.browser_failure(page.url(), e).await;
                return Ok(None);
            }
        };

        match verdict {
            Verdict::Clear { content, solved } => {
                if solved {
                    self.report.challenges_solved += 1;
                    self.progress.emit(ProgressEvent::ChallengeSolved {
                        url: page.url().to_string(),
                    });
                }
                Ok(Some(content))
            }
            Verdict::Blocked => {
                self.progress.emit(ProgressEvent::ProtectionDetected {
                    url: page.url().to_string(),
                    interactive,
                });
                Err(ScraperError::ProtectionBlocked {
                    url: page.url().to_string(),
                })
            }
            Verdict::Abandoned => {
                self.progress.emit(ProgressEvent::ProtectionDetected {
                    url: page.url().to_string(),
                    interactive,
                });
                self.skip(page.url(), "challenge not solved in time".to_string());
                Ok(None)
            }
        }
    }

    /// Runs pre-scrape clicks and the pagination action, returning the markup
    /// to extract from; `None` when a pagination button is missing
    async fn run_page_actions(
        &mut self,
        session: &CrawlSession,
        page: &B::Page,
        target: &ListingTarget,
        content: String,
    ) -> Option<String> {
        let mut changed = false;

        if !self.pre_clicks.is_empty()
            && (session.on_first_page() || self.config.actions.pre_scrape_all_pages)
        {
            match run_pre_clicks(page, &self.pre_clicks, &self.timing).await {
                Ok(clicked) => changed |= clicked > 0,
                Err(e) => self.warn(format!("Pre-scrape clicks failed on {}: {}", page.url(), e)),
            }
        }

        if let ListingTarget::Click(press) = target {
            match press_button(page, press, &self.timing).await {
                Ok(true) => changed = true,
                Ok(false) => return None,
                Err(e) => {
                    self.warn(format!("Pressing '{}' failed: {}", press.value, e));
                    return None;
                }
            }
        }

        match self.pagination.as_ref().and_then(|p| p.on_page_action()) {
            Some(PaginationTarget::ClickSequence(steps)) => {
                match run_click_sequence(page, &steps, self.config.limits.max_pages, &self.timing)
                    .await
                {
                    Ok(report) => {
                        info!(
                            "Click sequence finished after {} iterations ({} clicks)",
                            report.completed_iterations, report.clicks
                        );
                        changed |= report.clicks > 0;
                    }
                    Err(e) => self.warn(format!("Click sequence failed: {}", e)),
                }
            }
            Some(PaginationTarget::ScrollNTimes(count)) => {
                match run_scrolls(page, count, &self.timing).await {
                    Ok(()) => changed = true,
                    Err(e) => self.warn(format!("Scrolling failed: {}", e)),
                }
            }
            _ => {}
        }

        if !changed {
            return Some(content);
        }

        match page.content().await {
            Ok(html) => Some(html),
            Err(e) => {
                self.warn(format!(
                    "Could not re-read {} after page actions: {}",
                    page.url(),
                    e
                ));
                Some(content)
            }
        }
    }

    fn paginate(
        &mut self,
        session: &mut CrawlSession,
        html: &str,
        page_url: &Url,
    ) -> Result<(), ScraperError> {
        let Some(mode) = self.pagination.as_ref().filter(|m| m.schedules_pages()) else {
            return Ok(());
        };
        session.enter(SessionPhase::Paginate);

        let mut scheduled = 0;
        let mut limited = 0;
        for target in mode.discover(html, page_url) {
            match session.schedule_listing(target)? {
                ScheduleOutcome::Scheduled => scheduled += 1,
                ScheduleOutcome::PageLimit => limited += 1,
                ScheduleOutcome::AlreadyVisited
                | ScheduleOutcome::ListingPage
                | ScheduleOutcome::NotSchedulable => {}
            }
        }

        if scheduled > 0 {
            info!("Scheduled {} new pages from {}", scheduled, page_url);
        }
        if limited > 0 {
            info!("Page limit reached, {} targets not scheduled", limited);
        }
        Ok(())
    }

    async fn process_profile(
        &mut self,
        session: &mut CrawlSession,
        url: Url,
        context: ProfileContext,
    ) -> Result<(), ScraperError> {
        info!("Profile of {}: {}", context.name, url);
        self.progress.emit(ProgressEvent::ProfileStarted {
            name: context.name.clone(),
            url: url.to_string(),
        });

        let email = match self.fetch(session, url.as_str()).await? {
            Some(loaded) => {
                let result = self
                    .handle_profile(session, &loaded.page, loaded.status, &context)
                    .await;
                self.release(loaded.page).await;
                result?
            }
            None => String::new(),
        };
        self.report.profiles_visited += 1;

        self.emit(PersonRecord {
            name: context.name,
            email,
            position: context.position,
            source_url: self.config.target.url.clone(),
            page_url: url.to_string(),
        })
    }

    /// Reads the email from a profile page; empty when none was found
    async fn handle_profile(
        &mut self,
        session: &mut CrawlSession,
        page: &B::Page,
        status: Option<u16>,
        context: &ProfileContext,
    ) -> Result<String, ScraperError> {
        let Some(content) = self.check_protection(session, page, status).await? else {
            return Ok(String::new());
        };

        session.enter(SessionPhase::OnPageActions);
        session.enter(SessionPhase::Extract);

        let found = self.extractor.extract_profile_email(&content);
        if found.email.is_empty() {
            if found.selector_present {
                warn!(
                    "Email selector matched on {} but held no address for {}",
                    page.url(),
                    context.name
                );
            } else {
                warn!(
                    "Email selector not found on profile page {} for {}",
                    page.url(),
                    context.name
                );
            }
        }
        Ok(found.email)
    }

    /// Opens `url`, retrying per the policy; `None` when the page is skipped
    async fn fetch(
        &mut self,
        session: &mut CrawlSession,
        url: &str,
    ) -> Result<Option<Loaded<B::Page>>, ScraperError> {
        let mut attempt = 1;

        loop {
            session.enter(SessionPhase::FetchPage);
            self.throttle().await;

            let decision = match self.browser.open(url, &self.navigation).await {
                Ok(loaded) => match self.retry.classify_status(loaded.status, attempt) {
                    None => return Ok(Some(loaded)),
                    Some(decision) => {
                        if self.shows_challenge(&loaded.page).await {
                            debug!("Error page for {} carries challenge markers", url);
                            return Ok(Some(loaded));
                        }
                        self.release(loaded.page).await;
                        decision
                    }
                },
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempt, url, e);
                    self.retry.classify_error(&e, attempt)
                }
            };

            match decision {
                RetryDecision::Retry {
                    delay,
                    reset_context,
                } => {
                    warn!("Retrying {} in {:?} (attempt {})", url, delay, attempt + 1);
                    self.report.retries += 1;
                    if reset_context {
                        if let Err(e) = self.browser.reset_context().await {
                            return Err(ScraperError::Browser(e));
                        }
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Skip { reason } => {
                    self.skip(url, reason);
                    return Ok(None);
                }
            }
        }
    }

    async fn shows_challenge(&self, page: &B::Page) -> bool {
        match PageProbe::read(page).await {
            Ok(probe) => probe.has_markers(),
            Err(_) => false,
        }
    }

    /// Waits out the download delay since the previous request
    async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.download_delay {
                tokio::time::sleep(self.download_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn emit(&mut self, record: PersonRecord) -> Result<(), ScraperError> {
        self.sink.write(&record)?;

        self.report.records_emitted += 1;
        let has_email = !record.email.is_empty();
        if has_email {
            info!("Found: {} | {} | {}", record.name, record.position, record.email);
        } else {
            self.report.records_without_email += 1;
            info!("Found: {} | {} | Email: not found", record.name, record.position);
        }

        self.progress.emit(ProgressEvent::RecordSaved {
            name: record.name,
            has_email,
        });
        Ok(())
    }

    fn skip(&mut self, url: &str, reason: String) {
        warn!("Skipping {}: {}", url, reason);
        self.report.pages_skipped += 1;
        self.report.failures.push((url.to_string(), reason));
    }

    fn warn(&self, message: String) {
        warn!("{}", message);
        self.progress.emit(ProgressEvent::Warning { message });
    }

    /// A page operation failed outright; the page is skipped and a lost
    /// context is replaced
    async fn browser_failure(&mut self, url: &str, error: BrowserError) {
        let lost = matches!(error, BrowserError::ContextLost(_));
        self.skip(url, error.to_string());
        if lost {
            if let Err(e) = self.browser.reset_context().await {
                warn!("Could not reset the browser context: {}", e);
            }
        }
    }

    async fn release(&self, page: B::Page) {
        let url = page.url().to_string();
        if let Err(e) = page.close().await {
            debug!("Closing {} failed: {}", url, e);
        }
    }

    /// Saves the markup of an empty first page for inspection
    fn capture_failed_page(&self, html: &str) -> Option<PathBuf> {
        let path = PathBuf::from(&self.config.output.diagnostics_dir).join(FAILED_PAGE_ARTIFACT);
        let written = std::fs::create_dir_all(&self.config.output.diagnostics_dir)
            .and_then(|_| std::fs::write(&path, html));

        match written {
            Ok(()) => {
                error!(
                    "No items matched '{}' on the first page; saved it to {}",
                    self.config.container_selector(),
                    path.display()
                );
                Some(path)
            }
            Err(e) => {
                warn!("Could not save {}: {}", path.display(), e);
                None
            }
        }
    }
}
