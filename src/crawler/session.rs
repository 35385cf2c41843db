//! Per-crawl mutable state
//!
//! The session owns the visited set, the request queue, and the page
//! counters. Targets are marked visited when they are scheduled, so a target
//! can never be queued twice however often pages link to it.

use crate::pagination::{ButtonPress, PaginationTarget};
use crate::state::SessionPhase;
use crate::url::visit_key;
use crate::UrlError;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};
use url::Url;

/// A listing page to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingTarget {
    Fetch(Url),
    Click(ButtonPress),
}

impl ListingTarget {
    /// URL to navigate to before any in-page action
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch(url) => url.as_str(),
            Self::Click(press) => &press.page_url,
        }
    }
}

/// Card fields carried to a profile page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileContext {
    pub name: String,
    pub position: String,
    pub listing_url: String,
}

/// One unit of work in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Listing(ListingTarget),
    Profile { url: Url, context: ProfileContext },
}

/// Why a target was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    AlreadyVisited,
    /// A profile link that resolves to a page already crawled as a listing
    ListingPage,
    PageLimit,
    /// Infinite scroll and click sequences act on the current page
    NotSchedulable,
}

/// Mutable state of one crawl
#[derive(Debug)]
pub struct CrawlSession {
    start_url: Url,
    max_pages: u32,
    visited: HashSet<String>,
    /// Keys of queued profile pages, a subset of `visited`
    profiles: HashSet<String>,
    queue: VecDeque<PageRequest>,
    /// Listing pages dequeued for processing
    page_counter: u32,
    /// Listing pages ever queued, the start page included
    scheduled_pages: u32,
    phase: SessionPhase,
}

impl CrawlSession {
    /// Creates a session with the start page already queued
    pub fn new(start_url: &str, max_pages: u32) -> Result<Self, UrlError> {
        let start = Url::parse(start_url).map_err(|e| UrlError::Parse(e.to_string()))?;
        let mut session = Self {
            start_url: start.clone(),
            max_pages,
            visited: HashSet::new(),
            profiles: HashSet::new(),
            queue: VecDeque::new(),
            page_counter: 0,
            scheduled_pages: 0,
            phase: SessionPhase::Init,
        };
        session.schedule_listing(PaginationTarget::FetchUrl(start))?;
        Ok(session)
    }

    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    pub fn page_counter(&self) -> u32 {
        self.page_counter
    }

    pub fn scheduled_pages(&self) -> u32 {
        self.scheduled_pages
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// True while the first listing page is being processed
    pub fn on_first_page(&self) -> bool {
        self.page_counter == 1
    }

    /// Moves the session to `next`
    pub fn enter(&mut self, next: SessionPhase) {
        if !self.phase.can_transition_to(next) {
            warn!("Unexpected session transition {} -> {}", self.phase, next);
        }
        self.phase = next;
    }

    /// Queues a pagination target unless it was seen before or the page
    /// limit is reached
    pub fn schedule_listing(
        &mut self,
        target: PaginationTarget,
    ) -> Result<ScheduleOutcome, UrlError> {
        let (key, listing) = match target {
            PaginationTarget::FetchUrl(url) => {
                (visit_key(url.as_str())?, ListingTarget::Fetch(url))
            }
            PaginationTarget::ClickTarget(press) => {
                (press.key.clone(), ListingTarget::Click(press))
            }
            PaginationTarget::ClickSequence(_) | PaginationTarget::ScrollNTimes(_) => {
                return Ok(ScheduleOutcome::NotSchedulable)
            }
        };

        if self.visited.contains(&key) {
            debug!("Already visited: {}", key);
            return Ok(ScheduleOutcome::AlreadyVisited);
        }

        if self.scheduled_pages >= self.max_pages {
            debug!("Page limit {} reached, not scheduling {}", self.max_pages, key);
            return Ok(ScheduleOutcome::PageLimit);
        }

        self.visited.insert(key);
        self.scheduled_pages += 1;
        self.queue.push_back(PageRequest::Listing(listing));
        Ok(ScheduleOutcome::Scheduled)
    }

    /// Queues a profile page; profiles share the visited set but not the page limit
    ///
    /// A link to a profile that is already queued is `AlreadyVisited`. A link
    /// that resolves to a listing page is `ListingPage`, and the caller keeps
    /// the card's own fields.
    pub fn schedule_profile(
        &mut self,
        url: Url,
        context: ProfileContext,
    ) -> Result<ScheduleOutcome, UrlError> {
        let key = visit_key(url.as_str())?;
        if self.profiles.contains(&key) {
            return Ok(ScheduleOutcome::AlreadyVisited);
        }
        if self.visited.contains(&key) {
            return Ok(ScheduleOutcome::ListingPage);
        }
        self.visited.insert(key.clone());
        self.profiles.insert(key);
        self.queue.push_back(PageRequest::Profile { url, context });
        Ok(ScheduleOutcome::Scheduled)
    }

    pub fn next_request(&mut self) -> Option<PageRequest> {
        self.queue.pop_front()
    }

    /// Counts a dequeued listing page; false when it must be abandoned
    pub fn begin_listing(&mut self) -> bool {
        if self.page_counter >= self.max_pages {
            return false;
        }
        self.page_counter += 1;
        true
    }
}
