//! Scripted in-memory browser for driving the coordinator

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use team_scraper::browser::{Browser, BrowserPage, Loaded, NavigationOptions};
use team_scraper::config::WaitState;
use team_scraper::{BrowserError, BrowserResult};

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Option<u16>,
    pub html: String,
    pub timed_out: bool,
    /// Navigation fails with this message instead of loading a page
    pub error: Option<String>,
    /// Markup shown once the title has been read this many times
    pub solved: Option<(usize, String)>,
}

impl Response {
    fn new(status: Option<u16>, html: impl Into<String>) -> Self {
        Self {
            status,
            html: html.into(),
            timed_out: false,
            error: None,
            solved: None,
        }
    }
}

pub fn ok(html: impl Into<String>) -> Response {
    Response::new(Some(200), html)
}

pub fn status(code: u16, html: impl Into<String>) -> Response {
    Response::new(Some(code), html)
}

/// Navigation timed out with `html` partially rendered
pub fn timed_out(html: impl Into<String>) -> Response {
    Response {
        timed_out: true,
        ..Response::new(None, html)
    }
}

pub fn navigation_error(message: &str) -> Response {
    Response {
        error: Some(message.to_string()),
        ..Response::new(None, "")
    }
}

/// A challenge page that a person solves after `reads` title reads
pub fn solved_after(
    reads: usize,
    challenge: impl Into<String>,
    solved: impl Into<String>,
) -> Response {
    Response {
        solved: Some((reads, solved.into())),
        ..Response::new(Some(200), challenge)
    }
}

#[derive(Default)]
struct SiteState {
    responses: Mutex<HashMap<String, VecDeque<Response>>>,
    clicks: Mutex<HashMap<String, String>>,
    scroll_html: Mutex<Option<String>>,
    scrolls: AtomicUsize,
    opened: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

/// Responses keyed by exact URL; shared between the test and the browser
#[derive(Clone, Default)]
pub struct Site {
    state: Arc<SiteState>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`; the last queued response repeats
    pub fn page(&self, url: &str, response: Response) -> &Self {
        self.state
            .responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Replaces the page markup when `selector` is clicked
    pub fn on_click(&self, selector: &str, html: impl Into<String>) -> &Self {
        self.state
            .clicks
            .lock()
            .unwrap()
            .insert(selector.to_string(), html.into());
        self
    }

    /// Replaces the page markup when the page is scrolled to the bottom
    pub fn on_scroll(&self, html: impl Into<String>) -> &Self {
        *self.state.scroll_html.lock().unwrap() = Some(html.into());
        self
    }

    pub fn scrolls(&self) -> usize {
        self.state.scrolls.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn browser(&self, interactive: bool) -> ScriptedBrowser {
        ScriptedBrowser {
            site: self.clone(),
            interactive,
        }
    }

    fn respond(&self, url: &str) -> Response {
        let mut responses = self.state.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => status(404, "<html><head><title>Not Found</title></head></html>"),
        }
    }
}

pub struct ScriptedBrowser {
    site: Site,
    interactive: bool,
}

#[async_trait]
impl Browser for ScriptedBrowser {
    type Page = ScriptedPage;

    async fn open(
        &mut self,
        url: &str,
        _options: &NavigationOptions,
    ) -> BrowserResult<Loaded<ScriptedPage>> {
        self.site.state.opened.lock().unwrap().push(url.to_string());
        let response = self.site.respond(url);
        if let Some(message) = response.error {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message,
            });
        }
        Ok(Loaded {
            page: ScriptedPage {
                url: url.to_string(),
                html: Mutex::new(response.html),
                title_reads: AtomicUsize::new(0),
                solved: response.solved,
                site: self.site.clone(),
            },
            status: response.status,
            timed_out: response.timed_out,
        })
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    async fn reset_context(&mut self) -> BrowserResult<()> {
        Ok(())
    }

    async fn shutdown(&mut self) -> BrowserResult<()> {
        Ok(())
    }
}

pub struct ScriptedPage {
    url: String,
    html: Mutex<String>,
    title_reads: AtomicUsize,
    solved: Option<(usize, String)>,
    site: Site,
}

impl ScriptedPage {
    fn html(&self) -> String {
        self.html.lock().unwrap().clone()
    }
}

fn matches(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

fn matches_text(html: &str, selector: &str, text: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html)
        .select(&selector)
        .any(|el| el.text().collect::<String>().trim() == text)
}

fn title_of(html: &str) -> String {
    let selector = Selector::parse("title").unwrap();
    Html::parse_document(html)
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn title(&self) -> BrowserResult<String> {
        let reads = self.title_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, html)) = &self.solved {
            if reads > *after {
                *self.html.lock().unwrap() = html.clone();
            }
        }
        Ok(title_of(&self.html()))
    }

    async fn content(&self) -> BrowserResult<String> {
        Ok(self.html())
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        Ok(matches(&self.html(), selector))
    }

    async fn click(&self, selector: &str) -> BrowserResult<bool> {
        if !matches(&self.html(), selector) {
            return Ok(false);
        }
        if let Some(next) = self.site.state.clicks.lock().unwrap().get(selector) {
            *self.html.lock().unwrap() = next.clone();
        }
        Ok(true)
    }

    async fn click_matching_text(&self, selector: &str, text: &str) -> BrowserResult<bool> {
        if !matches_text(&self.html(), selector, text) {
            return Ok(false);
        }
        let key = format!("{}::{}", selector, text);
        if let Some(next) = self.site.state.clicks.lock().unwrap().get(&key) {
            *self.html.lock().unwrap() = next.clone();
        }
        Ok(true)
    }

    async fn wait_for_visible(&self, selector: &str, _timeout: Duration) -> BrowserResult<bool> {
        self.is_visible(selector).await
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        self.site.state.scrolls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.site.state.scroll_html.lock().unwrap().clone() {
            *self.html.lock().unwrap() = next;
        }
        Ok(())
    }

    async fn wait_for_ready(&self, _state: WaitState, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn bring_to_front(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn save_auth_snapshot(&self, _path: &Path) -> BrowserResult<()> {
        Ok(())
    }

    async fn close(self) -> BrowserResult<()> {
        self.site.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
