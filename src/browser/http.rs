//! Static HTTP engine
//!
//! Fetches markup with `reqwest` and never runs scripts. Anything that needs a
//! live page (clicks, scrolling, foregrounding, cookie snapshots) reports
//! `BrowserError::Unsupported`.

use super::{Browser, BrowserPage, Loaded, NavigationOptions};
use crate::config::WaitState;
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;

/// Browser engine backed by a plain HTTP client
pub struct HttpBrowser {
    client: Client,
    user_agent: String,
}

impl HttpBrowser {
    /// Builds the engine with the given user agent string
    ///
    /// # Example
    ///
    /// ```
    /// use team_scraper::browser::HttpBrowser;
    ///
    /// let browser = HttpBrowser::new("Mozilla/5.0 (compatible; TeamScraper)").unwrap();
    /// ```
    pub fn new(user_agent: &str) -> BrowserResult<Self> {
        let client = build_http_client(user_agent)?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

/// Builds an HTTP client that looks like a regular desktop browser
pub fn build_http_client(user_agent: &str) -> BrowserResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))
}

#[async_trait]
impl Browser for HttpBrowser {
    type Page = HttpPage;

    async fn open(
        &mut self,
        url: &str,
        options: &NavigationOptions,
    ) -> BrowserResult<Loaded<HttpPage>> {
        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(url, options, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, options, e))?;

        tracing::debug!("HTTP {} for {} ({} bytes)", status, url, body.len());

        Ok(Loaded {
            page: HttpPage::new(url, body),
            status: Some(status),
            timed_out: false,
        })
    }

    fn is_interactive(&self) -> bool {
        false
    }

    async fn reset_context(&mut self) -> BrowserResult<()> {
        self.client = build_http_client(&self.user_agent)?;
        Ok(())
    }

    async fn shutdown(&mut self) -> BrowserResult<()> {
        Ok(())
    }
}

fn classify_request_error(
    url: &str,
    options: &NavigationOptions,
    error: reqwest::Error,
) -> BrowserError {
    if error.is_timeout() {
        BrowserError::Timeout {
            url: url.to_string(),
            timeout_ms: options.timeout.as_millis() as u64,
        }
    } else if error.is_connect() {
        BrowserError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        BrowserError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// A fetched document
#[derive(Debug, Clone)]
pub struct HttpPage {
    url: String,
    body: String,
    title: String,
}

impl HttpPage {
    pub fn new(url: &str, body: String) -> Self {
        let title = extract_title(&body);
        Self {
            url: url.to_string(),
            body,
            title,
        }
    }

    fn matches(&self, selector: &str) -> BrowserResult<bool> {
        let selector = Selector::parse(selector)
            .map_err(|e| BrowserError::operation("query", format!("{:?}", e)))?;
        let document = Html::parse_document(&self.body);
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }
}

fn extract_title(body: &str) -> String {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl BrowserPage for HttpPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn title(&self) -> BrowserResult<String> {
        Ok(self.title.clone())
    }

    async fn content(&self) -> BrowserResult<String> {
        Ok(self.body.clone())
    }

    // Static markup has no layout, so presence stands in for visibility
    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        self.matches(selector)
    }

    async fn click(&self, _selector: &str) -> BrowserResult<bool> {
        Err(BrowserError::Unsupported("click"))
    }

    async fn click_matching_text(&self, _selector: &str, _text: &str) -> BrowserResult<bool> {
        Err(BrowserError::Unsupported("click"))
    }

    async fn wait_for_visible(&self, selector: &str, _timeout: Duration) -> BrowserResult<bool> {
        self.matches(selector)
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        Err(BrowserError::Unsupported("scroll"))
    }

    async fn wait_for_ready(&self, _state: WaitState, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn bring_to_front(&self) -> BrowserResult<()> {
        Err(BrowserError::Unsupported("bring_to_front"))
    }

    async fn save_auth_snapshot(&self, _path: &Path) -> BrowserResult<()> {
        Err(BrowserError::Unsupported("save_auth_snapshot"))
    }

    async fn close(self) -> BrowserResult<()> {
        Ok(())
    }
}
