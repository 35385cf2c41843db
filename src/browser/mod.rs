//! Browser automation boundary
//!
//! The crawl core only talks to a browser through the [`Browser`] and
//! [`BrowserPage`] traits, so any engine that can navigate, read markup, click,
//! scroll, foreground a page, and save an authentication snapshot is
//! substitutable. Two adapters ship with the crate:
//!
//! - [`ChromiumBrowser`]: a real Chromium instance driven over DevTools
//!   (feature `chromium`, on by default)
//! - [`HttpBrowser`]: plain HTTP fetches for sites that need no scripting

#[cfg(feature = "chromium")]
mod chromium;
mod http;

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumBrowser, ChromiumOptions, ChromiumPage};
pub use http::{HttpBrowser, HttpPage};

use crate::config::{Config, WaitState};
use crate::BrowserResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How a navigation should be carried out
#[derive(Debug, Clone, Copy)]
pub struct NavigationOptions {
    pub timeout: Duration,
    pub wait_state: WaitState,
}

impl NavigationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.limits.timeout),
            wait_state: config.limits.wait_state,
        }
    }
}

/// A page handle returned by [`Browser::open`]
///
/// `timed_out` is set when the navigation deadline passed before the page
/// settled; the handle still holds whatever was rendered by then.
#[derive(Debug)]
pub struct Loaded<P> {
    pub page: P,
    pub status: Option<u16>,
    pub timed_out: bool,
}

/// A scriptable browser engine
#[async_trait]
pub trait Browser: Send {
    type Page: BrowserPage;

    /// Opens a fresh page and navigates it to `url`
    ///
    /// The returned handle must be released with [`BrowserPage::close`].
    async fn open(
        &mut self,
        url: &str,
        options: &NavigationOptions,
    ) -> BrowserResult<Loaded<Self::Page>>;

    /// True when a person can see and operate the browser window
    fn is_interactive(&self) -> bool;

    /// Throws away the current automation context and starts a new one
    async fn reset_context(&mut self) -> BrowserResult<()>;

    /// Releases the engine
    async fn shutdown(&mut self) -> BrowserResult<()>;
}

/// One open page inside a [`Browser`]
#[async_trait]
pub trait BrowserPage: Send + Sync + Sized {
    /// The URL the page was opened with
    fn url(&self) -> &str;

    async fn title(&self) -> BrowserResult<String>;

    /// Current rendered markup
    async fn content(&self) -> BrowserResult<String>;

    /// True when `selector` matches an element that is rendered and not hidden
    async fn is_visible(&self, selector: &str) -> BrowserResult<bool>;

    /// Clicks the first element matching `selector`; false when there is none
    async fn click(&self, selector: &str) -> BrowserResult<bool>;

    /// Clicks the first element matching `selector` whose trimmed text equals `text`
    async fn click_matching_text(&self, selector: &str, text: &str) -> BrowserResult<bool>;

    /// Waits until `selector` is visible; false if the deadline passes first
    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> BrowserResult<bool>;

    async fn scroll_to_bottom(&self) -> BrowserResult<()>;

    /// Waits for the page-ready condition after an in-page action
    async fn wait_for_ready(&self, state: WaitState, timeout: Duration) -> BrowserResult<()>;

    async fn bring_to_front(&self) -> BrowserResult<()>;

    /// Persists the cookies of the page's context to `path`
    async fn save_auth_snapshot(&self, path: &Path) -> BrowserResult<()>;

    async fn close(self) -> BrowserResult<()>;
}

/// Cookie as stored in the authentication snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// Reads a saved snapshot; a missing file is an empty snapshot
pub fn load_auth_snapshot(path: &Path) -> BrowserResult<Vec<StoredCookie>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| crate::BrowserError::operation("load_auth_snapshot", e))
}

/// Writes a snapshot as pretty JSON, replacing any previous one
pub fn write_auth_snapshot(path: &Path, cookies: &[StoredCookie]) -> BrowserResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cookies)
        .map_err(|e| crate::BrowserError::operation("save_auth_snapshot", e))?;
    std::fs::write(path, json)?;
    Ok(())
}
