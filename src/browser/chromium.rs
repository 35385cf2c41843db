//! Chromium engine driven over the DevTools protocol

use super::{
    load_auth_snapshot, write_auth_snapshot, Browser, BrowserPage, Loaded, NavigationOptions,
    StoredCookie,
};
use crate::config::{Config, WaitState};
use crate::{BrowserError, BrowserResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    Bounds, GetWindowForTargetParams, SetWindowBoundsParams, WindowState,
};
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser as CdpBrowser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launch arguments that hide the usual automation fingerprints
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-dev-shm-usage",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

/// Visible windows start here so the crawl does not steal the screen
const OFFSCREEN_POSITION: &str = "--window-position=-32000,-32000";

/// Injected into every new document before site scripts run
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
"#;

/// Extra settle time used to approximate "network idle"
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

const POLL_STEP: Duration = Duration::from_millis(100);

/// Launch options for [`ChromiumBrowser`]
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub user_agent: String,
    /// Cookie snapshot restored into every new page when present
    pub storage_state_path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

impl ChromiumOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.browser.headless,
            user_agent: config.browser.user_agent.clone(),
            storage_state_path: config.browser.storage_state_path.as_ref().map(PathBuf::from),
            window_size: (1920, 1080),
        }
    }
}

/// A running Chromium instance
pub struct ChromiumBrowser {
    browser: CdpBrowser,
    handler: JoinHandle<()>,
    options: ChromiumOptions,
}

impl ChromiumBrowser {
    /// Launches Chromium with the given options
    pub async fn launch(options: ChromiumOptions) -> BrowserResult<Self> {
        let (browser, handler) = launch_browser(&options).await?;
        info!(
            "Browser launched (headless: {}, snapshot: {:?})",
            options.headless, options.storage_state_path
        );
        Ok(Self {
            browser,
            handler,
            options,
        })
    }

    async fn restore_snapshot(&self, page: &Page) {
        let Some(path) = &self.options.storage_state_path else {
            return;
        };

        let cookies = match load_auth_snapshot(path) {
            Ok(cookies) if cookies.is_empty() => return,
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Ignoring unreadable auth snapshot {}: {}", path.display(), e);
                return;
            }
        };

        let count = cookies.len();
        let params: Vec<CookieParam> = cookies.into_iter().map(to_cookie_param).collect();
        match page.set_cookies(params).await {
            Ok(_) => debug!("Restored {} cookies from {}", count, path.display()),
            Err(e) => warn!("Failed to restore auth snapshot: {}", e),
        }
    }
}

async fn launch_browser(options: &ChromiumOptions) -> BrowserResult<(CdpBrowser, JoinHandle<()>)> {
    let mut builder = BrowserConfig::builder()
        .window_size(options.window_size.0, options.window_size.1)
        .arg(format!("--user-agent={}", options.user_agent));

    if !options.headless {
        builder = builder.with_head().arg(OFFSCREEN_POSITION);
    }

    for arg in STEALTH_ARGS {
        builder = builder.arg(*arg);
    }

    let config = builder.build().map_err(BrowserError::Launch)?;

    let (browser, mut handler) = CdpBrowser::launch(config)
        .await
        .map_err(|e| BrowserError::Launch(format!("Failed to launch browser: {}", e)))?;

    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("Browser event error: {:?}", e);
            }
        }
    });

    Ok((browser, handle))
}

#[async_trait]
impl Browser for ChromiumBrowser {
    type Page = ChromiumPage;

    async fn open(
        &mut self,
        url: &str,
        options: &NavigationOptions,
    ) -> BrowserResult<Loaded<ChromiumPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| classify_cdp_error("new_page", e))?;

        if let Err(e) = page.evaluate_on_new_document(STEALTH_SCRIPT).await {
            debug!("Stealth script not installed: {}", e);
        }
        self.restore_snapshot(&page).await;

        let page = ChromiumPage {
            page,
            url: url.to_string(),
        };

        let started = Instant::now();
        let navigation = tokio::time::timeout(options.timeout, page.page.goto(url))
            .await
            .map(|result| result.map(|_| ()));

        let timed_out = match navigation {
            Ok(Ok(())) => {
                let remaining = options.timeout.saturating_sub(started.elapsed());
                page.wait_for_ready(options.wait_state, remaining).await.is_err()
            }
            Ok(Err(e)) => {
                let error = classify_cdp_error("goto", e);
                let _ = page.close().await;
                return Err(match error {
                    BrowserError::Operation { message, .. } => BrowserError::Navigation {
                        url: url.to_string(),
                        message,
                    },
                    other => other,
                });
            }
            Err(_) => true,
        };

        let status = page.navigation_status().await;
        Ok(Loaded {
            page,
            status,
            timed_out,
        })
    }

    fn is_interactive(&self) -> bool {
        !self.options.headless
    }

    async fn reset_context(&mut self) -> BrowserResult<()> {
        warn!("Relaunching browser after a lost context");
        let _ = self.browser.close().await;
        self.handler.abort();

        let (browser, handler) = launch_browser(&self.options).await?;
        self.browser = browser;
        self.handler = handler;
        Ok(())
    }

    async fn shutdown(&mut self) -> BrowserResult<()> {
        let _ = self.browser.close().await;
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

/// A Chromium tab
pub struct ChromiumPage {
    page: Page,
    url: String,
}

impl ChromiumPage {
    async fn eval<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        js: String,
    ) -> BrowserResult<T> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| classify_cdp_error(operation, e))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::operation(operation, e))
    }

    /// Main-document status from the Performance API
    async fn navigation_status(&self) -> Option<u16> {
        let js = "(() => { const e = performance.getEntriesByType('navigation')[0]; \
                  return e && e.responseStatus ? e.responseStatus : null; })()";
        self.eval::<Option<u16>>("navigation_status", js.to_string())
            .await
            .ok()
            .flatten()
    }

    async fn ready_state_reached(&self, state: WaitState) -> BrowserResult<bool> {
        let js = match state {
            WaitState::DomContentLoaded => "document.readyState !== 'loading'",
            WaitState::Load | WaitState::NetworkIdle => "document.readyState === 'complete'",
        };
        self.eval::<bool>("wait_for_ready", js.to_string()).await
    }

    async fn move_on_screen(&self) -> BrowserResult<()> {
        let window = self
            .page
            .execute(GetWindowForTargetParams::default())
            .await
            .map_err(|e| classify_cdp_error("bring_to_front", e))?;

        let bounds = Bounds {
            left: Some(80),
            top: Some(80),
            window_state: Some(WindowState::Normal),
            ..Default::default()
        };
        self.page
            .execute(SetWindowBoundsParams::new(window.result.window_id.clone(), bounds))
            .await
            .map_err(|e| classify_cdp_error("bring_to_front", e))?;
        Ok(())
    }
}

/// Quotes a selector or text as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn title(&self) -> BrowserResult<String> {
        let title = self
            .page
            .get_title()
            .await
            .map_err(|e| classify_cdp_error("title", e))?;
        Ok(title.unwrap_or_default())
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| classify_cdp_error("content", e))
    }

    async fn is_visible(&self, selector: &str) -> BrowserResult<bool> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none'
                    && style.visibility !== 'hidden'
                    && (rect.width > 0 || rect.height > 0);
            }})()"#,
            sel = js_string(selector)
        );
        self.eval("is_visible", js).await
    }

    async fn click(&self, selector: &str) -> BrowserResult<bool> {
        let element = match self.page.find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element
            .click()
            .await
            .map_err(|e| classify_cdp_error("click", e))?;
        Ok(true)
    }

    async fn click_matching_text(&self, selector: &str, text: &str) -> BrowserResult<bool> {
        let js = format!(
            r#"(() => {{
                const wanted = {text};
                const el = Array.from(document.querySelectorAll({sel}))
                    .find(e => (e.textContent || '').trim() === wanted);
                if (!el) return false;
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return true;
            }})()"#,
            sel = js_string(selector),
            text = js_string(text)
        );
        self.eval("click", js).await
    }

    async fn wait_for_visible(&self, selector: &str, timeout: Duration) -> BrowserResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(selector).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_STEP).await;
        }
    }

    async fn scroll_to_bottom(&self) -> BrowserResult<()> {
        self.eval::<serde_json::Value>(
            "scroll",
            "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()"
                .to_string(),
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_ready(&self, state: WaitState, timeout: Duration) -> BrowserResult<()> {
        let deadline = Instant::now() + timeout;
        while !self.ready_state_reached(state).await? {
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    url: self.url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_STEP).await;
        }

        if state == WaitState::NetworkIdle {
            tokio::time::sleep(NETWORK_IDLE_GRACE).await;
        }
        Ok(())
    }

    async fn bring_to_front(&self) -> BrowserResult<()> {
        if let Err(e) = self.move_on_screen().await {
            debug!("Could not reposition window: {}", e);
        }
        self.page
            .bring_to_front()
            .await
            .map_err(|e| classify_cdp_error("bring_to_front", e))?;
        Ok(())
    }

    async fn save_auth_snapshot(&self, path: &Path) -> BrowserResult<()> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| classify_cdp_error("save_auth_snapshot", e))?;
        let stored: Vec<StoredCookie> = cookies.into_iter().map(from_cookie).collect();
        write_auth_snapshot(path, &stored)?;
        info!("Saved {} cookies to {}", stored.len(), path.display());
        Ok(())
    }

    async fn close(self) -> BrowserResult<()> {
        self.page
            .close()
            .await
            .map_err(|e| classify_cdp_error("close", e))
    }
}

fn from_cookie(cookie: Cookie) -> StoredCookie {
    StoredCookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        secure: cookie.secure,
        http_only: cookie.http_only,
    }
}

fn to_cookie_param(cookie: StoredCookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name, cookie.value);
    param.domain = Some(cookie.domain);
    param.path = Some(cookie.path);
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    param
}

/// Maps a DevTools failure onto the crawl's error vocabulary
///
/// A dropped websocket or a closed target means the browser context is gone.
fn classify_cdp_error(operation: &str, error: CdpError) -> BrowserError {
    let message = error.to_string();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("closed")
        || lowered.contains("channel")
        || lowered.contains("websocket")
        || lowered.contains("not found for target")
    {
        BrowserError::ContextLost(format!("{}: {}", operation, message))
    } else {
        BrowserError::operation(operation, message)
    }
}
