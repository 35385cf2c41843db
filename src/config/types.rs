use serde::Deserialize;

/// Main configuration structure for Team Scraper
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to crawl and where the person cards are
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Start URL of the team/staff page
    pub url: String,

    /// CSS selector matching one card per person
    pub container: String,
}

/// Field selectors applied inside each card
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorConfig {
    #[serde(default = "default_name_selector")]
    pub name: String,

    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,

    #[serde(default = "default_email_selector")]
    pub email: String,

    /// Comma-separated priority list
    #[serde(default = "default_position_selector")]
    pub position: String,

    /// `self` when the card element itself carries the `href`
    pub profile_link: Option<String>,

    pub profile_email: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            name: default_name_selector(),
            first_name: None,
            middle_name: None,
            last_name: None,
            email: default_email_selector(),
            position: default_position_selector(),
            profile_link: None,
            profile_email: None,
        }
    }
}

/// Pagination mode names accepted in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    Link,
    Param,
    Button,
    #[serde(alias = "load_more")]
    Click,
}

/// Pagination configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationConfig {
    pub mode: Option<PaginationKind>,

    pub selector: Option<String>,

    #[serde(default = "default_param_name")]
    pub param_name: String,

    #[serde(default = "default_data_attr")]
    pub data_attr: String,

    /// `;;`-delimited clicks run after each pagination button
    pub post_clicks: Option<String>,

    #[serde(default)]
    pub infinite_scroll: bool,

    #[serde(default = "default_scroll_count")]
    pub scroll_count: u32,

    /// Seconds to settle after each scroll
    #[serde(default = "default_scroll_delay")]
    pub scroll_delay: u64,

    /// Milliseconds between intermediate steps of a click sequence
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            mode: None,
            selector: None,
            param_name: default_param_name(),
            data_attr: default_data_attr(),
            post_clicks: None,
            infinite_scroll: false,
            scroll_count: default_scroll_count(),
            scroll_delay: default_scroll_delay(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

/// On-page actions run before extraction
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionConfig {
    /// `;;`-delimited selectors clicked in order (cookie banners, reveal buttons)
    pub pre_scrape_clicks: Option<String>,

    /// Run the pre-scrape clicks on every page instead of only the first
    #[serde(default)]
    pub pre_scrape_all_pages: bool,
}

/// Page-ready condition awaited after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    /// All network activity settled
    NetworkIdle,
    /// Initial markup parsed
    DomContentLoaded,
    /// Base load event fired
    Load,
}

/// Limits and timing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LimitsConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Seconds to let each page settle before extraction
    #[serde(default = "default_page_delay")]
    pub page_delay: u64,

    /// Navigation timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_wait_state")]
    pub wait_state: WaitState,

    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    #[serde(default = "default_retry_http_codes")]
    pub retry_http_codes: Vec<u16>,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Seconds between consecutive page requests
    #[serde(default = "default_download_delay")]
    pub download_delay: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            page_delay: default_page_delay(),
            timeout: default_timeout(),
            wait_state: default_wait_state(),
            retry_times: default_retry_times(),
            retry_http_codes: default_retry_http_codes(),
            retry_backoff_ms: default_retry_backoff_ms(),
            download_delay: default_download_delay(),
        }
    }
}

/// Browser engines the CLI knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chromium,
    Http,
}

/// Browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    /// Visible browsers allow the human-in-the-loop challenge bypass
    #[serde(default)]
    pub headless: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Where the authentication snapshot is saved after a solved challenge
    #[serde(default = "default_storage_state_path")]
    pub storage_state_path: Option<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headless: false,
            user_agent: default_user_agent(),
            storage_state_path: default_storage_state_path(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

/// Output formats for the record sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
    Sqlite,
}

impl OutputFormat {
    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "jsonl",
            Self::Csv => "csv",
            Self::Sqlite => "db",
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    pub file: Option<String>,

    /// Directory for diagnostic page captures
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            file: None,
            diagnostics_dir: default_diagnostics_dir(),
        }
    }
}

pub const DEFAULT_STORAGE_STATE_PATH: &str = "auth.json";

/// Delimiter separating selectors in click-sequence strings
pub const SEQUENCE_DELIMITER: &str = ";;";

/// Splits a `;;`-delimited click sequence into trimmed, non-empty selectors
pub fn split_sequence(raw: &str) -> Vec<String> {
    raw.split(SEQUENCE_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Container selector with the legacy `;;` separator rewritten to a CSS group
    pub fn container_selector(&self) -> String {
        self.target.container.replace(SEQUENCE_DELIMITER, ",")
    }

    /// First/middle/last selectors in order, or `None` when split names are not configured
    pub fn name_parts(&self) -> Option<Vec<String>> {
        let s = &self.selectors;
        if s.first_name.is_none() && s.last_name.is_none() {
            return None;
        }
        Some(
            [&s.first_name, &s.middle_name, &s.last_name]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
        )
    }

    pub fn pre_scrape_clicks(&self) -> Vec<String> {
        self.actions
            .pre_scrape_clicks
            .as_deref()
            .map(split_sequence)
            .unwrap_or_default()
    }

    pub fn post_pagination_clicks(&self) -> Vec<String> {
        self.pagination
            .post_clicks
            .as_deref()
            .map(split_sequence)
            .unwrap_or_default()
    }

    /// True when a selector-driven pagination mechanism is configured
    pub fn has_pagination(&self) -> bool {
        self.pagination.mode.is_some()
            && self
                .pagination
                .selector
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }

    /// Output file with the extension forced to match the format
    ///
    /// Defaults to `output_<timestamp>` in the working directory.
    pub fn output_path(&self) -> std::path::PathBuf {
        let stem = match &self.output.file {
            Some(file) => std::path::Path::new(file).with_extension(""),
            None => std::path::PathBuf::from(format!(
                "output_{}",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            )),
        };
        stem.with_extension(self.output.format.extension())
    }
}

fn default_name_selector() -> String {
    "h3, .name, .employee-name".to_string()
}

fn default_email_selector() -> String {
    r#"a[href^="mailto:"], .email"#.to_string()
}

fn default_position_selector() -> String {
    ".position, .title, .job-title, .role".to_string()
}

fn default_param_name() -> String {
    "letter".to_string()
}

fn default_data_attr() -> String {
    "data-value".to_string()
}

fn default_scroll_count() -> u32 {
    5
}

fn default_scroll_delay() -> u64 {
    2
}

fn default_step_delay_ms() -> u64 {
    1000
}

fn default_max_pages() -> u32 {
    30
}

fn default_page_delay() -> u64 {
    5
}

fn default_timeout() -> u64 {
    60_000
}

fn default_wait_state() -> WaitState {
    WaitState::NetworkIdle
}

fn default_retry_times() -> u32 {
    4
}

fn default_retry_http_codes() -> Vec<u16> {
    vec![500, 502, 503, 504, 522, 524, 408, 429]
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_download_delay() -> u64 {
    3
}

fn default_engine() -> EngineKind {
    EngineKind::Chromium
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36".to_string()
}

fn default_storage_state_path() -> Option<String> {
    Some(DEFAULT_STORAGE_STATE_PATH.to_string())
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_polls() -> u32 {
    300
}

fn default_format() -> OutputFormat {
    OutputFormat::Json
}

fn default_diagnostics_dir() -> String {
    ".".to_string()
}
