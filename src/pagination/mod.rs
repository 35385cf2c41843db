//! Pagination strategy engine
//!
//! Exactly one pagination idiom is active per session. The idioms do not share
//! a common shape (some produce URLs, some produce clicks on the same page,
//! some only reshape the current page), so [`PaginationMode`] is a closed enum
//! and every consumer matches on it exhaustively.
//!
//! - `LinkFollow`: resolve anchors and fetch them
//! - `QueryParam`: turn attribute or text values into `start?param=value` URLs
//! - `ButtonClick`: reopen the start page and click the button for each value
//! - `ClickSequence`: click "load more" style steps on the current page
//! - `InfiniteScroll`: scroll the current page a fixed number of times

mod actions;

pub use actions::{
    press_button, run_click_sequence, run_pre_clicks, run_scrolls, ActionTiming, SequenceReport,
};

use crate::config::{split_sequence, Config, PaginationKind};
use crate::url::{click_target_key, resolve_link, with_query_param};
use crate::ConfigError;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// The configured pagination idiom, compiled
#[derive(Debug, Clone)]
pub enum PaginationMode {
    LinkFollow {
        selector: Selector,
    },
    QueryParam {
        selector: Selector,
        param_name: String,
        data_attr: String,
        base_url: String,
    },
    ButtonClick {
        selector: Selector,
        raw_selector: String,
        data_attr: String,
        post_clicks: Vec<String>,
        page_url: String,
    },
    ClickSequence {
        steps: Vec<String>,
    },
    InfiniteScroll {
        count: u32,
    },
}

/// One unit of further work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationTarget {
    /// Open a new page at this URL
    FetchUrl(Url),
    /// Reopen a page and press a button on it
    ClickTarget(ButtonPress),
    /// Click these steps repeatedly on the current page
    ClickSequence(Vec<String>),
    /// Scroll the current page to the bottom this many times
    ScrollNTimes(u32),
}

/// How to find the button for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonLocator {
    Css(String),
    Text { selector: String, text: String },
}

/// A button-driven page: reopen `page_url`, click `button`, then `post_clicks`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    /// Visited-set key, distinct per value
    pub key: String,
    pub value: String,
    pub page_url: String,
    pub button: ButtonLocator,
    pub post_clicks: Vec<String>,
}

impl PaginationMode {
    /// Builds the session's pagination mode, or `None` when pagination is off
    pub fn from_config(config: &Config) -> Result<Option<Self>, ConfigError> {
        let p = &config.pagination;

        if p.infinite_scroll {
            return Ok(Some(Self::InfiniteScroll {
                count: p.scroll_count,
            }));
        }

        let (Some(kind), Some(raw)) = (p.mode, p.selector.as_deref()) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let mode = match kind {
            PaginationKind::Link => Self::LinkFollow {
                selector: compile(raw)?,
            },
            PaginationKind::Param => Self::QueryParam {
                selector: compile(raw)?,
                param_name: p.param_name.clone(),
                data_attr: p.data_attr.clone(),
                base_url: config.target.url.clone(),
            },
            PaginationKind::Button => Self::ButtonClick {
                selector: compile(raw)?,
                raw_selector: raw.to_string(),
                data_attr: p.data_attr.clone(),
                post_clicks: config.post_pagination_clicks(),
                page_url: config.target.url.clone(),
            },
            PaginationKind::Click => Self::ClickSequence {
                steps: split_sequence(raw),
            },
        };
        Ok(Some(mode))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LinkFollow { .. } => "link",
            Self::QueryParam { .. } => "param",
            Self::ButtonClick { .. } => "button",
            Self::ClickSequence { .. } => "click",
            Self::InfiniteScroll { .. } => "infinite_scroll",
        }
    }

    /// True when the mode discovers further pages from page content
    pub fn schedules_pages(&self) -> bool {
        match self {
            Self::LinkFollow { .. } | Self::QueryParam { .. } | Self::ButtonClick { .. } => true,
            Self::ClickSequence { .. } | Self::InfiniteScroll { .. } => false,
        }
    }

    /// Action to run on the current page before extraction, if any
    pub fn on_page_action(&self) -> Option<PaginationTarget> {
        match self {
            Self::ClickSequence { steps } => Some(PaginationTarget::ClickSequence(steps.clone())),
            Self::InfiniteScroll { count } => Some(PaginationTarget::ScrollNTimes(*count)),
            Self::LinkFollow { .. } | Self::QueryParam { .. } | Self::ButtonClick { .. } => None,
        }
    }

    /// Targets discovered in a page's markup, in document order
    ///
    /// Duplicates are returned as found; the crawl session filters them
    /// against its visited set.
    pub fn discover(&self, html: &str, page_url: &Url) -> Vec<PaginationTarget> {
        match self {
            Self::LinkFollow { selector } => {
                let document = Html::parse_document(html);
                let matched: Vec<_> = document.select(selector).collect();
                let links: Vec<PaginationTarget> = matched
                    .iter()
                    .filter_map(|el| el.value().attr("href"))
                    .filter_map(|href| resolve_link(href, page_url))
                    .map(PaginationTarget::FetchUrl)
                    .collect();

                if links.is_empty() {
                    if matched.is_empty() {
                        warn!("No pagination links matched on {}", page_url);
                    } else {
                        warn!(
                            "{} pagination elements matched on {} but none carries an href",
                            matched.len(),
                            page_url
                        );
                    }
                }
                links
            }
            Self::QueryParam {
                selector,
                param_name,
                data_attr,
                base_url,
            } => {
                let values = collect_values(html, selector, data_attr);
                if values.is_empty() {
                    warn!("No pagination values found on {}", page_url);
                }
                values
                    .iter()
                    .filter_map(|value| match with_query_param(base_url, param_name, value) {
                        Ok(url) => Some(PaginationTarget::FetchUrl(url)),
                        Err(e) => {
                            debug!("Skipping pagination value {:?}: {}", value, e);
                            None
                        }
                    })
                    .collect()
            }
            Self::ButtonClick {
                selector,
                raw_selector,
                data_attr,
                post_clicks,
                page_url: start,
            } => {
                let document = Html::parse_document(html);
                let values = collect_values(html, selector, data_attr);
                if values.is_empty() {
                    warn!("No pagination buttons found on {}", page_url);
                }
                values
                    .into_iter()
                    .filter_map(|value| {
                        let key = click_target_key(start, &value).ok()?;
                        let attr_selector = attribute_locator(raw_selector, data_attr, &value);
                        let by_attr = Selector::parse(&attr_selector)
                            .map(|s| document.select(&s).next().is_some())
                            .unwrap_or(false);
                        let button = if by_attr {
                            ButtonLocator::Css(attr_selector)
                        } else {
                            ButtonLocator::Text {
                                selector: raw_selector.clone(),
                                text: value.clone(),
                            }
                        };
                        Some(PaginationTarget::ClickTarget(ButtonPress {
                            key,
                            value,
                            page_url: start.clone(),
                            button,
                            post_clicks: post_clicks.clone(),
                        }))
                    })
                    .collect()
            }
            Self::ClickSequence { .. } | Self::InfiniteScroll { .. } => Vec::new(),
        }
    }
}

/// Narrows every member of a selector group to elements whose `data_attr`
/// equals `value`
fn attribute_locator(raw_selector: &str, data_attr: &str, value: &str) -> String {
    let filter = format!("[{}=\"{}\"]", data_attr, value.replace('"', "\\\""));
    split_selector_group(raw_selector)
        .into_iter()
        .map(|part| format!("{}{}", part, filter))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a selector group on its top-level commas
fn split_selector_group(group: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in group.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(group[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(group[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Values carried by pagination elements
///
/// Uses the data attribute when any match carries it, otherwise the elements'
/// text. Values are trimmed and blanks dropped.
fn collect_values(html: &str, selector: &Selector, data_attr: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let from_attr: Vec<String> = document
        .select(selector)
        .filter_map(|el| el.value().attr(data_attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if !from_attr.is_empty() {
        return from_attr;
    }

    document
        .select(selector)
        .map(crate::extract::element_text)
        .filter(|v| !v.is_empty())
        .collect()
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}
