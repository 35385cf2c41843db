//! URL handling module for Team Scraper
//!
//! This module provides URL normalization, link resolution, and the keys the
//! crawl session uses for its visited set.

mod normalize;

use crate::UrlError;
use url::Url;

pub use normalize::normalize_url;

/// Fragment prefix marking a synthetic click target
pub const CLICK_TARGET_FRAGMENT: &str = "page=";

/// Returns the visited-set key for a fetchable URL
pub fn visit_key(url_str: &str) -> Result<String, UrlError> {
    normalize_url(url_str).map(String::from)
}

/// Returns the visited-set key for an in-page click target
///
/// Button-driven pagination re-requests the same page and clicks a different
/// element each time, so the key is the normalized page URL qualified with a
/// `#page=<value>` fragment.
///
/// # Examples
///
/// ```
/// use team_scraper::url::click_target_key;
///
/// let key = click_target_key("https://example.com/team/", "B").unwrap();
/// assert_eq!(key, "https://example.com/team#page=B");
/// ```
pub fn click_target_key(page_url: &str, value: &str) -> Result<String, UrlError> {
    let mut url = normalize_url(page_url)?;
    let fragment = format!("{}{}", CLICK_TARGET_FRAGMENT, urlencoding::encode(value));
    url.set_fragment(Some(&fragment));
    Ok(url.into())
}

/// Builds `base?param=value` from the start URL, discarding its existing query
pub fn with_query_param(base: &str, param: &str, value: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(base).map_err(|e| UrlError::Parse(e.to_string()))?;
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair(param, value);
    Ok(url)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}
