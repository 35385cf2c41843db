use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Selector};

lazy_static! {
    // local@domain.tld with a tld of two or more letters
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email pattern");
}

const MAILTO_PREFIX: &str = "mailto:";

/// Extracts an email address from `scope`, or an empty string
///
/// Tiers, first hit wins:
/// 1. a `mailto:` href on an element matched by `selector`
/// 2. an address in the text under the elements matched by `selector`
/// 3. an address anywhere in the text of `scope`
pub fn extract_email(scope: ElementRef<'_>, selector: &Selector) -> String {
    let matches: Vec<ElementRef<'_>> = scope.select(selector).collect();

    let from_mailto = matches
        .iter()
        .filter_map(|el| el.value().attr("href"))
        .find_map(decode_mailto);
    if let Some(email) = from_mailto {
        return email;
    }

    let scoped_text = matches
        .iter()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(email) = find_email(&scoped_text) {
        return email;
    }

    let all_text = scope.text().collect::<Vec<_>>().join(" ");
    find_email(&all_text).unwrap_or_default()
}

/// Decodes the address of a `mailto:` href, dropping any `?subject=` part
///
/// # Examples
///
/// ```
/// use team_scraper::extract::decode_mailto;
///
/// assert_eq!(
///     decode_mailto("mailto:jane%40example.com?subject=Hi"),
///     Some("jane@example.com".to_string())
/// );
/// assert_eq!(decode_mailto("/contact"), None);
/// ```
pub fn decode_mailto(href: &str) -> Option<String> {
    let lowered = href.to_ascii_lowercase();
    let start = lowered.rfind(MAILTO_PREFIX)? + MAILTO_PREFIX.len();
    let address = href[start..].split('?').next().unwrap_or_default();
    let decoded = urlencoding::decode(address)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| address.to_string());
    let decoded = decoded.trim();

    if decoded.is_empty() {
        None
    } else {
        Some(decoded.to_string())
    }
}

/// Returns the first email-looking token in `text`
pub fn find_email(text: &str) -> Option<String> {
    EMAIL_REGEX.find(text).map(|m| m.as_str().to_string())
}
