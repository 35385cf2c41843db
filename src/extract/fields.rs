use scraper::{ElementRef, Selector};

/// Name used when no tier yields any text
pub const UNKNOWN_NAME: &str = "Unknown";

/// Trimmed text of an element with internal whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first match of `selector` under `scope`, if non-empty
pub fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extracts a person's name from a card
///
/// Split first/middle/last selectors are joined with single spaces and win
/// when any of them matches. Otherwise the single name selector is used, and
/// as a last resort the first non-blank text node of the card.
pub fn extract_name(card: ElementRef<'_>, parts: Option<&[Selector]>, single: &Selector) -> String {
    if let Some(parts) = parts {
        let joined = parts
            .iter()
            .filter_map(|selector| first_text(card, selector))
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            return joined;
        }
    }

    if let Some(name) = first_text(card, single) {
        return name;
    }

    card.text()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

/// First non-empty text from a priority list of selectors
pub fn extract_position(card: ElementRef<'_>, priority: &[Selector]) -> String {
    priority
        .iter()
        .find_map(|selector| first_text(card, selector))
        .unwrap_or_default()
}
