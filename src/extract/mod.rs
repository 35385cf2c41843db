//! Extraction engine
//!
//! Turns rendered markup into person data. Selectors are compiled once per
//! session; every function here is synchronous and works on a freshly parsed
//! document, so no parsed tree ever lives across an await point.
//!
//! Missing fields are never errors: a card without a name becomes `"Unknown"`,
//! a missing email or position becomes an empty string.

mod email;
mod fields;

pub use email::{decode_mailto, extract_email, find_email};
pub use fields::{element_text, extract_name, extract_position, UNKNOWN_NAME};

use crate::config::Config;
use crate::url::resolve_link;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// One person, as handed to the output sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    /// Empty when no address was found
    pub email: String,
    /// Empty when no position was found
    pub position: String,
    /// Start URL of the crawl
    pub source_url: String,
    /// Page the person was found on
    pub page_url: String,
}

/// Fields pulled out of one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardData {
    pub name: String,
    pub position: String,
    pub email: String,
    /// Set when the card links to a profile page that should be visited
    pub profile_url: Option<Url>,
}

impl CardData {
    pub fn into_record(self, source_url: &str, page_url: &str) -> PersonRecord {
        PersonRecord {
            name: self.name,
            email: self.email,
            position: self.position,
            source_url: source_url.to_string(),
            page_url: page_url.to_string(),
        }
    }
}

/// Where a card's profile link lives
#[derive(Debug, Clone)]
enum ProfileLink {
    /// The card element carries the `href` itself
    Card,
    Child(Selector),
}

/// Compiled selectors for one session
#[derive(Debug, Clone)]
pub struct Extractor {
    container: Selector,
    name: Selector,
    name_parts: Option<Vec<Selector>>,
    email: Selector,
    position: Vec<Selector>,
    profile_link: Option<ProfileLink>,
    profile_email: Selector,
}

impl Extractor {
    /// Compiles every selector the configuration names
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let s = &config.selectors;

        let name_parts = config
            .name_parts()
            .map(|parts| parts.iter().map(|p| compile(p)).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        let position = s
            .position
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?;

        let profile_link = match s.profile_link.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(link) if link.eq_ignore_ascii_case("self") => Some(ProfileLink::Card),
            Some(link) => Some(ProfileLink::Child(compile(link)?)),
        };

        let email = compile(&s.email)?;
        let profile_email = match &s.profile_email {
            Some(selector) => compile(selector)?,
            None => email.clone(),
        };

        Ok(Self {
            container: compile(&config.container_selector())?,
            name: compile(&s.name)?,
            name_parts,
            email,
            position,
            profile_link,
            profile_email,
        })
    }

    /// True when cards are followed to a profile page for their email
    pub fn follows_profiles(&self) -> bool {
        self.profile_link.is_some()
    }

    /// Extracts every card on a page
    ///
    /// With a profile link configured, a card whose link resolves also gets a
    /// `profile_url`. The email is always the one found on the card itself.
    pub fn extract_cards(&self, html: &str, page_url: &Url) -> Vec<CardData> {
        let document = Html::parse_document(html);
        document
            .select(&self.container)
            .map(|card| self.extract_card(card, page_url))
            .collect()
    }

    fn extract_card(&self, card: ElementRef<'_>, page_url: &Url) -> CardData {
        let name = extract_name(card, self.name_parts.as_deref(), &self.name);
        let position = extract_position(card, &self.position);

        let profile_url = self.profile_link.as_ref().and_then(|link| {
            let href = match link {
                ProfileLink::Card => card.value().attr("href"),
                ProfileLink::Child(selector) => card
                    .select(selector)
                    .find_map(|el| el.value().attr("href")),
            }?;
            resolve_link(href, page_url)
        });

        CardData {
            name,
            position,
            email: extract_email(card, &self.email),
            profile_url,
        }
    }

    /// Extracts the email from a profile page
    pub fn extract_profile_email(&self, html: &str) -> ProfileEmail {
        let document = Html::parse_document(html);
        let root = document.root_element();
        ProfileEmail {
            email: extract_email(root, &self.profile_email),
            selector_present: root.select(&self.profile_email).next().is_some(),
        }
    }
}

/// Outcome of a profile-page email lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEmail {
    pub email: String,
    /// Whether the email selector matched anything at all
    pub selector_present: bool,
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config(extra: &str) -> Config {
        parse_config(&format!(
            "[target]\nurl = \"https://example.com/team\"\ncontainer = \".member\"\n{}",
            extra
        ))
        .unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://example.com/team").unwrap()
    }

    const LISTING: &str = r#"
        <div class="member">
            <h3>Jane Doe</h3><span class="title">CEO</span>
            <a href="mailto:jane@x.com">Email</a>
            <a class="more" href="/people/jane">Profile</a>
        </div>
        <div class="member">
            <h3>John Roe</h3>
            <p>john@x.com</p>
        </div>
        <a class="member" href="/people/ann"><h3>Ann Poe</h3></a>
    "#;

    #[test]
    fn test_cards_extracted_in_document_order() {
        let extractor = Extractor::new(&config("")).unwrap();
        let cards = extractor.extract_cards(LISTING, &page_url());

        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].name, "Jane Doe");
        assert_eq!(cards[0].position, "CEO");
        assert_eq!(cards[0].email, "jane@x.com");
        assert_eq!(cards[1].name, "John Roe");
        assert_eq!(cards[1].position, "");
        assert_eq!(cards[1].email, "john@x.com");
        assert!(cards.iter().all(|c| c.profile_url.is_none()));
    }

    #[test]
    fn test_profile_link_child_selector() {
        let extractor =
            Extractor::new(&config("[selectors]\nprofile-link = \"a.more\"\n")).unwrap();
        assert!(extractor.follows_profiles());

        let cards = extractor.extract_cards(LISTING, &page_url());
        assert_eq!(
            cards[0].profile_url.as_ref().map(Url::as_str),
            Some("https://example.com/people/jane")
        );
        assert_eq!(cards[0].email, "jane@x.com");
        // No link on the second card
        assert!(cards[1].profile_url.is_none());
        assert_eq!(cards[1].email, "john@x.com");
    }

    #[test]
    fn test_profile_link_self() {
        let extractor = Extractor::new(&config("[selectors]\nprofile-link = \"self\"\n")).unwrap();
        let cards = extractor.extract_cards(LISTING, &page_url());
        assert_eq!(
            cards[2].profile_url.as_ref().map(Url::as_str),
            Some("https://example.com/people/ann")
        );
        assert!(cards[0].profile_url.is_none());
    }

    #[test]
    fn test_no_cards() {
        let extractor = Extractor::new(&config("")).unwrap();
        assert!(extractor
            .extract_cards("<html><body><p>Nothing</p></body></html>", &page_url())
            .is_empty());
    }

    #[test]
    fn test_profile_email_selector() {
        let extractor = Extractor::new(&config(
            "[selectors]\nprofile-link = \"self\"\nprofile-email = \".contact\"\n",
        ))
        .unwrap();

        let found = extractor
            .extract_profile_email(r#"<p>x@site.com</p><div class="contact">jane@x.com</div>"#);
        assert_eq!(found.email, "jane@x.com");
        assert!(found.selector_present);

        let missing = extractor.extract_profile_email("<p>No contact</p>");
        assert_eq!(missing.email, "");
        assert!(!missing.selector_present);
    }

    #[test]
    fn test_record_carries_urls() {
        let card = CardData {
            name: "Jane".to_string(),
            position: String::new(),
            email: String::new(),
            profile_url: None,
        };
        let record =
            card.into_record("https://example.com/team", "https://example.com/team?letter=J");
        assert_eq!(record.source_url, "https://example.com/team");
        assert_eq!(record.page_url, "https://example.com/team?letter=J");
        assert_eq!(record.email, "");
    }
}
