use crate::config::types::{split_sequence, Config, EngineKind, PaginationKind};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Status codes that must never be retried automatically
const NON_RETRYABLE_CODES: &[u16] = &[403, 404];

/// Validates the entire configuration
///
/// Runs before any network activity, so a wrong selector or URL fails the
/// session at startup instead of after the browser has launched.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target(config)?;
    validate_selectors(config)?;
    validate_pagination(config)?;
    validate_limits(config)?;
    validate_browser(config)?;
    Ok(())
}

fn validate_target(config: &Config) -> Result<(), ConfigError> {
    if config.target.url.trim().is_empty() {
        return Err(ConfigError::Missing("target.url"));
    }

    let url = Url::parse(&config.target.url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", config.target.url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' must use http or https",
            config.target.url
        )));
    }

    if config.target.container.trim().is_empty() {
        return Err(ConfigError::Missing("target.container"));
    }

    validate_selector(&config.container_selector())
}

fn validate_selectors(config: &Config) -> Result<(), ConfigError> {
    let s = &config.selectors;

    validate_selector(&s.name)?;
    validate_selector(&s.email)?;

    for part in s.position.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        validate_selector(part)?;
    }

    for selector in [&s.first_name, &s.middle_name, &s.last_name, &s.profile_email]
        .into_iter()
        .flatten()
    {
        validate_selector(selector)?;
    }

    if let Some(link) = &s.profile_link {
        if !link.eq_ignore_ascii_case("self") {
            validate_selector(link)?;
        }
    }

    if s.middle_name.is_some() && s.first_name.is_none() && s.last_name.is_none() {
        return Err(ConfigError::Validation(
            "middle-name requires first-name or last-name".to_string(),
        ));
    }

    for selector in config.pre_scrape_clicks() {
        validate_selector(&selector)?;
    }

    Ok(())
}

fn validate_pagination(config: &Config) -> Result<(), ConfigError> {
    let p = &config.pagination;

    if p.infinite_scroll && p.mode.is_some() {
        return Err(ConfigError::Validation(
            "infinite-scroll cannot be combined with a pagination mode".to_string(),
        ));
    }

    if p.infinite_scroll && p.scroll_count == 0 {
        return Err(ConfigError::Validation(
            "scroll-count must be >= 1 when infinite-scroll is enabled".to_string(),
        ));
    }

    let Some(mode) = p.mode else {
        return Ok(());
    };

    let selector = p
        .selector
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::Missing("pagination.selector"))?;

    match mode {
        PaginationKind::Click => {
            let steps = split_sequence(selector);
            if steps.is_empty() {
                return Err(ConfigError::Missing("pagination.selector"));
            }
            for step in &steps {
                validate_selector(step)?;
            }
        }
        PaginationKind::Link | PaginationKind::Param | PaginationKind::Button => {
            validate_selector(selector)?;
        }
    }

    if matches!(mode, PaginationKind::Param) && p.param_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "param-name cannot be empty".to_string(),
        ));
    }

    if matches!(mode, PaginationKind::Param | PaginationKind::Button)
        && p.data_attr.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "data-attr cannot be empty".to_string(),
        ));
    }

    for selector in config.post_pagination_clicks() {
        validate_selector(&selector)?;
    }

    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ConfigError> {
    let l = &config.limits;

    if l.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            l.max_pages
        )));
    }

    if l.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be greater than 0ms".to_string(),
        ));
    }

    for code in &l.retry_http_codes {
        if NON_RETRYABLE_CODES.contains(code) {
            return Err(ConfigError::Validation(format!(
                "HTTP {} is a persistent failure and cannot be listed in retry-http-codes",
                code
            )));
        }
        if !(400..600).contains(code) {
            return Err(ConfigError::Validation(format!(
                "retry-http-codes must be 4xx or 5xx status codes, got {}",
                code
            )));
        }
    }

    Ok(())
}

fn validate_browser(config: &Config) -> Result<(), ConfigError> {
    let b = &config.browser;

    if b.max_polls == 0 {
        return Err(ConfigError::Validation(
            "max-polls must be >= 1".to_string(),
        ));
    }

    if b.engine == EngineKind::Http {
        let needs_live_page = config.pagination.infinite_scroll
            || !config.pre_scrape_clicks().is_empty()
            || matches!(
                config.pagination.mode,
                Some(PaginationKind::Click | PaginationKind::Button)
            );

        if needs_live_page {
            return Err(ConfigError::Validation(
                "click, button, infinite-scroll and pre-scrape clicks require the chromium engine"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}
