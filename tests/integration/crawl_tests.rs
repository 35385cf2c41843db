//! Integration tests for the crawler
//!
//! These tests drive the coordinator through a scripted in-memory browser,
//! and use wiremock to run the HTTP engine against a mock server.

mod support;

use std::path::Path;
use std::time::Duration;
use support::{navigation_error, ok, solved_after, status, timed_out, Site};
use team_scraper::browser::HttpBrowser;
use team_scraper::config::{parse_config, Config};
use team_scraper::crawler::{Coordinator, CrawlReport, ProgressEvent, FAILED_PAGE_ARTIFACT};
use team_scraper::extract::PersonRecord;
use team_scraper::output::{MemorySink, RecordSink, SinkResult};
use team_scraper::pagination::ActionTiming;
use team_scraper::{ScraperError, SinkError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START: &str = "https://acme.test/team";

/// Builds a test configuration with zero delays
fn create_test_config(start: &str, max_pages: u32, extra: &str, diagnostics: &Path) -> Config {
    let mut config = parse_config(&format!(
        r#"
[target]
url = "{start}"
container = ".member"

[limits]
max-pages = {max_pages}
page-delay = 0
download-delay = 0
retry-times = 2
retry-backoff-ms = 0

[browser]
poll-interval-ms = 0
max-polls = 2

{extra}
"#
    ))
    .expect("valid test config");

    config.browser.storage_state_path = None;
    config.output.diagnostics_dir = diagnostics.display().to_string();
    config
}

fn card(name: &str, position: &str, email: Option<&str>) -> String {
    let email = email
        .map(|e| format!(r#"<a href="mailto:{e}">{e}</a>"#))
        .unwrap_or_default();
    format!(
        r#"<div class="member"><h3>{name}</h3><span class="position">{position}</span>{email}</div>"#
    )
}

fn page(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
}

async fn crawl(
    site: &Site,
    config: Config,
    interactive: bool,
) -> (Result<CrawlReport, ScraperError>, MemorySink) {
    let sink = MemorySink::new();
    let coordinator = Coordinator::new(config, site.browser(interactive), Box::new(sink.clone()))
        .unwrap()
        .with_timing(ActionTiming::immediate(), Duration::ZERO, Duration::ZERO);
    (coordinator.run().await, sink)
}

#[tokio::test]
async fn test_single_page_records() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            &format!(
                "{}{}",
                card("Jane Doe", "CEO", Some("jane@acme.test")),
                card("John Roe", "CTO", None)
            ),
        )),
    );

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;
    let report = result.unwrap();

    assert_eq!(report.pages_extracted, 1);
    assert_eq!(report.records_emitted, 2);
    assert_eq!(report.records_without_email, 1);
    assert_eq!(
        sink.records(),
        vec![
            PersonRecord {
                name: "Jane Doe".to_string(),
                email: "jane@acme.test".to_string(),
                position: "CEO".to_string(),
                source_url: START.to_string(),
                page_url: START.to_string(),
            },
            PersonRecord {
                name: "John Roe".to_string(),
                email: String::new(),
                position: "CTO".to_string(),
                source_url: START.to_string(),
                page_url: START.to_string(),
            },
        ]
    );
    assert_eq!(site.opened().len(), site.closed());
}

#[tokio::test]
async fn test_empty_first_page_without_pagination_is_fatal() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, ok(page("Team", "<p>Nothing here</p>")));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    match result {
        Err(ScraperError::EmptyFirstPage { selector, artifact }) => {
            assert_eq!(selector, ".member");
            let artifact = artifact.expect("artifact captured");
            assert_eq!(artifact, dir.path().join(FAILED_PAGE_ARTIFACT));
            assert!(std::fs::read_to_string(artifact)
                .unwrap()
                .contains("Nothing here"));
        }
        other => panic!("expected EmptyFirstPage, got {:?}", other),
    }
    assert!(sink.records().is_empty());
    assert_eq!(site.opened().len(), 1);
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_empty_first_page_tolerated_with_pagination() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page("Team", r#"<nav class="pager"><a href="/team?page=2">2</a></nav>"#)),
    );
    site.page(
        "https://acme.test/team?page=2",
        ok(page("Team", &card("Jane Doe", "CEO", None))),
    );

    let config = create_test_config(
        START,
        5,
        "[pagination]\nmode = \"link\"\nselector = \".pager a\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(report.pages_extracted, 2);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn test_forbidden_challenge_stops_session_when_non_interactive() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        status(
            403,
            page(
                "Just a moment...",
                r#"<a class="next" href="/team?page=2">next</a>"#,
            ),
        ),
    );
    site.page("https://acme.test/team?page=2", ok(page("Team", &card("Jane", "CEO", None))));

    let config = create_test_config(
        START,
        30,
        "[pagination]\nmode = \"link\"\nselector = \"a.next\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    assert!(matches!(
        result,
        Err(ScraperError::ProtectionBlocked { url }) if url == START
    ));
    assert!(sink.records().is_empty());
    assert_eq!(site.opened(), vec![START.to_string()]);
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_unsolved_challenge_abandons_page_when_interactive() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, ok(page("Just a moment...", "")));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), true).await;

    let report = result.unwrap();
    assert_eq!(report.pages_extracted, 0);
    assert_eq!(report.pages_skipped, 1);
    assert!(sink.records().is_empty());
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_page_ceiling_holds() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    for n in 1..=6 {
        let url = if n == 1 {
            START.to_string()
        } else {
            format!("{}?page={}", START, n)
        };
        let body = format!(
            r#"{}<a class="next" href="/team?page={}">next</a>"#,
            card(&format!("Person {}", n), "Staff", None),
            n + 1
        );
        site.page(&url, ok(page("Team", &body)));
    }

    let config = create_test_config(
        START,
        3,
        "[pagination]\nmode = \"link\"\nselector = \"a.next\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(report.pages_extracted, 3);
    assert_eq!(sink.records().len(), 3);
    assert_eq!(
        site.opened(),
        vec![
            START.to_string(),
            format!("{}?page=2", START),
            format!("{}?page=3", START),
        ]
    );
}

#[tokio::test]
async fn test_max_pages_one_extracts_only_start_page() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            &format!(
                r#"{}<a class="next" href="/team?page=2">next</a>"#,
                card("Jane", "CEO", None)
            ),
        )),
    );

    let config = create_test_config(
        START,
        1,
        "[pagination]\nmode = \"link\"\nselector = \"a.next\"\n",
        dir.path(),
    );
    let (result, _) = crawl(&site, config, false).await;

    assert_eq!(result.unwrap().pages_extracted, 1);
    assert_eq!(site.opened().len(), 1);
}

#[tokio::test]
async fn test_query_param_duplicates_suppressed() {
    let dir = TempDir::new().unwrap();
    let letters = r#"<div class="letters"><a data-value="A">A</a><a data-value="B">B</a><a data-value="A">A</a></div>"#;
    let site = Site::new();
    site.page(START, ok(page("Team", letters)));
    site.page(
        "https://acme.test/team?letter=A",
        ok(page("Team", &format!("{}{}", letters, card("Ann Able", "CEO", None)))),
    );
    site.page(
        "https://acme.test/team?letter=B",
        ok(page("Team", &format!("{}{}", letters, card("Bob Baker", "CFO", None)))),
    );

    let config = create_test_config(
        START,
        30,
        "[pagination]\nmode = \"param\"\nselector = \".letters a\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(
        site.opened(),
        vec![
            START.to_string(),
            "https://acme.test/team?letter=A".to_string(),
            "https://acme.test/team?letter=B".to_string(),
        ]
    );
    assert_eq!(report.pages_extracted, 3);
    let names: Vec<String> = sink.records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Ann Able", "Bob Baker"]);
}

#[tokio::test]
async fn test_button_pagination_clicks_each_value_once() {
    let dir = TempDir::new().unwrap();
    let buttons = r#"<div class="letters"><button data-value="A">A</button><button data-value="B">B</button></div>"#;
    let site = Site::new();
    site.page(START, ok(page("Team", buttons)));
    site.on_click(
        r#".letters button[data-value="A"]"#,
        page("Team", &format!("{}{}", buttons, card("Ann Able", "CEO", None))),
    );
    site.on_click(
        r#".letters button[data-value="B"]"#,
        page("Team", &format!("{}{}", buttons, card("Bob Baker", "CFO", None))),
    );

    let config = create_test_config(
        START,
        30,
        "[pagination]\nmode = \"button\"\nselector = \".letters button\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(site.opened().len(), 3);
    assert_eq!(site.closed(), 3);
    assert_eq!(report.pages_extracted, 3);
    let names: Vec<String> = sink.records().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Ann Able", "Bob Baker"]);
}

#[tokio::test]
async fn test_load_more_sequence_extracts_expanded_page() {
    let dir = TempDir::new().unwrap();
    let first = page(
        "Team",
        &format!(r#"{}<button class="more">More</button>"#, card("Ann", "CEO", None)),
    );
    let expanded = page(
        "Team",
        &format!("{}{}", card("Ann", "CEO", None), card("Bob", "CFO", None)),
    );
    let site = Site::new();
    site.page(START, ok(first));
    site.on_click("button.more", expanded);

    let config = create_test_config(
        START,
        30,
        "[pagination]\nmode = \"load_more\"\nselector = \"button.more\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    assert_eq!(result.unwrap().pages_extracted, 1);
    assert_eq!(sink.records().len(), 2);
    assert_eq!(site.opened().len(), 1);
}

#[tokio::test]
async fn test_profile_pages_supply_emails() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            r#"
            <div class="member"><h3>Jane Doe</h3><span class="position">CEO</span><a class="profile" href="/people/jane">Profile</a></div>
            <div class="member"><h3>John Roe</h3><span class="position">CTO</span><a class="profile" href="/people/john">Profile</a></div>
            <div class="member"><h3>Jane Doe</h3><span class="position">CEO</span><a class="profile" href="/people/jane/">Profile</a></div>
            "#,
        )),
    );
    site.page(
        "https://acme.test/people/jane",
        ok(page("Jane", r#"<a href="mailto:jane@acme.test">Email Jane</a>"#)),
    );
    // john's profile is missing: the record is still emitted without an email

    let config = create_test_config(
        START,
        5,
        "[selectors]\nprofile-link = \"a.profile\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(report.profiles_visited, 2);
    assert_eq!(report.pages_skipped, 1);

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Jane Doe");
    assert_eq!(records[0].email, "jane@acme.test");
    assert_eq!(records[0].position, "CEO");
    assert_eq!(records[0].page_url, "https://acme.test/people/jane");
    assert_eq!(records[1].name, "John Roe");
    assert_eq!(records[1].email, "");
    assert_eq!(site.opened().len(), 3);
    assert_eq!(site.closed(), 3);
}

#[tokio::test]
async fn test_transient_status_retried() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, status(503, page("Busy", "")))
        .page(START, status(503, page("Busy", "")))
        .page(START, ok(page("Team", &card("Jane", "CEO", None))));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    let report = result.unwrap();
    assert_eq!(report.retries, 2);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(site.opened().len(), 3);
    assert_eq!(site.closed(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_skip_page() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, status(503, page("Busy", "")));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    let report = result.unwrap();
    assert_eq!(report.retries, 2);
    assert_eq!(report.pages_skipped, 1);
    assert!(sink.records().is_empty());
    assert_eq!(site.opened().len(), 3);
    assert_eq!(site.closed(), 3);
}

#[tokio::test]
async fn test_profile_link_to_listing_page_keeps_card() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            r#"
            <div class="member"><h3>Jane Doe</h3><span class="position">CEO</span><a href="mailto:jane@acme.test">Email</a><a class="profile" href="/team#jane">More</a></div>
            <div class="member"><h3>John Roe</h3><span class="position">CTO</span><a class="profile" href="/team#john">More</a></div>
            "#,
        )),
    );

    let config = create_test_config(
        START,
        5,
        "[selectors]\nprofile-link = \"a.profile\"\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(report.profiles_visited, 0);
    assert_eq!(report.records_emitted, 2);

    let records = sink.records();
    assert_eq!(records[0].name, "Jane Doe");
    assert_eq!(records[0].email, "jane@acme.test");
    assert_eq!(records[0].page_url, START);
    assert_eq!(records[1].name, "John Roe");
    assert_eq!(records[1].email, "");
    assert_eq!(records[1].page_url, START);
    assert_eq!(site.opened(), vec![START.to_string()]);
}

#[tokio::test]
async fn test_timed_out_page_extracts_partial_content() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        timed_out(page("Team", &card("Jane Doe", "CEO", Some("jane@acme.test")))),
    );

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    let report = result.unwrap();
    assert_eq!(report.pages_extracted, 1);
    assert_eq!(report.retries, 0);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.records()[0].email, "jane@acme.test");
    assert_eq!(site.opened().len(), 1);
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_timed_out_challenge_goes_to_protection_check() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, timed_out(page("Just a moment...", "")));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    assert!(matches!(
        result.unwrap_err(),
        ScraperError::ProtectionBlocked { url } if url == START
    ));
    assert!(sink.records().is_empty());
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_navigation_errors_retried_then_skipped() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, navigation_error("net::ERR_CONNECTION_RESET"));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    let report = result.unwrap();
    assert_eq!(report.retries, 2);
    assert_eq!(report.pages_skipped, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].1.contains("ERR_CONNECTION_RESET"));
    assert!(sink.records().is_empty());
    assert_eq!(site.opened().len(), 3);
    assert_eq!(site.closed(), 0);
}

#[tokio::test]
async fn test_navigation_error_recovers_on_retry() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, navigation_error("net::ERR_TIMED_OUT"))
        .page(START, ok(page("Team", &card("Jane Doe", "CEO", None))));

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), false).await;

    let report = result.unwrap();
    assert_eq!(report.retries, 1);
    assert_eq!(report.pages_skipped, 0);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(site.opened().len(), 2);
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_infinite_scroll_extracts_loaded_cards() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            &format!(
                r#"{}<a class="next" href="/team?page=2">Next</a>"#,
                card("Jane Doe", "CEO", None)
            ),
        )),
    );
    site.on_scroll(page(
        "Team",
        &format!(
            "{}{}{}",
            card("Jane Doe", "CEO", None),
            card("John Roe", "CTO", None),
            card("Ann Poe", "CFO", None)
        ),
    ));

    let config = create_test_config(
        START,
        5,
        "[pagination]\ninfinite-scroll = true\nscroll-count = 3\n",
        dir.path(),
    );
    let (result, sink) = crawl(&site, config, false).await;

    let report = result.unwrap();
    assert_eq!(site.scrolls(), 3);
    assert_eq!(report.pages_extracted, 1);
    assert_eq!(sink.records().len(), 3);
    assert_eq!(site.opened(), vec![START.to_string()]);
}

#[tokio::test]
async fn test_solved_challenge_extracts_records() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        solved_after(
            1,
            page("Just a moment...", ""),
            page("Team", &card("Jane Doe", "CEO", Some("jane@acme.test"))),
        ),
    );

    let (result, sink) = crawl(&site, create_test_config(START, 5, "", dir.path()), true).await;

    let report = result.unwrap();
    assert_eq!(report.challenges_solved, 1);
    assert_eq!(report.pages_extracted, 1);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.records()[0].name, "Jane Doe");
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_progress_events_streamed() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(START, ok(page("Team", &card("Jane", "CEO", Some("jane@acme.test")))));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let coordinator = Coordinator::new(
        create_test_config(START, 5, "", dir.path()),
        site.browser(false),
        Box::new(MemorySink::new()),
    )
    .unwrap()
    .with_timing(ActionTiming::immediate(), Duration::ZERO, Duration::ZERO)
    .with_progress(tx);
    coordinator.run().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(ProgressEvent::PageStarted { number: 1, .. })));
    assert!(events.contains(&ProgressEvent::ItemsFound {
        url: START.to_string(),
        count: 1
    }));
    assert!(events.contains(&ProgressEvent::RecordSaved {
        name: "Jane".to_string(),
        has_email: true
    }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finished {
            pages: 1,
            records: 1
        })
    );
}

struct LockedSink;

impl RecordSink for LockedSink {
    fn write(&mut self, _record: &PersonRecord) -> SinkResult<()> {
        Err(SinkError::Locked("people.csv".to_string()))
    }

    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "locked".to_string()
    }
}

#[tokio::test]
async fn test_locked_sink_is_fatal() {
    let dir = TempDir::new().unwrap();
    let site = Site::new();
    site.page(
        START,
        ok(page(
            "Team",
            &format!(
                r#"{}<a class="next" href="/team?page=2">next</a>"#,
                card("Jane", "CEO", None)
            ),
        )),
    );

    let config = create_test_config(
        START,
        5,
        "[pagination]\nmode = \"link\"\nselector = \"a.next\"\n",
        dir.path(),
    );
    let result = Coordinator::new(config, site.browser(false), Box::new(LockedSink))
        .unwrap()
        .with_timing(ActionTiming::immediate(), Duration::ZERO, Duration::ZERO)
        .run()
        .await;

    assert!(matches!(
        result,
        Err(ScraperError::Sink(SinkError::Locked(_)))
    ));
    assert_eq!(site.opened().len(), 1);
    assert_eq!(site.closed(), 1);
}

#[tokio::test]
async fn test_http_engine_against_mock_server() {
    let dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    let start = format!("{}/team", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/team"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page("Team", &card("John Roe", "CTO", Some("john@acme.test")))),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/team"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(
            "Team",
            &format!(
                r#"{}<nav class="pager"><a href="/team?page=2">2</a><a href="/team?page=3">3</a></nav>"#,
                card("Jane Doe", "CEO", Some("jane@acme.test"))
            ),
        )))
        .mount(&mock_server)
        .await;

    // page 3 no longer exists
    Mock::given(method("GET"))
        .and(path("/team"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(
        &start,
        10,
        "[pagination]\nmode = \"link\"\nselector = \".pager a\"\n",
        dir.path(),
    );
    config.limits.timeout = 5_000;

    let sink = MemorySink::new();
    let browser = HttpBrowser::new("team-scraper-tests").unwrap();
    let report = Coordinator::new(config, browser, Box::new(sink.clone()))
        .unwrap()
        .with_timing(ActionTiming::immediate(), Duration::ZERO, Duration::ZERO)
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages_extracted, 2);
    assert_eq!(report.pages_skipped, 1);
    let emails: Vec<String> = sink.records().into_iter().map(|r| r.email).collect();
    assert_eq!(emails, vec!["jane@acme.test", "john@acme.test"]);
}
