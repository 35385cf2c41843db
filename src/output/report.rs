//! End-of-crawl report
//!
//! Counters accumulated by the coordinator, plus the console summary printed
//! when the CLI finishes.

use std::time::Duration;

/// Summary of one crawl session
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Start URL of the crawl
    pub start_url: String,

    /// Where records were written
    pub sink: String,

    /// Listing pages that were loaded and extracted
    pub pages_extracted: u64,

    /// Pages dropped after a 404 or exhausted retries
    pub pages_skipped: u64,

    /// Queued listing pages abandoned at the page ceiling
    pub pages_abandoned: u64,

    /// Profile pages visited for a second-phase email lookup
    pub profiles_visited: u64,

    /// Records handed to the sink
    pub records_emitted: u64,

    /// Records whose email came back empty
    pub records_without_email: u64,

    /// Retry attempts made across all requests
    pub retries: u64,

    /// Protection challenges solved by a human
    pub challenges_solved: u64,

    /// URL and reason for each dropped page
    pub failures: Vec<(String, String)>,

    pub duration: Duration,
}

impl CrawlReport {
    pub fn new(start_url: &str, sink: String) -> Self {
        Self {
            start_url: start_url.to_string(),
            sink,
            ..Default::default()
        }
    }

    /// Listing and profile pages that reached a final outcome
    pub fn pages_attempted(&self) -> u64 {
        self.pages_extracted + self.profiles_visited + self.pages_skipped
    }

    /// Percentage of attempted pages that were not skipped
    pub fn success_rate(&self) -> f64 {
        let attempted = self.pages_attempted();
        if attempted == 0 {
            return 0.0;
        }
        ((attempted - self.pages_skipped) as f64 / attempted as f64) * 100.0
    }

    /// Percentage of records that carry an email address
    pub fn email_coverage(&self) -> f64 {
        if self.records_emitted == 0 {
            return 0.0;
        }
        ((self.records_emitted - self.records_without_email) as f64 / self.records_emitted as f64)
            * 100.0
    }
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Overview:");
    println!("  Start URL: {}", report.start_url);
    println!("  Output: {}", report.sink);
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    println!();

    println!("Pages:");
    println!("  Listing pages extracted: {}", report.pages_extracted);
    println!("  Profile pages visited: {}", report.profiles_visited);
    println!("  Skipped: {}", report.pages_skipped);
    if report.pages_abandoned > 0 {
        println!("  Abandoned at page limit: {}", report.pages_abandoned);
    }
    println!("  Retries: {}", report.retries);
    if report.challenges_solved > 0 {
        println!("  Challenges solved: {}", report.challenges_solved);
    }
    println!();

    println!("Records:");
    println!("  Emitted: {}", report.records_emitted);
    println!(
        "  With email: {:.1}% ({} without)",
        report.email_coverage(),
        report.records_without_email
    );
    println!();

    if !report.failures.is_empty() {
        println!("Failures ({}):", report.failures.len());
        for (url, reason) in &report.failures {
            println!("  - {}: {}", url, reason);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages)",
        report.success_rate(),
        report.pages_attempted() - report.pages_skipped,
        report.pages_attempted()
    );
}
