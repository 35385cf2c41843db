//! Team Scraper main entry point
//!
//! This is the command-line interface for the Team Scraper staff-page crawler.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use team_scraper::config::{
    compute_config_hash, read_config, validate, Config, EngineKind, OutputFormat,
};
use team_scraper::crawler::run_crawl;
use team_scraper::output::print_report;
use team_scraper::pagination::PaginationMode;
use tracing_subscriber::EnvFilter;

/// Team Scraper: collects names, positions and emails from staff pages
///
/// Team Scraper opens a team or staff directory page, follows its pagination,
/// optionally visits each person's profile page, and writes one record per
/// person as soon as it is found.
#[derive(Parser, Debug)]
#[command(name = "team-scraper")]
#[command(version)]
#[command(about = "Collects person records from staff directory pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Run the browser without a visible window (disables the human bypass)
    #[arg(long)]
    headless: bool,

    /// Browser engine to use
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Output file (extension is forced to match the format)
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,
}

impl Cli {
    /// Layers command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(engine) = self.engine {
            config.browser.engine = engine;
        }
        if let Some(output) = &self.output {
            config.output.file = Some(output.clone());
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = read_config(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    validate(&config).context("Invalid configuration")?;

    let config_hash = compute_config_hash(&cli.config)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let report = run_crawl(config, &config_hash, None)
        .await
        .context("Crawl failed")?;

    if !cli.quiet {
        print_report(&report);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("team_scraper=info,warn"),
            1 => EnvFilter::new("team_scraper=debug,info"),
            2 => EnvFilter::new("team_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<()> {
    let pagination = PaginationMode::from_config(config)?;

    println!("=== Team Scraper Dry Run ===\n");

    println!("Target:");
    println!("  URL: {}", config.target.url);
    println!("  Container: {}", config.container_selector());

    println!("\nSelectors:");
    match config.name_parts() {
        Some(parts) => println!("  Name parts: {}", parts.join(" + ")),
        None => println!("  Name: {}", config.selectors.name),
    }
    println!("  Email: {}", config.selectors.email);
    println!("  Position: {}", config.selectors.position);
    if let Some(link) = &config.selectors.profile_link {
        println!("  Profile link: {}", link);
    }

    println!("\nPagination:");
    match &pagination {
        Some(mode) => println!("  Mode: {}", mode.name()),
        None => println!("  None (single page)"),
    }
    if let Some(selector) = &config.pagination.selector {
        println!("  Selector: {}", selector);
    }
    let pre_clicks = config.pre_scrape_clicks();
    if !pre_clicks.is_empty() {
        println!(
            "  Pre-scrape clicks ({}): {}",
            if config.actions.pre_scrape_all_pages {
                "every page"
            } else {
                "first page"
            },
            pre_clicks.join(" -> ")
        );
    }

    println!("\nLimits:");
    println!("  Max pages: {}", config.limits.max_pages);
    println!("  Page delay: {}s", config.limits.page_delay);
    println!("  Timeout: {}ms", config.limits.timeout);
    println!(
        "  Retries: {} (codes {:?})",
        config.limits.retry_times, config.limits.retry_http_codes
    );

    println!("\nBrowser:");
    println!("  Engine: {:?}", config.browser.engine);
    println!("  Headless: {}", config.browser.headless);

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  File: {}", config.output_path().display());

    println!("\n✓ Configuration is valid");

    Ok(())
}
