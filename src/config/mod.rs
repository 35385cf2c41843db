//! Configuration module for Team Scraper
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration is built once per crawl session and never mutated afterwards.
//!
//! # Example
//!
//! ```no_run
//! use team_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("team.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.limits.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    split_sequence, ActionConfig, BrowserConfig, Config, EngineKind, LimitsConfig, OutputConfig,
    OutputFormat, PaginationConfig, PaginationKind, SelectorConfig, TargetConfig, WaitState,
    DEFAULT_STORAGE_STATE_PATH, SEQUENCE_DELIMITER,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config,
    read_config,
};
pub use validation::validate;
