//! Output module for persisting person records
//!
//! This module handles:
//! - Streaming records to JSON lines, CSV, or SQLite as they are extracted
//! - Detecting output files locked by another program
//! - Printing the end-of-crawl report

mod csv;
mod json;
mod memory;
mod report;
mod sqlite;
mod traits;

pub use self::csv::{write_row, CsvSink, CSV_HEADER};
pub use json::JsonLinesSink;
pub use memory::MemorySink;
pub use report::{print_report, CrawlReport};
pub use sqlite::SqliteSink;
pub use traits::{io_error, RecordSink, SinkResult};

use crate::config::OutputFormat;
use std::path::Path;

/// Opens the sink for the configured format
///
/// # Arguments
///
/// * `format` - Output format
/// * `path` - Destination file; created or truncated (SQLite appends a run)
/// * `config_hash` - Hash of the configuration, recorded by SQLite runs
/// * `source_url` - Start URL of the crawl
pub fn open_sink(
    format: OutputFormat,
    path: &Path,
    config_hash: &str,
    source_url: &str,
) -> SinkResult<Box<dyn RecordSink + Send>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let sink: Box<dyn RecordSink + Send> = match format {
        OutputFormat::Json => Box::new(JsonLinesSink::create(path)?),
        OutputFormat::Csv => Box::new(CsvSink::create(path)?),
        OutputFormat::Sqlite => Box::new(SqliteSink::open(path, config_hash, source_url)?),
    };

    Ok(sink)
}
