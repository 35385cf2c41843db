//! SQLite record sink
//!
//! Each crawl registers a row in `runs`; every person is inserted into
//! `people` as soon as it is extracted.

use super::traits::{RecordSink, SinkResult};
use crate::extract::PersonRecord;
use crate::SinkError;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    source_url TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    position TEXT NOT NULL,
    source_url TEXT NOT NULL,
    page_url TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_people_run ON people(run_id);
CREATE INDEX IF NOT EXISTS idx_people_email ON people(email);
";

/// Record sink backed by a SQLite database
pub struct SqliteSink {
    conn: Connection,
    path: PathBuf,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and registers a new run
    pub fn open(path: &Path, config_hash: &str, source_url: &str) -> SinkResult<Self> {
        let conn = Connection::open(path).map_err(|e| classify(path, e))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )
        .map_err(|e| classify(path, e))?;

        Self::with_connection(conn, path.to_path_buf(), config_hash, source_url)
    }

    #[cfg(test)]
    fn open_in_memory(config_hash: &str, source_url: &str) -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, PathBuf::from(":memory:"), config_hash, source_url)
    }

    fn with_connection(
        conn: Connection,
        path: PathBuf,
        config_hash: &str,
        source_url: &str,
    ) -> SinkResult<Self> {
        conn.execute_batch(SCHEMA).map_err(|e| classify(&path, e))?;

        conn.execute(
            "INSERT INTO runs (started_at, config_hash, source_url, status) VALUES (?1, ?2, ?3, 'running')",
            params![Utc::now().to_rfc3339(), config_hash, source_url],
        )
        .map_err(|e| classify(&path, e))?;
        let run_id = conn.last_insert_rowid();

        Ok(Self { conn, path, run_id })
    }

    /// Identifier of the run this sink writes under
    pub fn run_id(&self) -> i64 {
        self.run_id
    }
}

impl RecordSink for SqliteSink {
    fn write(&mut self, record: &PersonRecord) -> SinkResult<()> {
        self.conn
            .execute(
                "INSERT INTO people (run_id, name, email, position, source_url, page_url, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    self.run_id,
                    record.name,
                    record.email,
                    record.position,
                    record.source_url,
                    record.page_url,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| classify(&self.path, e))?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.conn
            .execute(
                "UPDATE runs SET finished_at = ?1, status = 'completed' WHERE id = ?2",
                params![Utc::now().to_rfc3339(), self.run_id],
            )
            .map_err(|e| classify(&self.path, e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("SQLite database {} (run {})", self.path.display(), self.run_id)
    }
}

/// Busy and locked databases surface as [`SinkError::Locked`]
fn classify(path: &Path, error: rusqlite::Error) -> SinkError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            SinkError::Locked(path.display().to_string())
        }
        _ => SinkError::Database(error),
    }
}
