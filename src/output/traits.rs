//! Record sink trait
//!
//! Sinks persist person records one at a time as the crawl produces them.
//! Nothing is buffered beyond a single record, so a crash mid-crawl leaves
//! every record written so far on disk.

use crate::extract::PersonRecord;
use crate::SinkError;
use std::io;

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Incremental destination for person records
///
/// A failed write is fatal to the crawl; implementations must not swallow
/// errors.
pub trait RecordSink {
    /// Durably writes one record
    fn write(&mut self, record: &PersonRecord) -> SinkResult<()>;

    /// Flushes and closes out the output
    fn finish(&mut self) -> SinkResult<()>;

    /// Short label used in logs
    fn describe(&self) -> String;
}

/// Maps an I/O failure onto a sink error
///
/// A file held open by another program (a spreadsheet application, usually)
/// shows up as permission denied.
pub fn io_error(path: &std::path::Path, error: io::Error) -> SinkError {
    if error.kind() == io::ErrorKind::PermissionDenied {
        SinkError::Locked(path.display().to_string())
    } else {
        SinkError::Io(error)
    }
}
