use super::traits::{io_error, RecordSink, SinkResult};
use crate::extract::PersonRecord;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Column order of the CSV output
pub const CSV_HEADER: [&str; 5] = ["name", "email", "position", "source_url", "page_url"];

/// Byte-order mark so spreadsheet programs detect UTF-8
const UTF8_BOM: &str = "\u{feff}";

/// Comma-separated output with a header row
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> SinkResult<Self> {
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        let mut writer = BufWriter::new(file);

        write!(writer, "{}", UTF8_BOM)
            .and_then(|_| write_row(&mut writer, &CSV_HEADER))
            .and_then(|_| writer.flush())
            .map_err(|e| io_error(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }
}

impl RecordSink for CsvSink {
    fn write(&mut self, record: &PersonRecord) -> SinkResult<()> {
        let row = [
            record.name.as_str(),
            record.email.as_str(),
            record.position.as_str(),
            record.source_url.as_str(),
            record.page_url.as_str(),
        ];
        write_row(&mut self.writer, &row)
            .and_then(|_| self.writer.flush())
            .map_err(|e| io_error(&self.path, e))
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.writer.flush().map_err(|e| io_error(&self.path, e))
    }

    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes one row, quoting fields that contain separators, quotes, or newlines
pub fn write_row<W: Write>(mut w: W, row: &[&str]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}
