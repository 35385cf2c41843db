use super::traits::{io_error, RecordSink, SinkResult};
use crate::extract::PersonRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One JSON object per line
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> SinkResult<Self> {
        let file = File::create(path).map_err(|e| io_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, record: &PersonRecord) -> SinkResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| io_error(&self.path, e))
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.writer.flush().map_err(|e| io_error(&self.path, e))
    }

    fn describe(&self) -> String {
        format!("JSON lines file {}", self.path.display())
    }
}
