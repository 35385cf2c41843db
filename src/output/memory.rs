use super::traits::{RecordSink, SinkResult};
use crate::extract::PersonRecord;
use std::sync::{Arc, Mutex};

/// Collects records in memory
///
/// Clones share the same buffer, so a caller can keep one handle and give
/// the other to the crawl.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<PersonRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn records(&self) -> Vec<PersonRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &PersonRecord) -> SinkResult<()> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory buffer".to_string()
    }
}
