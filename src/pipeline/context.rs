use std::time::Duration;

use crate::filter::IgnoreReason;

/// The canonical output unit handed to the record writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub convert_sql_text: String,
    /// Microseconds since the Unix epoch.
    pub start_time: i64,
    pub session: String,
    /// Microsecond-equivalent execution time.
    pub exec_time: i64,
    pub schema: String,
    pub user: Option<String>,
    pub parameter: Option<String>,
}

/// Result of converting one logical entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Valid record, write it
    Emit(NormalizedRecord),
    /// Filtered out by a content rule
    Ignore(IgnoreReason),
    /// Nothing to convert (empty JSON object); not counted as an entry
    Empty,
}

/// Runtime statistics for one run
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub lines_read: usize,
    pub preamble_lines: usize,
    pub entries_seen: usize,
    pub records_written: usize,
    pub records_ignored: usize,
    pub processing_time: Duration,
}

impl ConversionStats {
    /// Every recognized entry was either written or ignored.
    pub fn is_balanced(&self) -> bool {
        self.entries_seen == self.records_written + self.records_ignored
    }
}
