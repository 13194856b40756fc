use crate::chunking::TrailingEntry;
use crate::input_format::{InputFormat, TextEncoding};
use crate::output_format::DEFAULT_FLUSH_INTERVAL;
use crate::timestamp::TimeZoneMode;

/// Schema written for formats whose log lines carry none.
pub const DEFAULT_SCHEMA: &str = "cgljfl";

/// Configuration for one conversion run
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub input_format: InputFormat,
    pub encoding: TextEncoding,
    pub time_zone: TimeZoneMode,
    pub trailing_entry: TrailingEntry,
    pub default_schema: String,
    pub flush_interval: usize,
    pub buffer_size: usize,
    pub max_entry_lines: usize,
    pub max_entry_size: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            input_format: InputFormat::default(),
            encoding: TextEncoding::default(),
            time_zone: TimeZoneMode::default(),
            trailing_entry: TrailingEntry::default(),
            default_schema: DEFAULT_SCHEMA.to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            buffer_size: 65536,                // 64KB
            max_entry_lines: 1_000_000,
            max_entry_size: 256 * 1024 * 1024, // 256MB
        }
    }
}

impl ConvertConfig {
    pub fn for_format(input_format: InputFormat) -> Self {
        ConvertConfig {
            input_format,
            ..Default::default()
        }
    }
}
