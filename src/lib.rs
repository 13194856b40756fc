// src/lib.rs
pub mod chunking;
pub mod error;
pub mod filter;
pub mod formats;
pub mod input_format;
pub mod output_format;
pub mod pipeline;
pub mod timestamp;

pub use error::{ConvertError, ExtractError};
pub use input_format::{InputFormat, TextEncoding};
pub use output_format::{open_destination, RecordLayout, RecordWriter};
pub use pipeline::config::{ConvertConfig, DEFAULT_SCHEMA};
pub use pipeline::context::{ConversionStats, EntryOutcome, NormalizedRecord};
pub use pipeline::stream::ConversionPipeline;
pub use timestamp::TimeZoneMode;
