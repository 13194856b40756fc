// src/pipeline.rs
pub mod config;
pub mod context;
pub mod stream;

pub use config::ConvertConfig;
pub use context::{ConversionStats, EntryOutcome, NormalizedRecord};
pub use stream::ConversionPipeline;
