use anyhow::Context;
use chrono::FixedOffset;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use auditlog_convert::chunking::TrailingEntry;
use auditlog_convert::timestamp::parse_utc_offset;
use auditlog_convert::{
    open_destination, ConversionPipeline, ConversionStats, ConvertConfig, ConvertError,
    InputFormat, RecordWriter, TextEncoding, TimeZoneMode, DEFAULT_SCHEMA,
};

/// Exit code for a run aborted by malformed input or I/O failure.
const EXIT_FATAL: i32 = 1;
/// Exit code for missing or invalid arguments.
const EXIT_USAGE: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "auditlog-convert")]
#[command(about = "Convert database audit and slow-query logs into JSON lines for SQL replay")]
#[command(version)]
struct Args {
    /// Source log file
    #[arg(short = 's', long = "src")]
    src: Option<PathBuf>,

    /// Destination file (truncated, then appended to)
    #[arg(short = 'd', long = "dest")]
    dest: Option<PathBuf>,

    /// Source log format
    #[arg(short = 'f', long = "format", value_enum, default_value = "polarx-audit")]
    format: InputFormat,

    /// Schema written for formats whose log carries none
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    schema: String,

    /// Flush the destination every N written records
    #[arg(long, value_name = "N", default_value = "10000")]
    flush_interval: usize,

    /// Also convert the last multi-line entry when the input ends without a new boundary
    #[arg(long)]
    flush_trailing: bool,

    /// Read log dates at a fixed UTC offset (e.g. +08:00) instead of the local zone
    #[arg(long, value_name = "OFFSET", value_parser = parse_utc_offset, allow_hyphen_values = true)]
    utc_offset: Option<FixedOffset>,

    /// Replace invalid UTF-8 instead of failing
    #[arg(long)]
    lossy_utf8: bool,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> ConvertConfig {
        ConvertConfig {
            input_format: self.format,
            encoding: if self.lossy_utf8 {
                TextEncoding::Utf8Lossy
            } else {
                TextEncoding::Utf8
            },
            time_zone: self
                .utc_offset
                .map_or(TimeZoneMode::Local, TimeZoneMode::Fixed),
            trailing_entry: if self.flush_trailing {
                TrailingEntry::Emit
            } else {
                TrailingEntry::Drop
            },
            default_schema: self.schema.clone(),
            flush_interval: self.flush_interval,
            buffer_size: self.buffer_size,
            ..Default::default()
        }
    }
}

fn main() {
    let args = Args::parse();

    let level_filter = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(level_filter)
        .parse_default_env()
        .init();

    let (Some(src), Some(dest)) = (args.src.as_deref(), args.dest.as_deref()) else {
        eprintln!("ERROR: need -s and -d");
        std::process::exit(EXIT_USAGE);
    };

    if let Err(e) = run(&args, src, dest) {
        if let Some(entry) = e
            .downcast_ref::<ConvertError>()
            .and_then(ConvertError::offending_entry)
        {
            log::error!("{}", entry);
        }
        log::error!("{:#}", e);
        std::process::exit(EXIT_FATAL);
    }
}

fn run(args: &Args, src: &Path, dest: &Path) -> anyhow::Result<ConversionStats> {
    let config = args.to_config();
    if args.flush_trailing && !config.input_format.is_multiline() {
        log::warn!(
            "--flush-trailing has no effect for {}",
            config.input_format.name()
        );
    }

    let output = open_destination(dest, config.buffer_size)
        .with_context(|| format!("Failed to open destination file '{}'", dest.display()))?;
    let input = File::open(src)
        .with_context(|| format!("Failed to open source file '{}'", src.display()))?;
    let input = BufReader::with_capacity(config.buffer_size, input);
    let mut writer = RecordWriter::new(output, config.flush_interval);

    log::info!("begin analyse {}", src.display());
    let mut pipeline = ConversionPipeline::new(config);
    let result = pipeline.process_stream(input, &mut writer);

    let stats = pipeline.stats();
    log::debug!(
        "lines read: {}, entries: {}, preamble lines: {}, time: {:?}",
        stats.lines_read,
        stats.entries_seen,
        stats.preamble_lines,
        stats.processing_time
    );

    let stats = result.with_context(|| {
        format!(
            "Conversion of '{}' aborted after {} records",
            src.display(),
            pipeline.stats().records_written
        )
    })?;
    log::info!(
        "--- end --- {} written, {} ignored",
        stats.records_written,
        stats.records_ignored
    );
    Ok(stats)
}
