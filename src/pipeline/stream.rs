// src/pipeline/stream.rs
use std::io::{BufRead, Write};
use std::time::Instant;

use crate::chunking::{Chunk, ChunkConfig, ChunkStrategy, LineChunker};
use crate::error::ConvertError;
use crate::formats::{
    adb_access, polarx_cn, AdbAccessConverter, EntryConverter, ExtractContext,
    PolarxAuditConverter, PolarxCnConverter, RdsAuditConverter, RdsCsvConverter,
};
use crate::formats::rds_csv::CsvRowReader;
use crate::input_format::{parse_json_line, read_lines, InputFormat};
use crate::output_format::{RecordLayout, RecordWriter};
use crate::pipeline::config::ConvertConfig;
use crate::pipeline::context::{ConversionStats, EntryOutcome};

/// Single-pass conversion of one source stream.
pub struct ConversionPipeline {
    config: ConvertConfig,
    ctx: ExtractContext,
    stats: ConversionStats,
}

impl ConversionPipeline {
    pub fn new(config: ConvertConfig) -> Self {
        let ctx = ExtractContext::from(&config);
        ConversionPipeline {
            config,
            ctx,
            stats: ConversionStats::default(),
        }
    }

    /// Statistics gathered so far, also valid after a failed run.
    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Convert every entry of `input` into `output`.
    ///
    /// Stops at the first structural error. Records written before it stay in
    /// `output`, and the entry that failed is never written.
    pub fn process_stream<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut RecordWriter<W>,
    ) -> Result<ConversionStats, ConvertError> {
        let start_time = Instant::now();
        self.stats = ConversionStats::default();

        let result = match self.config.input_format {
            InputFormat::AdbAccess => {
                let converter = AdbAccessConverter::new(self.ctx.clone());
                self.process_multiline(input, output, adb_access::boundary(), &converter)
            }
            InputFormat::PolarxCn => {
                let converter = PolarxCnConverter::new(self.ctx.clone());
                self.process_multiline(input, output, polarx_cn::boundary(), &converter)
            }
            InputFormat::PolarxAudit => {
                let converter = PolarxAuditConverter::new(self.ctx.clone());
                self.process_json_lines(input, output, &converter)
            }
            InputFormat::RdsAudit => self.process_json_lines(input, output, &RdsAuditConverter),
            InputFormat::RdsCsv => {
                let converter = RdsCsvConverter::new(self.ctx.clone());
                self.process_csv(input, output, &converter)
            }
        };

        self.stats.processing_time = start_time.elapsed();
        // Keep what was converted before a failure.
        output.flush()?;
        result?;
        Ok(self.stats.clone())
    }

    fn process_multiline<R, W, C>(
        &mut self,
        input: R,
        output: &mut RecordWriter<W>,
        boundary: &regex::Regex,
        converter: &C,
    ) -> Result<(), ConvertError>
    where
        R: BufRead,
        W: Write,
        C: EntryConverter<Entry = str>,
    {
        let mut chunker = LineChunker::new(ChunkConfig {
            strategy: ChunkStrategy::StartPattern(boundary.clone()),
            trailing: self.config.trailing_entry,
            max_chunk_lines: self.config.max_entry_lines,
            max_chunk_size: self.config.max_entry_size,
        });

        for line_result in read_lines(input, self.config.encoding) {
            let line = line_result?;
            self.stats.lines_read += 1;
            if let Some(chunk) = chunker.add_line(line.trim().to_string())? {
                self.convert_chunk(&chunk, output, converter)?;
            }
        }

        if let Some(chunk) = chunker.flush() {
            self.convert_chunk(&chunk, output, converter)?;
        }
        self.stats.preamble_lines = chunker.preamble_lines();
        Ok(())
    }

    fn convert_chunk<W, C>(
        &mut self,
        chunk: &Chunk,
        output: &mut RecordWriter<W>,
        converter: &C,
    ) -> Result<(), ConvertError>
    where
        W: Write,
        C: EntryConverter<Entry = str>,
    {
        let outcome = converter
            .convert(&chunk.content)
            .map_err(|e| ConvertError::malformed(chunk.start_line, chunk.content.as_str(), e))?;
        self.handle_outcome(outcome, output, &C::LAYOUT)
    }

    fn process_json_lines<R, W, C>(
        &mut self,
        input: R,
        output: &mut RecordWriter<W>,
        converter: &C,
    ) -> Result<(), ConvertError>
    where
        R: BufRead,
        W: Write,
        C: EntryConverter<Entry = serde_json::Value>,
    {
        for line_result in read_lines(input, self.config.encoding) {
            let line = line_result?;
            self.stats.lines_read += 1;
            let line_number = self.stats.lines_read;

            let line_content = line.trim();
            if line_content.is_empty() {
                continue;
            }

            let outcome = parse_json_line(line_content)
                .map_err(Into::into)
                .and_then(|value| converter.convert(&value))
                .map_err(|e| ConvertError::malformed(line_number, line_content, e))?;
            self.handle_outcome(outcome, output, &C::LAYOUT)?;
        }
        Ok(())
    }

    fn process_csv<R, W>(
        &mut self,
        input: R,
        output: &mut RecordWriter<W>,
        converter: &RdsCsvConverter,
    ) -> Result<(), ConvertError>
    where
        R: BufRead,
        W: Write,
    {
        let rows = CsvRowReader::new(input, self.config.encoding)?;
        for row_result in rows {
            let (line_number, row) = row_result?;
            self.stats.lines_read = line_number;

            let outcome = converter
                .convert(&row)
                .map_err(|e| ConvertError::malformed(line_number, row.render(), e))?;
            self.handle_outcome(outcome, output, &RdsCsvConverter::LAYOUT)?;
        }
        Ok(())
    }

    fn handle_outcome<W: Write>(
        &mut self,
        outcome: EntryOutcome,
        output: &mut RecordWriter<W>,
        layout: &RecordLayout,
    ) -> Result<(), ConvertError> {
        match outcome {
            EntryOutcome::Emit(record) => {
                self.stats.entries_seen += 1;
                output.write_record(&record, layout)?;
                self.stats.records_written += 1;
            }
            EntryOutcome::Ignore(reason) => {
                self.stats.entries_seen += 1;
                self.stats.records_ignored += 1;
                log::info!("ignore {}", reason);
            }
            EntryOutcome::Empty => {}
        }
        Ok(())
    }
}
