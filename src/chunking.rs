use regex::Regex;

use crate::error::ConvertError;

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub strategy: ChunkStrategy,
    pub trailing: TrailingEntry,
    pub max_chunk_lines: usize,
    pub max_chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Line,
            trailing: TrailingEntry::Drop,
            max_chunk_lines: 1_000_000,
            max_chunk_size: 256 * 1024 * 1024, // 256MB
        }
    }
}

#[derive(Debug, Clone)]
pub enum ChunkStrategy {
    /// Every physical line is its own entry.
    Line,
    /// A line matching the pattern opens a new entry; other lines continue it.
    StartPattern(Regex),
}

/// What happens to the entry still open when the input ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingEntry {
    /// The last multi-line entry is never finalized, since no boundary follows it.
    #[default]
    Drop,
    /// Finalize the last entry as if a boundary followed it.
    Emit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkerState {
    NotStarted,
    Accumulating,
}

#[derive(Debug)]
pub struct Chunk {
    pub content: String,
    pub line_count: usize,
    pub start_line: usize,
}

pub struct LineChunker {
    config: ChunkConfig,
    state: ChunkerState,
    current_chunk: String,
    current_lines: usize,
    chunk_start_line: usize,
    global_line_number: usize,
    preamble_lines: usize,
}

impl LineChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            config,
            state: ChunkerState::NotStarted,
            current_chunk: String::new(),
            current_lines: 0,
            chunk_start_line: 1,
            global_line_number: 0,
            preamble_lines: 0,
        }
    }

    /// Feed one physical line; returns the entry it completed, if any.
    pub fn add_line(&mut self, line: String) -> Result<Option<Chunk>, ConvertError> {
        self.global_line_number += 1;

        match &self.config.strategy {
            ChunkStrategy::Line => Ok(Some(Chunk {
                content: line,
                line_count: 1,
                start_line: self.global_line_number,
            })),

            ChunkStrategy::StartPattern(regex) => {
                let is_boundary = regex.is_match(&line);
                match (self.state, is_boundary) {
                    (ChunkerState::NotStarted, false) => {
                        self.preamble_lines += 1;
                        Ok(None)
                    }
                    (ChunkerState::NotStarted, true) => {
                        self.state = ChunkerState::Accumulating;
                        self.start_chunk(&line);
                        Ok(None)
                    }
                    (ChunkerState::Accumulating, true) => {
                        let chunk = self.emit_current_chunk();
                        self.start_chunk(&line);
                        Ok(Some(chunk))
                    }
                    (ChunkerState::Accumulating, false) => {
                        self.add_line_to_chunk(&line);
                        self.check_safety_limits()?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// End of input. Only yields an entry under `TrailingEntry::Emit`.
    pub fn flush(&mut self) -> Option<Chunk> {
        if self.state != ChunkerState::Accumulating {
            return None;
        }
        match self.config.trailing {
            TrailingEntry::Emit => {
                self.state = ChunkerState::NotStarted;
                Some(self.emit_current_chunk())
            }
            TrailingEntry::Drop => {
                if self.current_lines > 0 {
                    log::debug!(
                        "dropping unterminated entry starting at line {} ({} lines)",
                        self.chunk_start_line,
                        self.current_lines
                    );
                }
                None
            }
        }
    }

    /// Lines seen before the first boundary, which belong to no entry.
    pub fn preamble_lines(&self) -> usize {
        self.preamble_lines
    }

    fn start_chunk(&mut self, line: &str) {
        self.chunk_start_line = self.global_line_number;
        self.add_line_to_chunk(line);
    }

    fn add_line_to_chunk(&mut self, line: &str) {
        if self.current_lines > 0 {
            self.current_chunk.push('\n');
        }
        self.current_chunk.push_str(line);
        self.current_lines += 1;
    }

    fn emit_current_chunk(&mut self) -> Chunk {
        let chunk = Chunk {
            content: std::mem::take(&mut self.current_chunk),
            line_count: self.current_lines,
            start_line: self.chunk_start_line,
        };
        self.current_lines = 0;
        chunk
    }

    fn check_safety_limits(&self) -> Result<(), ConvertError> {
        if self.current_lines > self.config.max_chunk_lines {
            return Err(ConvertError::EntryTooLarge {
                line: self.chunk_start_line,
                limit: format!("{} lines", self.config.max_chunk_lines),
            });
        }
        if self.current_chunk.len() > self.config.max_chunk_size {
            return Err(ConvertError::EntryTooLarge {
                line: self.chunk_start_line,
                limit: format!("{} bytes", self.config.max_chunk_size),
            });
        }
        Ok(())
    }
}
