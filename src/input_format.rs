// src/input_format.rs - Source formats and the physical line reader

use std::io::{self, BufRead};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    /// Analytic DB access log: `[date time,ms] INFO [thread] ... Client=ip Total_time=N ...`
    #[value(name = "adb-access")]
    AdbAccess,
    /// Distributed DB compute-node SQL log with `[len=N]` markers and `# [rt=...]` footer
    #[value(name = "polarx-cn")]
    PolarxCn,
    /// Distributed DB SQL audit events, one JSON object per line
    #[value(name = "polarx-audit")]
    PolarxAudit,
    /// RDS audit events, one JSON object per line
    #[value(name = "rds-audit")]
    RdsAudit,
    /// RDS audit export as CSV with a header row
    #[value(name = "rds-csv")]
    RdsCsv,
}

impl InputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            InputFormat::AdbAccess => "adb-access",
            InputFormat::PolarxCn => "polarx-cn",
            InputFormat::PolarxAudit => "polarx-audit",
            InputFormat::RdsAudit => "rds-audit",
            InputFormat::RdsCsv => "rds-csv",
        }
    }

    /// Multi-line formats need a boundary pattern to segment entries.
    pub fn is_multiline(&self) -> bool {
        matches!(self, InputFormat::AdbAccess | InputFormat::PolarxCn)
    }
}

impl Default for InputFormat {
    fn default() -> Self {
        InputFormat::PolarxAudit
    }
}

/// How source bytes are decoded into text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8; invalid sequences are an I/O error.
    #[default]
    Utf8,
    /// UTF-8; invalid sequences become U+FFFD.
    Utf8Lossy,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> io::Result<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            TextEncoding::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Iterator over the physical lines of a source, without line terminators.
pub struct LineReader<R> {
    reader: R,
    encoding: TextEncoding,
    buf: Vec<u8>,
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(self.encoding.decode(&self.buf))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn read_lines<R: BufRead>(reader: R, encoding: TextEncoding) -> LineReader<R> {
    LineReader {
        reader,
        encoding,
        buf: Vec::new(),
    }
}

/// Parse one JSON line. Leading and trailing whitespace is ignored.
pub fn parse_json_line(line: &str) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(line.trim())
}
