// src/formats/rds_csv.rs - RDS audit export in CSV
//
// client ip,db name,user,SQL command,thread id,cost time(microsecond),number of return,execute time,
// 189.33.68.214,rds_uat1,app,"select
//     1 from dual",2768610,0,1,Fri Feb 03 16:50:30 CST 2023,

use std::collections::HashMap;
use std::io::{self, Read};

use super::rds_audit::{FIELDS, RULES};
use super::{EntryConverter, ExtractContext};
use crate::error::{ConvertError, ExtractError};
use crate::filter::first_rejection;
use crate::input_format::TextEncoding;
use crate::output_format::{KeyOrder, ParameterPolicy, RecordLayout, UserPolicy};
use crate::pipeline::context::{EntryOutcome, NormalizedRecord};
use crate::timestamp::{parse_integer, parse_local, CST_EXPORT_FORMAT};

/// One data row keyed by header name.
#[derive(Debug, Clone, Default)]
pub struct CsvRow {
    values: HashMap<String, String>,
}

impl CsvRow {
    pub fn get(&self, key: &str) -> Result<&str, ExtractError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ExtractError::MissingField(key.to_string()))
    }

    /// Raw text of the row, for diagnostics.
    pub fn render(&self) -> String {
        let mut pairs: Vec<_> = self.values.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={:?}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CsvRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CsvRow {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

impl FieldState {
    /// Step over `byte`; false when the byte is dropped.
    fn advance(&mut self, byte: u8) -> bool {
        *self = match (*self, byte) {
            (FieldState::Start, b' ') => return false,
            (FieldState::Start, b'"') => FieldState::Quoted,
            (FieldState::Quoted, b'"') => FieldState::QuoteInQuoted,
            (FieldState::Quoted, _) => FieldState::Quoted,
            (FieldState::QuoteInQuoted, b'"') => FieldState::Quoted,
            (_, b',' | b'\n') => FieldState::Start,
            _ => FieldState::Unquoted,
        };
        true
    }
}

/// Drops spaces at the start of every field, outside quoted text.
///
/// The csv crate only opens a quoted field on its very first byte, so
/// `a, "b, c"` has to reach it as `a,"b, c"`.
struct SkipInitialSpace<R> {
    inner: R,
    state: FieldState,
    scratch: Vec<u8>,
}

impl<R: Read> SkipInitialSpace<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            state: FieldState::Start,
            scratch: Vec::new(),
        }
    }
}

impl<R: Read> Read for SkipInitialSpace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.scratch.resize(buf.len(), 0);
        loop {
            let n = self.inner.read(&mut self.scratch)?;
            if n == 0 {
                return Ok(0);
            }
            let mut written = 0;
            for &byte in &self.scratch[..n] {
                if self.state.advance(byte) {
                    buf[written] = byte;
                    written += 1;
                }
            }
            if written > 0 {
                return Ok(written);
            }
        }
    }
}

/// Iterator over the data rows of a CSV export with a header row.
pub struct CsvRowReader<R> {
    reader: csv::Reader<SkipInitialSpace<R>>,
    headers: Vec<String>,
    encoding: TextEncoding,
    record: csv::ByteRecord,
}

impl<R: Read> CsvRowReader<R> {
    pub fn new(input: R, encoding: TextEncoding) -> Result<Self, ConvertError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(SkipInitialSpace::new(input));

        let raw_headers = reader
            .byte_headers()
            .map_err(|e| ConvertError::malformed(1, "<header>", ExtractError::Csv(e)))?
            .clone();
        let headers = raw_headers
            .iter()
            .map(|h| encoding.decode(h).map(|h| h.trim_end().to_string()))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            reader,
            headers,
            encoding,
            record: csv::ByteRecord::new(),
        })
    }

    fn decode_row(&self) -> Result<CsvRow, ConvertError> {
        let mut values = HashMap::with_capacity(self.headers.len());
        for (header, raw) in self.headers.iter().zip(self.record.iter()) {
            if header.is_empty() {
                continue;
            }
            values.insert(header.clone(), self.encoding.decode(raw)?);
        }
        Ok(CsvRow { values })
    }
}

impl<R: Read> Iterator for CsvRowReader<R> {
    /// Starting line of the row, and the row.
    type Item = Result<(usize, CsvRow), ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let line = self
                    .record
                    .position()
                    .map_or(0, |p| p.line() as usize);
                Some(self.decode_row().map(|row| (line, row)))
            }
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line() as usize);
                Some(Err(ConvertError::malformed(line, "", ExtractError::Csv(e))))
            }
        }
    }
}

pub struct RdsCsvConverter {
    ctx: ExtractContext,
}

impl RdsCsvConverter {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }
}

impl EntryConverter for RdsCsvConverter {
    type Entry = CsvRow;

    const LAYOUT: RecordLayout = RecordLayout {
        key_order: KeyOrder::Fixed(FIELDS),
        user: UserPolicy::Always,
        parameter: ParameterPolicy::Never,
    };

    fn convert(&self, row: &CsvRow) -> Result<EntryOutcome, ExtractError> {
        let sql = row.get("SQL command")?;
        if let Some(reason) = first_rejection(RULES, sql, None) {
            return Ok(EntryOutcome::Ignore(reason));
        }

        let start_time = parse_local(
            row.get("execute time")?,
            CST_EXPORT_FORMAT,
            self.ctx.time_zone,
        )?;
        let cost = "cost time(microsecond)";
        Ok(EntryOutcome::Emit(NormalizedRecord {
            convert_sql_text: sql.to_string(),
            start_time,
            session: row.get("thread id")?.to_string(),
            exec_time: parse_integer(row.get(cost)?, cost)?,
            schema: row.get("db name")?.to_string(),
            user: Some(row.get("user")?.to_string()),
            parameter: None,
        }))
    }
}
