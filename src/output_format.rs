use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::pipeline::context::NormalizedRecord;

pub const DEFAULT_FLUSH_INTERVAL: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ConvertSqlText,
    StartTime,
    Session,
    ExecTime,
    Schema,
    User,
    Parameter,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::ConvertSqlText,
        Field::StartTime,
        Field::Session,
        Field::ExecTime,
        Field::Schema,
        Field::User,
        Field::Parameter,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Field::ConvertSqlText => "convertSqlText",
            Field::StartTime => "startTime",
            Field::Session => "session",
            Field::ExecTime => "execTime",
            Field::Schema => "schema",
            Field::User => "user",
            Field::Parameter => "parameter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    /// Keys in lexicographic order.
    Sorted,
    /// Keys in the listed order.
    Fixed(&'static [Field]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserPolicy {
    /// The key never appears.
    Omit,
    /// The key always appears; a missing user is written as `""`.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPolicy {
    Never,
    /// Only when the entry carried a non-empty parameter blob.
    WhenPresent,
    /// Always; a missing blob is written as `""`.
    Always,
}

/// How one source format lays out its output object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub key_order: KeyOrder,
    pub user: UserPolicy,
    pub parameter: ParameterPolicy,
}

impl RecordLayout {
    fn keys(&self) -> Vec<Field> {
        match self.key_order {
            KeyOrder::Fixed(fields) => fields.to_vec(),
            KeyOrder::Sorted => {
                let mut fields = Field::ALL.to_vec();
                fields.sort_by_key(|f| f.key());
                fields
            }
        }
    }

    pub fn to_json(&self, record: &NormalizedRecord) -> Value {
        let mut obj = Map::new();
        for field in self.keys() {
            let value = match field {
                Field::ConvertSqlText => Value::from(record.convert_sql_text.as_str()),
                Field::StartTime => Value::from(record.start_time),
                Field::Session => Value::from(record.session.as_str()),
                Field::ExecTime => Value::from(record.exec_time),
                Field::Schema => Value::from(record.schema.as_str()),
                Field::User => match self.user {
                    UserPolicy::Omit => continue,
                    UserPolicy::Always => Value::from(record.user.as_deref().unwrap_or("")),
                },
                Field::Parameter => match (self.parameter, record.parameter.as_deref()) {
                    (ParameterPolicy::Never, _) => continue,
                    (ParameterPolicy::WhenPresent, None) => continue,
                    (ParameterPolicy::WhenPresent, Some("")) => continue,
                    (_, blob) => Value::from(blob.unwrap_or("")),
                },
            };
            obj.insert(field.key().to_string(), value);
        }
        Value::Object(obj)
    }
}

/// Newline-delimited JSON sink with a periodic explicit flush.
pub struct RecordWriter<W: Write> {
    output: W,
    flush_interval: usize,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(output: W, flush_interval: usize) -> Self {
        Self {
            output,
            flush_interval,
            written: 0,
        }
    }

    pub fn write_record(
        &mut self,
        record: &NormalizedRecord,
        layout: &RecordLayout,
    ) -> io::Result<()> {
        let json_line = serde_json::to_string(&layout.to_json(record))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(self.output, "{}", json_line)?;

        self.written += 1;
        if self.flush_interval > 0 && self.written % self.flush_interval == 0 {
            self.output.flush()?;
        }
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

/// Truncate the destination, then reopen it for appending.
pub fn open_destination(path: &Path, buffer_size: usize) -> io::Result<BufWriter<File>> {
    File::create(path)?;
    let file = OpenOptions::new().append(true).open(path)?;
    Ok(BufWriter::with_capacity(buffer_size, file))
}
