// src/formats/mod.rs
//! One field extractor per source format.
//!
//! Every extractor turns one logical entry into an [`EntryOutcome`]. Structural
//! problems come back as [`ExtractError`] and abort the run; content rules
//! (truncation, placeholders, internal statements) come back as
//! [`EntryOutcome::Ignore`].

pub mod adb_access;
pub mod polarx_audit;
pub mod polarx_cn;
pub mod rds_audit;
pub mod rds_csv;

use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::error::ExtractError;
use crate::output_format::RecordLayout;
use crate::pipeline::config::ConvertConfig;
use crate::pipeline::context::EntryOutcome;
use crate::timestamp::TimeZoneMode;

pub use adb_access::AdbAccessConverter;
pub use polarx_audit::PolarxAuditConverter;
pub use polarx_cn::PolarxCnConverter;
pub use rds_audit::RdsAuditConverter;
pub use rds_csv::{CsvRow, RdsCsvConverter};

/// Converts one logical entry of a single source format.
pub trait EntryConverter {
    type Entry: ?Sized;

    /// Output key order and optional-field policy for this format.
    const LAYOUT: RecordLayout;

    fn convert(&self, entry: &Self::Entry) -> Result<EntryOutcome, ExtractError>;
}

/// Settings the extractors need from the run configuration.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub time_zone: TimeZoneMode,
    pub default_schema: String,
}

impl From<&ConvertConfig> for ExtractContext {
    fn from(config: &ConvertConfig) -> Self {
        ExtractContext {
            time_zone: config.time_zone,
            default_schema: config.default_schema.clone(),
        }
    }
}

impl Default for ExtractContext {
    fn default() -> Self {
        ExtractContext::from(&ConvertConfig::default())
    }
}

/// Split `text` by `pattern`, requiring at least `expected` pieces.
pub(crate) fn split_at_least<'t>(
    pattern: &Regex,
    text: &'t str,
    expected: usize,
    rule: &'static str,
) -> Result<Vec<&'t str>, ExtractError> {
    let pieces: Vec<&str> = pattern.split(text).collect();
    if pieces.len() < expected {
        return Err(ExtractError::MissingToken {
            rule,
            expected,
            found: pieces.len(),
        });
    }
    Ok(pieces)
}

/// View a parsed JSON line as an object. `None` for `{}`.
pub(crate) fn as_object(value: &Value) -> Result<Option<&Map<String, Value>>, ExtractError> {
    match value {
        Value::Object(obj) if obj.is_empty() => Ok(None),
        Value::Object(obj) => Ok(Some(obj)),
        other => Err(ExtractError::NotAnObject(json_type_name(other))),
    }
}

/// Required field rendered as text. Numbers are accepted in place of strings.
pub(crate) fn json_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<Cow<'a, str>, ExtractError> {
    match obj.get(key) {
        None => Err(ExtractError::MissingField(key.to_string())),
        Some(value) => json_opt_str(key, value)?
            .ok_or_else(|| ExtractError::InvalidFieldType {
                field: key.to_string(),
                found: "null".to_string(),
            }),
    }
}

/// Optional field: absent or null gives `None`.
pub(crate) fn json_opt_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<Cow<'a, str>>, ExtractError> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => json_opt_str(key, value),
    }
}

fn json_opt_str<'a>(key: &str, value: &'a Value) -> Result<Option<Cow<'a, str>>, ExtractError> {
    match value {
        Value::String(s) => Ok(Some(Cow::Borrowed(s.as_str()))),
        Value::Number(n) => Ok(Some(Cow::Owned(n.to_string()))),
        Value::Null => Ok(None),
        other => Err(ExtractError::InvalidFieldType {
            field: key.to_string(),
            found: json_type_name(other).to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
