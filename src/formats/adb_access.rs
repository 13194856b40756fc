// src/formats/adb_access.rs - Analytic DB access log
//
// [2023-02-10 00:03:15,398] INFO [pool-38-thread-255] c.a.c.a.f.l.AccessLog.info - Client=100.81.136.152 Total_time=0 Exec_time=0 Queue_time=0 - [2023-02-10 00:03:15 398] 1000 select 1\;process=...\;CLUSTER=dailybuild

use once_cell::sync::Lazy;
use regex::Regex;

use super::{split_at_least, EntryConverter, ExtractContext};
use crate::error::ExtractError;
use crate::filter::{first_rejection, FilterRule, TRUNCATION_SUFFIX};
use crate::output_format::{KeyOrder, ParameterPolicy, RecordLayout, UserPolicy};
use crate::pipeline::context::{EntryOutcome, NormalizedRecord};
use crate::timestamp::{parse_integer, parse_local, COMMA_MILLIS_FORMAT};

static BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[20\d{2}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}\] .*").unwrap()
});

/// The inner request stamp (`[date time ms] <n> `) opens the SQL; `\;` closes it.
static SQL_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[20\d{2}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} \d{3}\] \d* |\\;").unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static KEY_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r",|=").unwrap());

const RULES: &[FilterRule] = &[
    FilterRule::TruncatedSuffix(TRUNCATION_SUFFIX),
    FilterRule::AdminPrefix("SYNC"),
];

pub fn boundary() -> &'static Regex {
    &BOUNDARY
}

/// Whitespace tokens of the header line: date, time, level, thread, logger, `-`, client, total time.
pub fn header_tokens(entry: &str) -> Result<Vec<&str>, ExtractError> {
    split_at_least(&WHITESPACE, entry, 8, "adb header tokens")
}

/// `[2023-02-10` + `00:03:15,398]` without the brackets.
pub fn start_time_text(tokens: &[&str]) -> String {
    let mut date = tokens[0].chars();
    date.next();
    let mut time = tokens[1].chars();
    time.next_back();
    format!("{} {}", date.as_str(), time.as_str())
}

/// Client token followed by the thread token, e.g. `Client=1.2.3.4[pool-1-thread-2]`.
pub fn session(tokens: &[&str]) -> String {
    format!("{}{}", tokens[6], tokens[3])
}

/// `Total_time=<ms>` in microseconds.
pub fn exec_time(tokens: &[&str]) -> Result<i64, ExtractError> {
    let pieces = split_at_least(&KEY_VALUE, tokens[7], 2, "adb total time")?;
    Ok(parse_integer(pieces[1], "Total_time")? * 1000)
}

pub fn sql_text(entry: &str) -> Result<&str, ExtractError> {
    let pieces = split_at_least(&SQL_SEPARATOR, entry, 2, "adb sql body")?;
    Ok(pieces[1].trim())
}

pub struct AdbAccessConverter {
    ctx: ExtractContext,
}

impl AdbAccessConverter {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }
}

impl EntryConverter for AdbAccessConverter {
    type Entry = str;

    const LAYOUT: RecordLayout = RecordLayout {
        key_order: KeyOrder::Sorted,
        user: UserPolicy::Always,
        parameter: ParameterPolicy::Never,
    };

    fn convert(&self, entry: &str) -> Result<EntryOutcome, ExtractError> {
        let tokens = header_tokens(entry)?;
        let start_time = parse_local(
            &start_time_text(&tokens),
            COMMA_MILLIS_FORMAT,
            self.ctx.time_zone,
        )?;
        let session = session(&tokens);
        let sql = sql_text(entry)?;
        let exec_time = exec_time(&tokens)?;

        if let Some(reason) = first_rejection(RULES, sql, None) {
            return Ok(EntryOutcome::Ignore(reason));
        }

        Ok(EntryOutcome::Emit(NormalizedRecord {
            convert_sql_text: sql.to_string(),
            start_time,
            session,
            exec_time,
            schema: self.ctx.default_schema.clone(),
            user: Some(String::new()),
            parameter: None,
        }))
    }
}
