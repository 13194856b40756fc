// src/formats/rds_audit.rs - RDS audit events, one JSON object per line

use serde_json::Value;

use super::{as_object, json_str, EntryConverter};
use crate::error::ExtractError;
use crate::filter::{first_rejection, FilterRule};
use crate::output_format::{Field, KeyOrder, ParameterPolicy, RecordLayout, UserPolicy};
use crate::pipeline::context::{EntryOutcome, NormalizedRecord};
use crate::timestamp::{parse_epoch_micros, parse_integer};

/// Shared by the JSON and CSV exports of the same audit stream.
pub(crate) const RULES: &[FilterRule] = &[FilterRule::AdminPrefix("log")];

pub(crate) const FIELDS: &[Field] = &[
    Field::ConvertSqlText,
    Field::StartTime,
    Field::Session,
    Field::ExecTime,
    Field::Schema,
    Field::User,
];

/// Every field is already numeric or verbatim, so no run settings are needed.
pub struct RdsAuditConverter;

impl EntryConverter for RdsAuditConverter {
    type Entry = Value;

    const LAYOUT: RecordLayout = RecordLayout {
        key_order: KeyOrder::Fixed(FIELDS),
        user: UserPolicy::Always,
        parameter: ParameterPolicy::Never,
    };

    fn convert(&self, entry: &Value) -> Result<EntryOutcome, ExtractError> {
        let Some(obj) = as_object(entry)? else {
            return Ok(EntryOutcome::Empty);
        };

        let sql = json_str(obj, "sql")?;
        if let Some(reason) = first_rejection(RULES, &sql, None) {
            return Ok(EntryOutcome::Ignore(reason));
        }

        Ok(EntryOutcome::Emit(NormalizedRecord {
            start_time: parse_epoch_micros(&json_str(obj, "origin_time")?, "origin_time")?,
            session: json_str(obj, "thread_id")?.into_owned(),
            exec_time: parse_integer(&json_str(obj, "latency")?, "latency")?,
            schema: json_str(obj, "db")?.into_owned(),
            user: Some(json_str(obj, "user")?.into_owned()),
            convert_sql_text: sql.into_owned(),
            parameter: None,
        }))
    }
}
