// src/formats/polarx_audit.rs - SQL audit events, one JSON object per line

use serde_json::Value;

use super::{as_object, json_opt_field, json_str, EntryConverter, ExtractContext};
use crate::error::ExtractError;
use crate::filter::{first_rejection, FilterRule, PLACEHOLDER, TRUNCATION_SUFFIX};
use crate::output_format::{Field, KeyOrder, ParameterPolicy, RecordLayout, UserPolicy};
use crate::pipeline::context::{EntryOutcome, NormalizedRecord};
use crate::timestamp::{parse_decimal_seconds_as_millis, parse_local, DOT_MILLIS_FORMAT};

const RULES: &[FilterRule] = &[
    FilterRule::TruncatedSuffix(TRUNCATION_SUFFIX),
    FilterRule::UnboundPlaceholder(PLACEHOLDER),
];

pub struct PolarxAuditConverter {
    ctx: ExtractContext,
}

impl PolarxAuditConverter {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }
}

impl EntryConverter for PolarxAuditConverter {
    type Entry = Value;

    const LAYOUT: RecordLayout = RecordLayout {
        key_order: KeyOrder::Fixed(&[
            Field::ConvertSqlText,
            Field::Parameter,
            Field::StartTime,
            Field::Session,
            Field::ExecTime,
            Field::Schema,
        ]),
        user: UserPolicy::Omit,
        parameter: ParameterPolicy::Always,
    };

    fn convert(&self, entry: &Value) -> Result<EntryOutcome, ExtractError> {
        let Some(obj) = as_object(entry)? else {
            return Ok(EntryOutcome::Empty);
        };

        let sql = json_str(obj, "sql")?;
        if !obj.contains_key("parameters") {
            return Err(ExtractError::MissingField("parameters".to_string()));
        }
        let parameter = json_opt_field(obj, "parameters")?;

        // Content rules run before the remaining fields are parsed.
        if let Some(reason) = first_rejection(RULES, &sql, parameter.as_deref()) {
            return Ok(EntryOutcome::Ignore(reason));
        }

        let start_time = parse_local(
            &json_str(obj, "sql_time")?,
            DOT_MILLIS_FORMAT,
            self.ctx.time_zone,
        )?;
        let session = format!(
            "{}:{}",
            json_str(obj, "client_ip")?,
            json_str(obj, "client_port")?
        );
        let exec_time =
            parse_decimal_seconds_as_millis(&json_str(obj, "response_time")?, "response_time")?;
        let schema = json_str(obj, "db_name")?.into_owned();

        Ok(EntryOutcome::Emit(NormalizedRecord {
            convert_sql_text: sql.into_owned(),
            start_time,
            session,
            exec_time,
            schema,
            user: None,
            parameter: parameter.map(|p| p.into_owned()),
        }))
    }
}
