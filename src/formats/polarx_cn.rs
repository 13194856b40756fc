// src/formats/polarx_cn.rs - Compute-node SQL log
//
// 2022-04-29 16:01:36.670 - [user=u,host=10.181.88.16,port=40952,schema=test2]  [TDDL] [V3] [len=18] select * from t [len=2] [] # [rt=274721,rows=106,...] # 143786862cc10000, tddl version: 5.4.13

use once_cell::sync::Lazy;
use regex::Regex;

use super::{split_at_least, EntryConverter, ExtractContext};
use crate::error::ExtractError;
use crate::filter::{first_rejection, FilterRule, PLACEHOLDER, TRUNCATION_SUFFIX};
use crate::output_format::{Field, KeyOrder, ParameterPolicy, RecordLayout, UserPolicy};
use crate::pipeline::context::{EntryOutcome, NormalizedRecord};
use crate::timestamp::{parse_integer, parse_local, DOT_MILLIS_FORMAT};

static BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^20\d{2}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{3} - \[.*").unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static CLIENT_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r",|=|]").unwrap());
static LENGTH_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[len=\d+\]").unwrap());
static METRICS_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r" # \[rt=").unwrap());
static KEY_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r",|=").unwrap());

/// Parameter text the log writes for a statement without bind values.
const NO_PARAMETERS: &str = "[]";

const RULES: &[FilterRule] = &[
    FilterRule::UnboundPlaceholder(PLACEHOLDER),
    FilterRule::TruncatedSuffix(TRUNCATION_SUFFIX),
];

pub fn boundary() -> &'static Regex {
    &BOUNDARY
}

#[derive(Debug, PartialEq, Eq)]
pub struct ClientInfo {
    pub user: String,
    pub session: String,
    pub schema: String,
}

pub fn header_tokens(entry: &str) -> Result<Vec<&str>, ExtractError> {
    split_at_least(&WHITESPACE, entry, 4, "polarx header tokens")
}

pub fn start_time_text(tokens: &[&str]) -> String {
    format!("{} {}", tokens[0], tokens[1])
}

/// `[user=u,host=h,port=p,schema=s]` into user, `host:port` and schema.
pub fn client_info(token: &str) -> Result<ClientInfo, ExtractError> {
    let pieces = split_at_least(&CLIENT_SEPARATOR, token, 8, "polarx client block")?;
    Ok(ClientInfo {
        user: pieces[1].to_string(),
        session: format!("{}:{}", pieces[3], pieces[5]),
        schema: pieces[7].to_string(),
    })
}

/// SQL between the first two `[len=N]` markers, and what follows the second one.
pub fn sql_and_tail(entry: &str) -> Result<(&str, &str), ExtractError> {
    let pieces = split_at_least(&LENGTH_MARKER, entry, 3, "polarx length markers")?;
    Ok((pieces[1].trim(), pieces[2].trim()))
}

/// Parameter JSON text and the metrics footer after `# [rt=`.
pub fn parameters_and_metrics(tail: &str) -> Result<(&str, &str), ExtractError> {
    let pieces = split_at_least(&METRICS_MARKER, tail, 2, "polarx metrics footer")?;
    Ok((pieces[0], pieces[1]))
}

/// Leading `rt` value of the footer, in milliseconds, as microseconds.
pub fn exec_time(metrics: &str) -> Result<i64, ExtractError> {
    let pieces = split_at_least(&KEY_VALUE, metrics, 1, "polarx rt")?;
    Ok(parse_integer(pieces[0], "rt")? * 1000)
}

pub struct PolarxCnConverter {
    ctx: ExtractContext,
}

impl PolarxCnConverter {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }
}

impl EntryConverter for PolarxCnConverter {
    type Entry = str;

    const LAYOUT: RecordLayout = RecordLayout {
        key_order: KeyOrder::Fixed(&[
            Field::StartTime,
            Field::User,
            Field::Session,
            Field::Schema,
            Field::ExecTime,
            Field::ConvertSqlText,
            Field::Parameter,
        ]),
        user: UserPolicy::Always,
        parameter: ParameterPolicy::WhenPresent,
    };

    fn convert(&self, entry: &str) -> Result<EntryOutcome, ExtractError> {
        let tokens = header_tokens(entry)?;
        let start_time = parse_local(
            &start_time_text(&tokens),
            DOT_MILLIS_FORMAT,
            self.ctx.time_zone,
        )?;
        let client = client_info(tokens[3])?;
        let (sql, tail) = sql_and_tail(entry)?;
        let (parameters, metrics) = parameters_and_metrics(tail)?;
        let exec_time = exec_time(metrics)?;

        let parameter = (parameters != NO_PARAMETERS).then(|| parameters.to_string());
        if let Some(reason) = first_rejection(RULES, sql, parameter.as_deref()) {
            return Ok(EntryOutcome::Ignore(reason));
        }

        Ok(EntryOutcome::Emit(NormalizedRecord {
            convert_sql_text: sql.to_string(),
            start_time,
            session: client.session,
            exec_time,
            schema: client.schema,
            user: Some(client.user),
            parameter,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoreReason;
    use crate::timestamp::TimeZoneMode;
    use chrono::FixedOffset;

    const PREFIX: &str = "2022-04-29 16:01:36.670 - [user=dtacenter,host=10.181.88.16,port=40952,schema=test2]  [TDDL] [V3]";
    const FOOTER: &str = "# [rt=274,rows=106,type=000,frows=21,ts=1651219296393] # 143786862cc10000, tddl version: 5.4.13-16415631";

    fn converter() -> PolarxCnConverter {
        PolarxCnConverter::new(ExtractContext {
            time_zone: TimeZoneMode::Fixed(FixedOffset::east_opt(8 * 3600).unwrap()),
            default_schema: "unused".to_string(),
        })
    }

    fn entry(sql: &str, params: &str) -> String {
        format!(
            "{} [len={}] {} [len={}] {} {}",
            PREFIX,
            sql.len(),
            sql,
            params.len(),
            params,
            FOOTER
        )
    }

    #[test]
    fn test_boundary() {
        assert!(boundary().is_match(PREFIX));
        assert!(!boundary().is_match("values (1, 2)"));
        assert!(!boundary().is_match("2022-04-29 16:01:36.670 INFO no client block"));
    }

    #[test]
    fn test_client_info() {
        let info =
            client_info("[user=dtacenter,host=10.181.88.16,port=40952,schema=test2]").unwrap();
        assert_eq!(
            info,
            ClientInfo {
                user: "dtacenter".to_string(),
                session: "10.181.88.16:40952".to_string(),
                schema: "test2".to_string(),
            }
        );
        assert!(client_info("[user=dtacenter]").is_err());
    }

    #[test]
    fn test_exec_time() {
        assert_eq!(exec_time("274721,rows=106,type=000").unwrap(), 274_721_000);
        assert!(exec_time("fast,rows=1").is_err());
    }

    #[test]
    fn test_convert_without_parameters() {
        let outcome = converter().convert(&entry("select * from t", "[]")).unwrap();
        let EntryOutcome::Emit(record) = outcome else {
            panic!("expected a record, got {:?}", outcome);
        };
        assert_eq!(record.convert_sql_text, "select * from t");
        // 2022-04-29 08:01:36 UTC is 1651219296
        assert_eq!(record.start_time, 1_651_219_296_670_000);
        assert_eq!(record.session, "10.181.88.16:40952");
        assert_eq!(record.schema, "test2");
        assert_eq!(record.user.as_deref(), Some("dtacenter"));
        assert_eq!(record.exec_time, 274_000);
        assert_eq!(record.parameter, None);
    }

    #[test]
    fn test_convert_with_parameters() {
        let outcome = converter()
            .convert(&entry("select * from t where id = ?", "[42]"))
            .unwrap();
        let EntryOutcome::Emit(record) = outcome else {
            panic!("expected a record, got {:?}", outcome);
        };
        assert_eq!(record.parameter.as_deref(), Some("[42]"));
    }

    #[test]
    fn test_unbound_placeholder_ignored() {
        assert_eq!(
            converter()
                .convert(&entry("select * from t where id = ?", "[]"))
                .unwrap(),
            EntryOutcome::Ignore(IgnoreReason::UnboundPlaceholder)
        );
    }

    #[test]
    fn test_truncated_ignored() {
        assert_eq!(
            converter()
                .convert(&entry("insert into t values (1),(2),n... +83899 more", "[]"))
                .unwrap(),
            EntryOutcome::Ignore(IgnoreReason::Truncated)
        );
    }

    #[test]
    fn test_missing_metrics_footer_is_fatal() {
        let text = format!("{} [len=8] select 1 [len=2] []", PREFIX);
        assert!(matches!(
            converter().convert(&text),
            Err(ExtractError::MissingToken { rule: "polarx metrics footer", .. })
        ));
    }
}
