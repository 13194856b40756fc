// tests/conversion_tests.rs
use std::io::Cursor;

use auditlog_convert::chunking::TrailingEntry;
use auditlog_convert::{
    ConversionPipeline, ConversionStats, ConvertConfig, ConvertError, InputFormat, RecordWriter,
    TextEncoding, TimeZoneMode,
};
use chrono::FixedOffset;

fn config(format: InputFormat) -> ConvertConfig {
    ConvertConfig {
        time_zone: TimeZoneMode::Fixed(FixedOffset::east_opt(8 * 3600).unwrap()),
        ..ConvertConfig::for_format(format)
    }
}

fn convert(
    config: ConvertConfig,
    input: &[u8],
) -> Result<(Vec<String>, ConversionStats), ConvertError> {
    let mut pipeline = ConversionPipeline::new(config);
    let mut writer = RecordWriter::new(Vec::new(), 2);
    let stats = pipeline.process_stream(Cursor::new(input.to_vec()), &mut writer)?;
    let output = String::from_utf8(writer.into_inner()).unwrap();
    Ok((output.lines().map(str::to_string).collect(), stats))
}

fn cn_line(sql: &str, params: &str) -> String {
    format!(
        "2022-04-29 16:01:36.670 - [user=u,host=10.0.0.1,port=4000,schema=app]  [TDDL] [V3] [len={}] {} [len={}] {} # [rt=12,rows=1,type=000] # 1437, tddl version: 5.4.13",
        sql.len(),
        sql,
        params.len(),
        params
    )
}

#[test]
fn test_record_count_invariant() {
    let entries = [
        cn_line("select 1", "[]"),
        cn_line("select * from t where id = ?", "[]"),
        cn_line("select * from t where id = ?", "[7]"),
        cn_line("insert into t values (1),(2 ... +9 more", "[]"),
        cn_line("update t set a = 1", "[]"),
    ];
    let input = format!("{}\n", entries.join("\n"));
    let (lines, stats) = convert(
        ConvertConfig {
            trailing_entry: TrailingEntry::Emit,
            ..config(InputFormat::PolarxCn)
        },
        input.as_bytes(),
    )
    .unwrap();

    assert_eq!(stats.entries_seen, 5);
    assert_eq!(stats.records_ignored, 2);
    assert_eq!(lines.len(), stats.entries_seen - stats.records_ignored);
    assert!(stats.is_balanced());
    assert!(lines[1].contains("\"parameter\":\"[7]\""));
    assert!(lines.iter().all(|l| !l.contains(" more")));
}

#[test]
fn test_three_line_statement_becomes_one_record() {
    let header = "[2023-02-10 00:03:15,398] INFO [pool-1-thread-9] c.a.AccessLog.info - Client=10.1.1.1 Total_time=4 Exec_time=0 Queue_time=0 - [2023-02-10 00:03:15 398] 77";
    let input = format!(
        "{h} select a,\n    b\n  from t\\;process=1\n{h} select 2\\;process=2\n",
        h = header
    );
    let (lines, stats) = convert(config(InputFormat::AdbAccess), input.as_bytes()).unwrap();

    assert_eq!(stats.records_written, 1);
    let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(record["convertSqlText"], "select a,\nb\nfrom t");
    assert_eq!(record["session"], "Client=10.1.1.1[pool-1-thread-9]");
    assert_eq!(record["schema"], "cgljfl");
}

#[test]
fn test_last_entry_dropped_by_default() {
    let input = format!("{}\n{}\n", cn_line("select 1", "[]"), cn_line("select 2", "[]"));
    let (lines, stats) = convert(config(InputFormat::PolarxCn), input.as_bytes()).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(stats.entries_seen, 1);
    assert!(lines[0].contains("select 1"));
}

#[test]
fn test_malformed_multiline_entry_is_fatal() {
    let input = format!(
        "{}\n2022-04-29 16:01:37.000 - [user=u] no length markers\n{}\n{}\n",
        cn_line("select 1", "[]"),
        cn_line("select 3", "[]"),
        cn_line("select 4", "[]"),
    );
    let mut pipeline = ConversionPipeline::new(config(InputFormat::PolarxCn));
    let mut writer = RecordWriter::new(Vec::new(), 0);
    let err = pipeline
        .process_stream(Cursor::new(input), &mut writer)
        .unwrap_err();

    assert!(matches!(err, ConvertError::Malformed { line: 2, .. }));
    assert_eq!(pipeline.stats().records_written, 1);
    let output = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(output.lines().count(), 1);
    assert!(!output.contains("select 3"));
}

#[test]
fn test_rds_audit_user_and_passthrough_time() {
    let input = concat!(
        r#"{"client_ip":"100.104.205.126","db":"zkk_test","latency":"97","origin_time":"1659953787658842","sql":"select 1","thread_id":"302","user":"zkk_test"}"#,
        "\n",
        r#"{"client_ip":"100.104.205.126","db":"zkk_test","latency":"1","origin_time":"1659953787658843","sql":"login success","thread_id":"302","user":"zkk_test"}"#,
        "\n"
    );
    let (lines, stats) = convert(config(InputFormat::RdsAudit), input.as_bytes()).unwrap();
    assert_eq!(stats.records_ignored, 1);
    assert_eq!(
        lines,
        vec![r#"{"convertSqlText":"select 1","startTime":1659953787658842,"session":"302","execTime":97,"schema":"zkk_test","user":"zkk_test"}"#]
    );
}

#[test]
fn test_invalid_utf8_strict_and_lossy() {
    let mut input = b"client ip,db name,user,SQL command,thread id,cost time(microsecond),number of return,execute time,\n".to_vec();
    input.extend_from_slice(b"1.1.1.1,db,app,select '\xff',9,42,1,Fri Feb 03 16:50:30 CST 2023,\n");

    let strict = convert(config(InputFormat::RdsCsv), &input);
    assert!(matches!(strict, Err(ConvertError::IoError(_))));

    let (lines, _) = convert(
        ConvertConfig {
            encoding: TextEncoding::Utf8Lossy,
            ..config(InputFormat::RdsCsv)
        },
        &input,
    )
    .unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("select '\u{FFFD}'"));
}

#[test]
fn test_csv_space_after_delimiter_before_quoted_sql() {
    let input = "client ip, db name, user, SQL command, thread id, cost time(microsecond), number of return, execute time,\n\
                 1.1.1.1, db, app, \"select a, b from t\", 9, 42, 1, Fri Feb 03 16:50:30 CST 2023,\n\
                 1.1.1.1, db, app, \"\"\"quoted\"\"\", 9, 42, 1, Fri Feb 03 16:50:31 CST 2023,\n";
    let (lines, stats) = convert(config(InputFormat::RdsCsv), input.as_bytes()).unwrap();

    assert_eq!(stats.records_written, 2);
    assert_eq!(
        lines[0],
        r#"{"convertSqlText":"select a, b from t","startTime":1675414230000000,"session":"9","execTime":42,"schema":"db","user":"app"}"#
    );
    let record: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(record["convertSqlText"], "\"quoted\"");
}
