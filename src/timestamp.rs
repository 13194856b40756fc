use chrono::{FixedOffset, Local, LocalResult, NaiveDateTime, TimeZone};

use crate::error::ExtractError;

/// `2022-08-03 19:42:45.307`
pub const DOT_MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// `2023-02-10 00:03:15,398` (comma is normalized to a dot before parsing)
pub const COMMA_MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%f";
/// `Fri Feb 03 16:50:30 CST 2023`
pub const CST_EXPORT_FORMAT: &str = "%a %b %d %H:%M:%S CST %Y";

/// Which zone naive date strings are read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneMode {
    /// The zone of the machine running the conversion.
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl TimeZoneMode {
    fn to_epoch_micros(&self, naive: &NaiveDateTime, text: &str) -> Result<i64, ExtractError> {
        let resolved = match self {
            TimeZoneMode::Local => earliest(Local.from_local_datetime(naive)),
            TimeZoneMode::Fixed(offset) => earliest(offset.from_local_datetime(naive)),
        };
        resolved.ok_or_else(|| ExtractError::NonexistentLocalTime(text.to_string()))
    }
}

fn earliest<Tz: TimeZone>(result: LocalResult<chrono::DateTime<Tz>>) -> Option<i64> {
    result.earliest().map(|dt| dt.timestamp_micros())
}

/// Parse `±HH:MM` (or `Z`) into an offset.
pub fn parse_utc_offset(text: &str) -> Result<FixedOffset, String> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string());
    }
    let (sign, rest) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => return Err(format!("offset must start with + or -: '{}'", text)),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours
        .parse()
        .map_err(|_| format!("invalid offset hours: '{}'", text))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| format!("invalid offset minutes: '{}'", text))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| format!("offset out of range: '{}'", text))
}

/// Parse a naive date string into microseconds since the epoch.
///
/// `format` is one of the constants above. A `,%f` fraction is rewritten to
/// chrono's `%.f`, which accepts one to nine digits, so `,398` reads as 398ms.
pub fn parse_local(
    text: &str,
    format: &'static str,
    zone: TimeZoneMode,
) -> Result<i64, ExtractError> {
    let (input, chrono_format) = if format == COMMA_MILLIS_FORMAT {
        (text.replacen(',', ".", 1), DOT_MILLIS_FORMAT)
    } else {
        (text.to_string(), format)
    };

    // `%.f` also matches an absent fraction.
    if chrono_format == DOT_MILLIS_FORMAT && !has_fraction(&input) {
        return Err(ExtractError::MissingFraction(text.to_string()));
    }

    let naive = NaiveDateTime::parse_from_str(&input, chrono_format).map_err(|source| {
        ExtractError::InvalidTimestamp {
            text: text.to_string(),
            format,
            source,
        }
    })?;
    zone.to_epoch_micros(&naive, text)
}

fn has_fraction(text: &str) -> bool {
    text.rsplit(':').next().is_some_and(|seconds| seconds.contains('.'))
}

/// Epoch microseconds already rendered as an integer string.
pub fn parse_epoch_micros(text: &str, field: &'static str) -> Result<i64, ExtractError> {
    parse_integer(text, field)
}

pub fn parse_integer(text: &str, field: &'static str) -> Result<i64, ExtractError> {
    text.trim()
        .parse::<i64>()
        .map_err(|source| ExtractError::InvalidInteger {
            field,
            text: text.to_string(),
            source,
        })
}

/// Decimal seconds scaled by 1000 and truncated toward zero: `"0.029"` gives 29.
pub fn parse_decimal_seconds_as_millis(
    text: &str,
    field: &'static str,
) -> Result<i64, ExtractError> {
    let seconds = text
        .trim()
        .parse::<f64>()
        .map_err(|source| ExtractError::InvalidDecimal {
            field,
            text: text.to_string(),
            source,
        })?;
    Ok((seconds * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn east8() -> TimeZoneMode {
        TimeZoneMode::Fixed(FixedOffset::east_opt(8 * 3600).unwrap())
    }

    #[test]
    fn test_dot_millis_in_fixed_zone() {
        // 2022-08-03 11:42:45 UTC is 1659526965
        let micros = parse_local("2022-08-03 19:42:45.307", DOT_MILLIS_FORMAT, east8()).unwrap();
        assert_eq!(micros, 1_659_526_965_307_000);
    }

    #[test]
    fn test_comma_millis_in_fixed_zone() {
        // 2023-02-09 16:03:15 UTC is 1675958595
        let micros = parse_local("2023-02-10 00:03:15,398", COMMA_MILLIS_FORMAT, east8()).unwrap();
        assert_eq!(micros, 1_675_958_595_398_000);
    }

    #[test]
    fn test_short_fraction_is_scaled() {
        let utc = TimeZoneMode::Fixed(FixedOffset::east_opt(0).unwrap());
        let micros = parse_local("1970-01-01 00:00:01.5", DOT_MILLIS_FORMAT, utc).unwrap();
        assert_eq!(micros, 1_500_000);
    }

    #[test]
    fn test_cst_export_format() {
        // 2023-02-03 08:50:30 UTC is 1675414230
        let micros =
            parse_local("Fri Feb 03 16:50:30 CST 2023", CST_EXPORT_FORMAT, east8()).unwrap();
        assert_eq!(micros, 1_675_414_230_000_000);
    }

    #[test]
    fn test_local_zone_matches_chrono_local() {
        let naive =
            NaiveDateTime::parse_from_str("2022-08-03 19:42:45.307", DOT_MILLIS_FORMAT).unwrap();
        let expected = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap()
            .timestamp_micros();
        let micros =
            parse_local("2022-08-03 19:42:45.307", DOT_MILLIS_FORMAT, TimeZoneMode::Local).unwrap();
        assert_eq!(micros, expected);
        assert_eq!(micros % 1_000_000, 307_000);
    }

    #[test]
    fn test_fraction_is_required() {
        for (text, format) in [
            ("2022-08-03 19:42:45", DOT_MILLIS_FORMAT),
            ("2023-02-10 00:03:15", COMMA_MILLIS_FORMAT),
        ] {
            assert!(matches!(
                parse_local(text, format, east8()),
                Err(ExtractError::MissingFraction(t)) if t == text
            ));
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        let err =
            parse_local("2022/08/03 19:42:45.307", DOT_MILLIS_FORMAT, east8()).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_decimal_seconds() {
        assert_eq!(parse_decimal_seconds_as_millis("0.029", "rt").unwrap(), 29);
        assert_eq!(parse_decimal_seconds_as_millis("1.5", "rt").unwrap(), 1500);
        assert_eq!(parse_decimal_seconds_as_millis("0", "rt").unwrap(), 0);
        assert!(parse_decimal_seconds_as_millis("fast", "rt").is_err());
    }

    #[test]
    fn test_epoch_passthrough() {
        assert_eq!(
            parse_epoch_micros("1659953787658842", "origin_time").unwrap(),
            1_659_953_787_658_842
        );
        assert!(parse_epoch_micros("16599x", "origin_time").is_err());
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("08:00").is_err());
    }
}
