//! Entry-level content filters. A rejected entry is skipped, never fatal.

use std::fmt;

/// Suffix the servers append when they elide the rest of a long statement.
pub const TRUNCATION_SUFFIX: &str = " more";
pub const PLACEHOLDER: char = '?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRule {
    /// SQL ends with the given suffix.
    TruncatedSuffix(&'static str),
    /// SQL contains a placeholder but no parameters were captured.
    UnboundPlaceholder(char),
    /// SQL starts with an internal statement prefix.
    AdminPrefix(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptySql,
    Truncated,
    UnboundPlaceholder,
    Administrative(&'static str),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::EmptySql => write!(f, "empty sql"),
            IgnoreReason::Truncated => write!(f, "truncated sql"),
            IgnoreReason::UnboundPlaceholder => {
                write!(f, "sql with placeholders but no parameters")
            }
            IgnoreReason::Administrative(prefix) => write!(f, "internal '{}' statement", prefix),
        }
    }
}

impl FilterRule {
    pub fn check(&self, sql: &str, parameter: Option<&str>) -> Option<IgnoreReason> {
        match *self {
            FilterRule::TruncatedSuffix(suffix) => {
                sql.ends_with(suffix).then_some(IgnoreReason::Truncated)
            }
            FilterRule::UnboundPlaceholder(marker) => {
                let unbound = parameter.map_or(true, str::is_empty);
                (sql.contains(marker) && unbound).then_some(IgnoreReason::UnboundPlaceholder)
            }
            FilterRule::AdminPrefix(prefix) => sql
                .starts_with(prefix)
                .then_some(IgnoreReason::Administrative(prefix)),
        }
    }
}

/// First reason to reject the entry, if any. Empty SQL is always rejected.
pub fn first_rejection(
    rules: &[FilterRule],
    sql: &str,
    parameter: Option<&str>,
) -> Option<IgnoreReason> {
    if sql.trim().is_empty() {
        return Some(IgnoreReason::EmptySql);
    }
    rules.iter().find_map(|rule| rule.check(sql, parameter))
}
