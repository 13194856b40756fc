/// Failure to pull one field out of a single logical entry.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("rule '{rule}' expected at least {expected} pieces, found {found}")]
    MissingToken {
        rule: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("field '{field}' must be a string or number, got {found}")]
    InvalidFieldType { field: String, found: String },

    #[error("invalid integer for {field}: '{text}'")]
    InvalidInteger {
        field: &'static str,
        text: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid decimal for {field}: '{text}'")]
    InvalidDecimal {
        field: &'static str,
        text: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("invalid timestamp '{text}' (expected {format})")]
    InvalidTimestamp {
        text: String,
        format: &'static str,
        #[source]
        source: chrono::ParseError,
    },

    #[error("timestamp '{0}' has no fractional seconds")]
    MissingFraction(String),

    #[error("local time '{0}' does not exist in the configured time zone")]
    NonexistentLocalTime(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that abort a conversion run.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed entry starting at line {line}: {source}")]
    Malformed {
        line: usize,
        entry: String,
        #[source]
        source: ExtractError,
    },

    #[error("entry starting at line {line} exceeds {limit} (set a larger limit or check the boundary pattern)")]
    EntryTooLarge { line: usize, limit: String },
}

impl ConvertError {
    pub fn malformed(line: usize, entry: impl Into<String>, source: ExtractError) -> Self {
        ConvertError::Malformed {
            line,
            entry: entry.into(),
            source,
        }
    }

    /// The raw entry text that triggered the failure, when there is one.
    pub fn offending_entry(&self) -> Option<&str> {
        match self {
            ConvertError::Malformed { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
