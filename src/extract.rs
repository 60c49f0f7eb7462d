/// Numeric field extraction for dstat data lines.
///
/// A data line carries `FIELD_COUNT` whitespace-separated columns. The cpu,
/// paging and system columns are plain integers. The disk and network columns
/// may carry a one-letter magnitude suffix (`B`, `k`, `M`) which is
/// normalized to bytes. Parsing is all-or-nothing per line.
use crate::sample::FIELD_COUNT;
use regex::Regex;
use std::sync::LazyLock;

/// Zero-based positions of the columns that accept a magnitude suffix
/// (dsk read, dsk writ, net recv, net send).
const SUFFIXED_FIELDS: std::ops::Range<usize> = 6..10;

/// Full-line shape: `FIELD_COUNT` tokens, suffix letter allowed only on the
/// disk and network columns.
static DATA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let fields: Vec<&str> = (0..FIELD_COUNT)
        .map(|i| {
            if SUFFIXED_FIELDS.contains(&i) {
                r"(\d+[A-Za-z]?)"
            } else {
                r"(\d+)"
            }
        })
        .collect();
    Regex::new(&format!(r"^\s*{}\s*$", fields.join(r"\s+"))).unwrap()
});

/// Why a single field failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Empty,
    UnknownSuffix(char),
    Overflow,
    NotNumeric,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Empty => write!(f, "value is empty"),
            FieldError::UnknownSuffix(c) => write!(f, "unknown magnitude suffix '{c}'"),
            FieldError::Overflow => write!(f, "value does not fit in 64 bits"),
            FieldError::NotNumeric => write!(f, "value is not numeric"),
        }
    }
}

/// A data line that could not be turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong token count or a token outside the allowed character set.
    Shape { line: String },
    /// The line had the right shape but one field failed normalization.
    Field {
        line: String,
        /// Zero-based column index.
        index: usize,
        value: String,
        reason: FieldError,
    },
}

impl ParseError {
    /// The offending line, verbatim.
    pub fn line(&self) -> &str {
        match self {
            ParseError::Shape { line } | ParseError::Field { line, .. } => line,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Shape { line } => {
                write!(f, "line does not have {FIELD_COUNT} numeric fields: '{line}'")
            }
            ParseError::Field {
                line,
                index,
                value,
                reason,
            } => write!(
                f,
                "field {} ('{}') in line '{}': {}",
                index + 1,
                value,
                line,
                reason
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Extract the `FIELD_COUNT` values of a data line.
pub fn extract(text: &str) -> Result<[u64; FIELD_COUNT], ParseError> {
    let caps = DATA_LINE.captures(text).ok_or_else(|| ParseError::Shape {
        line: text.to_string(),
    })?;

    let mut values = [0u64; FIELD_COUNT];
    for (index, slot) in values.iter_mut().enumerate() {
        let token = caps.get(index + 1).map_or("", |m| m.as_str());
        let parsed = if SUFFIXED_FIELDS.contains(&index) {
            parse_magnitude(token)
        } else {
            parse_plain(token)
        };
        *slot = parsed.map_err(|reason| ParseError::Field {
            line: text.to_string(),
            index,
            value: token.to_string(),
            reason,
        })?;
    }
    Ok(values)
}

fn parse_plain(token: &str) -> Result<u64, FieldError> {
    if token.is_empty() {
        return Err(FieldError::Empty);
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::NotNumeric);
    }
    // digits only, so the only possible failure left is overflow
    token.parse::<u64>().map_err(|_| FieldError::Overflow)
}

/// Parse an integer with an optional magnitude suffix into a byte count.
///
/// No suffix or `B` means bytes, `k`/`K` kibibytes, `m`/`M` mebibytes.
pub fn parse_magnitude(token: &str) -> Result<u64, FieldError> {
    let last = token.chars().last().ok_or(FieldError::Empty)?;
    if last.is_ascii_digit() {
        return parse_plain(token);
    }

    let multiplier: u64 = match last {
        'B' => 1,
        'k' | 'K' => 1024,
        'm' | 'M' => 1_048_576,
        other => return Err(FieldError::UnknownSuffix(other)),
    };
    let digits = &token[..token.len() - last.len_utf8()];
    parse_plain(digits)?
        .checked_mul(multiplier)
        .ok_or(FieldError::Overflow)
}
