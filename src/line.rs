/// Line classification for dstat output.
///
/// dstat (run with `--noheaders`) prints exactly two non-data lines before
/// streaming samples:
/// - a banner of dashed section labels (`----total-cpu-usage---- -dsk/total- ...`)
/// - a header of column names (`usr sys idl wai hiq siq| read  writ| ...`)
///
/// Everything after those two lines is a candidate data line.
use regex::Regex;
use std::sync::LazyLock;

/// Expected banner shape (line 0).
pub const BANNER_PATTERN: &str =
    r"^-*total-cpu-usage-* -*dsk/total-* -*net/total-* -*paging-* -*system-*\s*$";

/// Expected column header shape (line 1).
pub const HEADER_PATTERN: &str = r"^\s*usr\s+sys\s+idl\s+wai\s+hiq\s+siq\s+read\s+writ\s+recv\s+send\s+in\s+out\s+int\s+csw\s*$";

static BANNER: LazyLock<Regex> = LazyLock::new(|| Regex::new(BANNER_PATTERN).unwrap());

static HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(HEADER_PATTERN).unwrap());

/// What a given output line is expected to be, and whether it looks right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Line 0. `matched` is false when the banner has an unexpected shape.
    Banner { matched: bool },
    /// Line 1. `matched` is false when the columns differ from the known layout.
    Header { matched: bool },
    /// Line 2 onwards; shape is validated by the extractor.
    Data,
}

/// Classify a line by its zero-based position in the output stream.
pub fn classify(index: usize, text: &str) -> LineKind {
    match index {
        0 => LineKind::Banner {
            matched: BANNER.is_match(text),
        },
        1 => LineKind::Header {
            matched: HEADER.is_match(text),
        },
        _ => LineKind::Data,
    }
}
