/// Sample and schema types shared by the extractor, buffer and report writer.
use serde::Serialize;

/// Number of numeric fields in one dstat data line.
pub const FIELD_COUNT: usize = 14;

/// Schema labels, in the order reported by `meta_info()`.
///
/// The first label describes the sample timestamp; the remaining
/// `FIELD_COUNT` labels line up positionally with `Sample::values`.
pub const METRIC_LABELS: [&str; FIELD_COUNT + 1] = [
    "Time, ms",
    "cpu usr",
    "cpu sys",
    "cpu idl",
    "cpu wai",
    "cpu hiq",
    "cpu siq",
    "dsk read",
    "dsk writ",
    "net recv",
    "net send",
    "paging in",
    "paging out",
    "system int",
    "system csw",
];

/// One timestamped measurement extracted from a single data line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Wall-clock time the line was ingested, in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub values: [u64; FIELD_COUNT],
}

impl Sample {
    pub fn new(timestamp: i64, values: [u64; FIELD_COUNT]) -> Self {
        Self { timestamp, values }
    }

    /// Build a sample stamped with the current wall-clock time.
    pub fn now(values: [u64; FIELD_COUNT]) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), values)
    }

    /// Iterate `(label, value)` pairs, skipping the timestamp label.
    pub fn labeled(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        METRIC_LABELS[1..].iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_timestamp_plus_fields() {
        assert_eq!(METRIC_LABELS.len(), FIELD_COUNT + 1);
        assert_eq!(METRIC_LABELS[0], "Time, ms");
        assert_eq!(METRIC_LABELS[14], "system csw");
    }

    #[test]
    fn test_now_uses_current_time() {
        let before = chrono::Utc::now().timestamp_millis();
        let sample = Sample::now([0; FIELD_COUNT]);
        let after = chrono::Utc::now().timestamp_millis();
        assert!(sample.timestamp >= before && sample.timestamp <= after);
    }

    #[test]
    fn test_labeled_pairs_align_with_schema() {
        let mut values = [0u64; FIELD_COUNT];
        values[6] = 4096;
        let sample = Sample::new(1, values);
        let pairs: Vec<_> = sample.labeled().collect();
        assert_eq!(pairs.len(), FIELD_COUNT);
        assert_eq!(pairs[0], ("cpu usr", 0));
        assert_eq!(pairs[6], ("dsk read", 4096));
    }
}
