/// Rendering of collected samples for the collector binary's stdout.
use crate::config::OutputFormat;
use crate::sample::Sample;
use serde_json::{Map, Value};
use std::io::Write;

/// Writes a schema header once, then samples as they are drained.
pub struct ReportWriter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    /// CSV column header. JSON lines are self-describing and get no header.
    pub fn write_header(&mut self, meta: &[String]) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Csv => {
                let fields: Vec<String> = meta.iter().map(|m| csv_field(m)).collect();
                writeln!(self.out, "{}", fields.join(","))
            }
            OutputFormat::Json => Ok(()),
        }
    }

    pub fn write_samples(&mut self, samples: &[Sample]) -> std::io::Result<()> {
        for sample in samples {
            match self.format {
                OutputFormat::Csv => writeln!(self.out, "{}", csv_line(sample))?,
                OutputFormat::Json => {
                    serde_json::to_writer(&mut self.out, &json_value(sample))?;
                    writeln!(self.out)?;
                }
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Quote a header field when it contains the separator ("Time, ms").
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line(sample: &Sample) -> String {
    let mut line = sample.timestamp.to_string();
    for value in &sample.values {
        line.push(',');
        line.push_str(&value.to_string());
    }
    line
}

fn json_value(sample: &Sample) -> Value {
    let values: Map<String, Value> = sample
        .labeled()
        .map(|(label, value)| (label.to_string(), Value::from(value)))
        .collect();
    serde_json::json!({
        "timestamp": sample.timestamp,
        "values": values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::METRIC_LABELS;

    fn sample() -> Sample {
        Sample::new(
            1_700_000_000_123,
            [1, 2, 97, 0, 0, 0, 10_240, 0, 3, 7, 0, 0, 812, 1534],
        )
    }

    fn render(format: OutputFormat, samples: &[Sample]) -> String {
        let mut writer = ReportWriter::new(Vec::new(), format);
        let meta: Vec<String> = METRIC_LABELS.iter().map(|l| l.to_string()).collect();
        writer.write_header(&meta).unwrap();
        writer.write_samples(samples).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_csv_header_and_rows() {
        let text = render(OutputFormat::Csv, &[sample(), sample()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("\"Time, ms\",cpu usr,cpu sys,"));
        assert!(lines[0].ends_with(",system int,system csw"));
        assert_eq!(
            lines[1],
            "1700000000123,1,2,97,0,0,0,10240,0,3,7,0,0,812,1534"
        );
    }

    #[test]
    fn test_json_lines_are_keyed_by_label() {
        let text = render(OutputFormat::Json, &[sample()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);

        let v: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["timestamp"], 1_700_000_000_123i64);
        assert_eq!(v["values"]["dsk read"], 10_240);
        assert_eq!(v["values"]["system csw"], 1534);
        assert_eq!(v["values"].as_object().unwrap().len(), 14);
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("cpu usr"), "cpu usr");
        assert_eq!(csv_field("Time, ms"), "\"Time, ms\"");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_no_samples_writes_only_header() {
        assert_eq!(render(OutputFormat::Csv, &[]).lines().count(), 1);
        assert!(render(OutputFormat::Json, &[]).is_empty());
    }
}
