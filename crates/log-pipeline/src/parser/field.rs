//! 구분자 분리 파서
//!
//! `timestamp<sep>value` 형식의 라인을 파싱합니다. 필드 수는 정확히 2개여야 하며,
//! 메트릭 이름은 설정에서 가져옵니다.
//!
//! ```text
//! 1420070400:1532.5
//! ```

use tailmetric_core::pipeline::LineParser;
use tailmetric_core::types::MetricRecord;

use super::is_blank;

const FIELD_COUNT: usize = 2;

/// 구분자 분리 파서
#[derive(Debug, Clone)]
pub struct FieldParser {
    metric_name: String,
    separator: String,
}

impl FieldParser {
    /// 새 파서를 생성합니다.
    pub fn new(metric_name: &str, separator: &str) -> Self {
        Self {
            metric_name: metric_name.to_owned(),
            separator: separator.to_owned(),
        }
    }
}

impl LineParser for FieldParser {
    fn format_name(&self) -> &str {
        "field"
    }

    fn parse_line(&mut self, line: &str) -> Option<MetricRecord> {
        if is_blank(line) {
            tracing::debug!("skipping blank line");
            return None;
        }

        let fields: Vec<&str> = line.trim().split(self.separator.as_str()).collect();
        if fields.len() != FIELD_COUNT {
            tracing::debug!(line, fields = fields.len(), "line does not match field layout");
            return None;
        }

        let timestamp = fields[0].trim().parse::<i64>().ok()?;
        let value = fields[1].trim().parse::<f64>().ok()?;

        Some(MetricRecord::new(&self.metric_name, value, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FieldParser {
        FieldParser::new("throughput", ":")
    }

    #[test]
    fn parses_timestamp_and_value() {
        let record = parser().parse_line("1420070400:1532.5").unwrap();
        assert_eq!(record, MetricRecord::new("throughput", 1532.5, 1_420_070_400));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(parser().parse_line("  1420070400:7  ").is_some());
    }

    #[test]
    fn wrong_field_count_is_skipped() {
        let mut p = parser();
        assert!(p.parse_line("1420070400").is_none());
        assert!(p.parse_line("1420070400:1:2").is_none());
    }

    #[test]
    fn non_numeric_fields_are_skipped() {
        let mut p = parser();
        assert!(p.parse_line("yesterday:1").is_none());
        assert!(p.parse_line("1420070400:lots").is_none());
    }

    #[test]
    fn blank_line_is_skipped() {
        assert!(parser().parse_line("   ").is_none());
    }

    #[test]
    fn custom_separator() {
        let mut p = FieldParser::new("throughput", ";");
        assert_eq!(p.parse_line("10;2").unwrap().value, 2.0);
        assert!(p.parse_line("10:2").is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_line_does_not_panic(line in ".{0,256}") {
                let _ = parser().parse_line(&line);
            }

            #[test]
            fn valid_pair_always_parses(ts in any::<i64>(), value in -1.0e12f64..1.0e12) {
                let line = format!("{ts}:{value}");
                let record = parser().parse_line(&line);
                prop_assert!(record.is_some());
                prop_assert_eq!(record.unwrap().timestamp, ts);
            }
        }
    }
}
