//! 정규식 캡처 파서
//!
//! `<name> <value> <10자리 timestamp>` 형식의 라인에서 이름, 값, 타임스탬프를
//! 추출합니다. 메트릭 이름은 라인 자체에서 가져옵니다.
//!
//! ```text
//! ce_traffic_in 1532.5 1420070400
//! ```

use regex::Regex;
use tailmetric_core::pipeline::LineParser;
use tailmetric_core::types::MetricRecord;

use super::is_blank;
use crate::error::LogPipelineError;

const LINE_PATTERN: &str = r"^(?P<name>.+?) (?P<value>.+?) (?P<timestamp>\d{10})$";

/// 정규식 캡처 파서
#[derive(Debug, Clone)]
pub struct PatternParser {
    regex: Regex,
}

impl PatternParser {
    /// 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            regex: Regex::new(LINE_PATTERN)?,
        })
    }
}

impl LineParser for PatternParser {
    fn format_name(&self) -> &str {
        "pattern"
    }

    fn parse_line(&mut self, line: &str) -> Option<MetricRecord> {
        if is_blank(line) {
            tracing::debug!("skipping blank line");
            return None;
        }

        let Some(caps) = self.regex.captures(line) else {
            tracing::debug!(line, "line does not match pattern");
            return None;
        };

        let value = match caps["value"].parse::<f64>() {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(line, error = %e, "unparseable metric value");
                return None;
            }
        };
        let timestamp = caps["timestamp"].parse::<i64>().ok()?;

        Some(MetricRecord::new(&caps["name"], value, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PatternParser {
        PatternParser::new().unwrap()
    }

    #[test]
    fn extracts_name_value_and_timestamp() {
        let record = parser().parse_line("ce_traffic_in 1532.5 1420070400").unwrap();
        assert_eq!(record, MetricRecord::new("ce_traffic_in", 1532.5, 1_420_070_400));
    }

    #[test]
    fn extra_tokens_end_up_in_value_and_are_skipped() {
        assert!(parser().parse_line("ce traffic in 7 1420070400").is_none());
    }

    #[test]
    fn timestamp_must_have_ten_digits() {
        let mut p = parser();
        assert!(p.parse_line("ce_traffic_in 1 142007040").is_none());
        assert!(p.parse_line("ce_traffic_in 1 14200704001").is_none());
    }

    #[test]
    fn non_numeric_value_is_skipped() {
        assert!(parser().parse_line("ce_traffic_in many 1420070400").is_none());
    }

    #[test]
    fn blank_and_garbage_are_skipped() {
        let mut p = parser();
        assert!(p.parse_line("").is_none());
        assert!(p.parse_line("no timestamp here").is_none());
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
            fn well_formed_line_parses(
                name in "[a-z_]{1,20}",
                value in 0u32..1_000_000,
                ts in 1_000_000_000i64..9_999_999_999,
            ) {
                let line = format!("{name} {value} {ts}");
                let record = parser().parse_line(&line);
                prop_assert_eq!(record, Some(MetricRecord::new(name, f64::from(value), ts)));
            }
        }
    }
}
