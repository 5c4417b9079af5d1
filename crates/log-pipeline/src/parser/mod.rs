//! 라인 파서 모듈 -- 로그 라인 하나를 0개 또는 1개의 메트릭으로 변환
//!
//! 각 파서는 core의 [`LineParser`] trait을 구현합니다.
//! 파싱 실패는 에러가 아니라 `None`이며, 다음 라인 처리에 영향을 주지 않습니다.
//!
//! # 지원 형식
//! - [`FieldParser`]: `timestamp:value` 구분자 분리 (무상태)
//! - [`PatternParser`]: `<name> <value> <10자리 timestamp>` 정규식 캡처 (무상태)
//! - [`CorrelationParser`]: `method:state:timestamp:key` 시작/종료 이벤트 쌍의 소요 시간 (상태 유지)
//!
//! # 사용 예시
//! ```ignore
//! use tailmetric_core::pipeline::LineParser;
//! use tailmetric_log_pipeline::parser::CorrelationParser;
//!
//! let mut parser = CorrelationParser::new("fcr_duration");
//! assert!(parser.parse_line("wyslijPlik:poczatek:100:f1").is_none());
//! let record = parser.parse_line("wyslijPlik:koniec:150:f1").unwrap();
//! assert_eq!(record.value, 50.0);
//! ```

pub mod correlation;
pub mod field;
pub mod pattern;

pub use correlation::CorrelationParser;
pub use field::FieldParser;
pub use pattern::PatternParser;

use tailmetric_core::config::ParserKind;
use tailmetric_core::pipeline::LineParser;
use tailmetric_core::types::MetricRecord;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 빈 라인 (공백 문자만 있는 라인) 여부
pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// 설정으로 선택되는 파서
///
/// 시작 시 한 번 결정되며 사이클마다 다시 평가하지 않습니다.
#[derive(Debug)]
pub enum AnyLineParser {
    /// 구분자 분리 파서
    Field(FieldParser),
    /// 정규식 캡처 파서
    Pattern(PatternParser),
    /// 시작/종료 이벤트 상관관계 파서
    Correlation(CorrelationParser),
}

impl AnyLineParser {
    /// 설정에 맞는 파서를 생성합니다.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        Ok(match config.parser {
            ParserKind::Field => Self::Field(FieldParser::new(
                &config.metric_name,
                &config.field_separator,
            )),
            ParserKind::Pattern => Self::Pattern(PatternParser::new()?),
            ParserKind::Correlation => Self::Correlation(
                CorrelationParser::new(&config.metric_name)
                    .with_markers(
                        &config.correlation_start_token,
                        &config.correlation_end_token,
                    )
                    .with_max_age(config.correlation_max_age),
            ),
        })
    }

    /// 짝을 기다리는 시작 이벤트 수. 상관관계 파서가 아니면 0입니다.
    pub fn pending_count(&self) -> usize {
        match self {
            Self::Correlation(p) => p.pending_count(),
            _ => 0,
        }
    }
}

impl LineParser for AnyLineParser {
    fn format_name(&self) -> &str {
        match self {
            Self::Field(p) => p.format_name(),
            Self::Pattern(p) => p.format_name(),
            Self::Correlation(p) => p.format_name(),
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<MetricRecord> {
        match self {
            Self::Field(p) => p.parse_line(line),
            Self::Pattern(p) => p.parse_line(line),
            Self::Correlation(p) => p.parse_line(line),
        }
    }

    fn rollback_last(&mut self) {
        if let Self::Correlation(p) = self {
            p.rollback_last();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" \t "));
        assert!(!is_blank(" x "));
    }

    #[test]
    fn from_config_selects_variant() {
        for (kind, name) in [
            (ParserKind::Field, "field"),
            (ParserKind::Pattern, "pattern"),
            (ParserKind::Correlation, "correlation"),
        ] {
            let config = PipelineConfig {
                parser: kind,
                ..Default::default()
            };
            let parser = AnyLineParser::from_config(&config).unwrap();
            assert_eq!(parser.format_name(), name);
        }
    }

    #[test]
    fn dispatch_reaches_inner_parser() {
        let config = PipelineConfig {
            parser: ParserKind::Correlation,
            metric_name: "fcr_duration".to_owned(),
            ..Default::default()
        };
        let mut parser = AnyLineParser::from_config(&config).unwrap();
        assert!(parser.parse_line("A:poczatek:100:f1").is_none());
        assert_eq!(parser.pending_count(), 1);

        let record = parser.parse_line("A:koniec:150:f1").unwrap();
        assert_eq!(record, MetricRecord::new("fcr_duration", 50.0, 150));
        assert_eq!(parser.pending_count(), 0);
    }

    #[test]
    fn configured_tokens_reach_correlation_parser() {
        let config = PipelineConfig {
            parser: ParserKind::Correlation,
            metric_name: "duration".to_owned(),
            correlation_start_token: "start".to_owned(),
            correlation_end_token: "end".to_owned(),
            ..Default::default()
        };
        let mut parser = AnyLineParser::from_config(&config).unwrap();
        assert!(parser.parse_line("A:start:100:f1").is_none());
        let record = parser.parse_line("A:end:150:f1").unwrap();
        assert_eq!(record, MetricRecord::new("duration", 50.0, 150));
    }

    #[test]
    fn rollback_is_forwarded_to_correlation_parser() {
        let config = PipelineConfig {
            parser: ParserKind::Correlation,
            metric_name: "fcr_duration".to_owned(),
            ..Default::default()
        };
        let mut parser = AnyLineParser::from_config(&config).unwrap();
        parser.parse_line("A:poczatek:100:f1");
        assert!(parser.parse_line("A:koniec:150:f1").is_some());

        parser.rollback_last();
        assert_eq!(parser.pending_count(), 1);
        assert!(parser.parse_line("A:koniec:150:f1").is_some());
    }
}
