//! 메트릭 페이로드 템플릿
//!
//! `${metric.name}`, `${metric.value}`, `${metric.timestamp}` 자리표시자를 레코드 값으로
//! 치환합니다. 알 수 없는 자리표시자와 닫히지 않은 `${`는 그대로 남습니다.
//!
//! 값은 Java `Double.toString`과 같은 모양으로 출력됩니다.
//! - `1e-3 <= |v| < 1e7`: 소수점을 항상 포함 (`50` -> `50.0`)
//! - 그 밖의 값: 지수 표기 (`1e20` -> `1.0E20`, `1.5e-7` -> `1.5E-7`)
//! - `NaN`, `Infinity`, `-Infinity`

use tailmetric_core::types::MetricRecord;

const OPEN: &str = "${";

/// 메트릭 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTemplate {
    template: String,
}

impl MetricTemplate {
    /// 새 템플릿을 생성합니다.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// 원본 템플릿 문자열
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// 레코드를 템플릿에 적용합니다.
    pub fn render(&self, record: &MetricRecord) -> String {
        let mut out = String::with_capacity(self.template.len() + 32);
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];

            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let placeholder = &after[..end];
            match placeholder {
                "metric.name" => out.push_str(&record.name),
                "metric.value" => out.push_str(&format_value(record.value)),
                "metric.timestamp" => out.push_str(&record.timestamp.to_string()),
                _ => out.push_str(&rest[start..start + OPEN.len() + end + 1]),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        out
    }
}

/// 메트릭 값을 문자열로 변환합니다.
pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }

    let magnitude = value.abs();
    if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{value:?}");
    }

    let scientific = format!("{value:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => scientific,
    }
}
