//! 도메인 타입 — 파이프라인 전역에서 사용되는 공통 타입
//!
//! 파서가 생성하고 싱크가 소비하는 [`MetricRecord`]를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 로그 라인에서 추출된 메트릭 레코드
///
/// 파서가 생성한 뒤에는 변경되지 않으며, 싱크에서 정확히 한 번 소비됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// 메트릭 이름 (큐 싱크에서는 토픽 이름으로도 사용)
    pub name: String,
    /// 메트릭 값
    pub value: f64,
    /// 로그 라인에 기록된 타임스탬프 (원본 단위 그대로)
    pub timestamp: i64,
}

impl MetricRecord {
    /// 새 메트릭 레코드를 생성합니다.
    pub fn new(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
        }
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}@{}", self.name, self.value, self.timestamp)
    }
}
