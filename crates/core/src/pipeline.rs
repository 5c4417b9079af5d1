//! 파이프라인 trait — 모듈 확장 포인트 정의

use std::future::Future;

use crate::error::SinkError;
use crate::types::MetricRecord;

/// 로그 라인 파서 trait
///
/// 원시 라인 하나를 0개 또는 1개의 메트릭 레코드로 변환합니다.
/// 빈 라인, 형식이 맞지 않는 라인, 상관관계 미스는 에러가 아니라 `None`입니다.
///
/// 파일 상태에 대한 부작용은 없어야 하며, 상태를 가진 파서는
/// 자기 내부 상태만 변경합니다.
pub trait LineParser: Send {
    /// 지원하는 라인 형식 이름
    fn format_name(&self) -> &str;

    /// 라인 하나를 파싱
    fn parse_line(&mut self, line: &str) -> Option<MetricRecord>;

    /// 직전 `parse_line`이 반환한 레코드의 전송이 실패했음을 알림
    ///
    /// 레코드를 만들면서 소비한 내부 상태를 되돌려, 같은 라인을 다시 읽었을 때
    /// 같은 레코드가 다시 생성되도록 합니다. 무상태 파서는 구현할 필요가 없습니다.
    fn rollback_last(&mut self) {}
}

/// 메트릭 싱크 trait
///
/// 메트릭 레코드 하나를 외부 시스템에 전달합니다.
/// 싱크는 시작 시 한 번 생성되어 모든 사이클에서 재사용됩니다.
pub trait MetricSink: Send + Sync {
    /// 싱크 이름 (로그/메트릭 레이블용)
    fn name(&self) -> &str;

    /// 메트릭 레코드 하나를 전송
    fn send(&self, record: &MetricRecord) -> impl Future<Output = Result<(), SinkError>> + Send;
}
