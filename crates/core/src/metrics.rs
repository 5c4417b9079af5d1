//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tailmetric_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 싱크 레이블 키 (queue, socket)
pub const LABEL_SINK: &str = "sink";

/// 파서 형식 레이블 키 (field, pattern, correlation)
pub const LABEL_PARSER_FORMAT: &str = "format";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 사이클 메트릭 ──────────────────────────────────────────────────

/// 실행된 사이클 수 (counter)
pub const CYCLES_TOTAL: &str = "tailmetric_cycles_total";

/// 사이클 소요 시간 (histogram, 초)
pub const CYCLE_DURATION_SECONDS: &str = "tailmetric_cycle_duration_seconds";

/// 사이클당 후보 파일 수 (gauge)
pub const CANDIDATE_FILES: &str = "tailmetric_candidate_files";

// ─── 읽기/파싱 메트릭 ───────────────────────────────────────────────

/// 읽은 라인 수 (counter)
pub const LINES_READ_TOTAL: &str = "tailmetric_lines_read_total";

/// 파일 읽기 실패 수 (counter)
pub const READ_FAILURES_TOTAL: &str = "tailmetric_read_failures_total";

/// 파싱으로 생성된 메트릭 수 (counter, label: format)
pub const METRICS_PARSED_TOTAL: &str = "tailmetric_metrics_parsed_total";

/// 짝을 기다리는 상관관계 시작 이벤트 수 (gauge)
pub const CORRELATION_PENDING: &str = "tailmetric_correlation_pending";

/// 만료로 제거된 상관관계 시작 이벤트 수 (counter)
pub const CORRELATION_EVICTED_TOTAL: &str = "tailmetric_correlation_evicted_total";

// ─── 전송/위치 메트릭 ───────────────────────────────────────────────

/// 전송 시도 수 (counter, label: sink, result)
pub const SENDS_TOTAL: &str = "tailmetric_sends_total";

/// 위치 커밋 수 (counter, label: result)
pub const POSITION_COMMITS_TOTAL: &str = "tailmetric_position_commits_total";

/// 현재 커밋된 워터마크 라인 (gauge)
pub const WATERMARK_LINE: &str = "tailmetric_watermark_line";

// ─── 데몬 메트릭 ────────────────────────────────────────────────────

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "tailmetric_daemon_uptime_seconds";

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(CYCLES_TOTAL, "Total number of tailing cycles executed");
    describe_histogram!(
        CYCLE_DURATION_SECONDS,
        "Time to complete a single select-read-parse-send-commit cycle in seconds"
    );
    describe_gauge!(
        CANDIDATE_FILES,
        "Number of candidate files selected in the last cycle"
    );
    describe_counter!(LINES_READ_TOTAL, "Total number of new log lines read");
    describe_counter!(
        READ_FAILURES_TOTAL,
        "Total number of candidate files that could not be read"
    );
    describe_counter!(
        METRICS_PARSED_TOTAL,
        "Total number of metric records extracted from log lines"
    );
    describe_gauge!(
        CORRELATION_PENDING,
        "Number of start events waiting for their matching end event"
    );
    describe_counter!(
        CORRELATION_EVICTED_TOTAL,
        "Total number of start events evicted before a matching end event arrived"
    );
    describe_counter!(SENDS_TOTAL, "Total number of metric sends by sink and result");
    describe_counter!(
        POSITION_COMMITS_TOTAL,
        "Total number of read-position commits by result"
    );
    describe_gauge!(WATERMARK_LINE, "Last committed line number of the tracked file");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "tailmetric daemon uptime in seconds");
}
