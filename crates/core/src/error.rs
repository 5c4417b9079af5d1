//! 에러 타입 — 도메인별 에러 정의
//!
//! 설정 에러만 프로세스에 치명적이며, 나머지는 현재 라인/파일/사이클 범위에서
//! 로그로 남기고 다음 스케줄 틱에서 계속 진행합니다.

/// tailmetric 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TailmetricError {
    /// 설정 관련 에러 (시작 시 치명적)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 메트릭 전송 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// 파이프라인 처리 에러 (읽기, 위치 저장 등)
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 메트릭 싱크 전송 에러
///
/// 전송 실패 시 해당 라인의 워터마크는 전진하지 않고 다음 사이클에서 재시도됩니다.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 원격 호스트 연결 실패
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// 원격 측이 메시지를 거부함 (브로커 ERROR 프레임 등)
    #[error("rejected by {addr}: {reason}")]
    Rejected { addr: String, reason: String },

    /// 제한 시간 초과
    #[error("timed out after {secs}s talking to {addr}")]
    Timeout { addr: String, secs: u64 },

    /// 프로토콜 위반 응답
    #[error("protocol error from {addr}: {reason}")]
    Protocol { addr: String, reason: String },

    /// 전송 중 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
