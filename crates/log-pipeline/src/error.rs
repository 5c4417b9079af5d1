//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 테일링 파이프라인 내부에서 발생하는 에러를 표현합니다.
//! `From<LogPipelineError> for TailmetricError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 설정 에러를 제외한 모든 에러는 현재 라인/파일/사이클 안에서 처리되고
//! 다음 사이클에 영향을 주지 않습니다.

use tailmetric_core::error::{ConfigError, TailmetricError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 후보 파일 읽기 실패 (선택과 읽기 사이에 파일이 사라진 경우 등)
    #[error("read error: {path}: {reason}")]
    Read {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 후보 파일 탐색 실패 (디렉토리 나열 불가 등)
    #[error("select error: {dir}: {reason}")]
    Select {
        /// 탐색 디렉토리
        dir: String,
        /// 실패 사유
        reason: String,
    },

    /// 읽기 위치 저장 실패
    #[error("persistence error: {path}: {reason}")]
    Persistence {
        /// 위치 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for TailmetricError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                TailmetricError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Io(e) => TailmetricError::Io(e),
            other => TailmetricError::Pipeline(other.to_string()),
        }
    }
}
