//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`TailmetricConfig`]에서 파이프라인이 필요로 하는
//! 값만 모아 평탄화한 설정입니다. 파서/선택기/싱크 변형은 여기서 한 번 결정되고
//! 사이클마다 다시 평가되지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use tailmetric_core::config::TailmetricConfig;
//! use tailmetric_log_pipeline::config::PipelineConfig;
//!
//! let core_config = TailmetricConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tailmetric_core::config::{ParserKind, SenderConfig, SourceKind, TailmetricConfig};

use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 후보 파일 선택 방식
    pub source: SourceKind,
    /// 라인 파서 종류
    pub parser: ParserKind,
    /// 로그 파일 디렉토리
    pub file_dir: PathBuf,
    /// 파일 이름 (pattern 모드에서는 대소문자 무시 비교)
    pub file_pattern: String,
    /// 읽기 위치 저장 파일 경로
    pub index_path: PathBuf,
    /// 파일당 사이클당 최대 읽기 라인 수 (0이면 제한 없음)
    pub max_lines_per_cycle: usize,
    /// field 파서 구분자
    pub field_separator: String,
    /// 상관관계 시작 이벤트 최대 보존 기간 (0이면 제한 없음)
    pub correlation_max_age: u64,
    /// 상관관계 시작 이벤트 상태 값
    pub correlation_start_token: String,
    /// 상관관계 종료 이벤트 상태 값
    pub correlation_end_token: String,
    /// 메트릭 이름
    pub metric_name: String,
    /// 전송 페이로드 템플릿
    pub metric_template: String,
    /// 싱크 설정
    pub sender: SenderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&TailmetricConfig::default())
    }
}

impl PipelineConfig {
    /// core의 `TailmetricConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &TailmetricConfig) -> Self {
        Self {
            source: core.collector.source,
            parser: core.collector.parser,
            file_dir: PathBuf::from(&core.collector.file_dir),
            file_pattern: core.collector.file_pattern.clone(),
            index_path: PathBuf::from(&core.collector.index_path),
            max_lines_per_cycle: core.collector.max_lines_per_cycle,
            field_separator: core.collector.field_separator.clone(),
            correlation_max_age: core.collector.correlation_max_age,
            correlation_start_token: core.collector.correlation_start_token.clone(),
            correlation_end_token: core.collector.correlation_end_token.clone(),
            metric_name: core.metric.name.clone(),
            metric_template: core.metric.template.clone(),
            sender: core.sender.clone(),
        }
    }

    /// 사이클당 읽기 상한. 0은 제한 없음.
    pub fn line_cap(&self) -> Option<u64> {
        (self.max_lines_per_cycle > 0).then_some(self.max_lines_per_cycle as u64)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.file_dir.as_os_str().is_empty() {
            return Err(config_error("file_dir", "must not be empty"));
        }

        let pattern = self.file_pattern.trim();
        if pattern.is_empty() {
            return Err(config_error("file_pattern", "must not be empty"));
        }
        if pattern.contains('/') || pattern == ".." {
            return Err(config_error(
                "file_pattern",
                "must be a file name, not a path",
            ));
        }

        if self.index_path.as_os_str().is_empty() {
            return Err(config_error("index_path", "must not be empty"));
        }

        if self.metric_template.trim().is_empty() {
            return Err(config_error("metric_template", "must not be empty"));
        }

        if self.parser == ParserKind::Field && self.field_separator.is_empty() {
            return Err(config_error("field_separator", "must not be empty"));
        }

        if self.parser == ParserKind::Correlation {
            let (start, end) = (
                self.correlation_start_token.as_str(),
                self.correlation_end_token.as_str(),
            );
            if start.trim().is_empty() || end.trim().is_empty() {
                return Err(config_error("correlation_tokens", "must not be empty"));
            }
            if start.contains(':') || end.contains(':') {
                return Err(config_error("correlation_tokens", "must not contain ':'"));
            }
            if start == end {
                return Err(config_error(
                    "correlation_tokens",
                    "start and end tokens must differ",
                ));
            }
        }

        if self.parser != ParserKind::Pattern && self.metric_name.trim().is_empty() {
            return Err(config_error("metric_name", "must not be empty"));
        }

        if self.sender.timeout_secs == 0 {
            return Err(config_error("sender.timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: &str) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 파이프라인 설정 빌더
///
/// 3개 이상의 설정 필드가 있으므로 빌더 패턴을 사용합니다.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 후보 파일 선택 방식을 설정합니다.
    pub fn source(mut self, source: SourceKind) -> Self {
        self.config.source = source;
        self
    }

    /// 라인 파서 종류를 설정합니다.
    pub fn parser(mut self, parser: ParserKind) -> Self {
        self.config.parser = parser;
        self
    }

    /// 로그 파일 디렉토리를 설정합니다.
    pub fn file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_dir = dir.into();
        self
    }

    /// 파일 이름을 설정합니다.
    pub fn file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.file_pattern = pattern.into();
        self
    }

    /// 읽기 위치 저장 파일 경로를 설정합니다.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// 사이클당 최대 읽기 라인 수를 설정합니다.
    pub fn max_lines_per_cycle(mut self, max: usize) -> Self {
        self.config.max_lines_per_cycle = max;
        self
    }

    /// field 파서 구분자를 설정합니다.
    pub fn field_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.field_separator = separator.into();
        self
    }

    /// 상관관계 시작 이벤트 최대 보존 기간을 설정합니다.
    pub fn correlation_max_age(mut self, max_age: u64) -> Self {
        self.config.correlation_max_age = max_age;
        self
    }

    /// 상관관계 시작/종료 이벤트 상태 값을 설정합니다.
    pub fn correlation_tokens(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.config.correlation_start_token = start.into();
        self.config.correlation_end_token = end.into();
        self
    }

    /// 메트릭 이름을 설정합니다.
    pub fn metric_name(mut self, name: impl Into<String>) -> Self {
        self.config.metric_name = name.into();
        self
    }

    /// 전송 페이로드 템플릿을 설정합니다.
    pub fn metric_template(mut self, template: impl Into<String>) -> Self {
        self.config.metric_template = template.into();
        self
    }

    /// 싱크 설정을 지정합니다.
    pub fn sender(mut self, sender: SenderConfig) -> Self {
        self.config.sender = sender;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
