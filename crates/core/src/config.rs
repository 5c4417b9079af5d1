//! 설정 관리 — tailmetric.toml 파싱 및 런타임 설정
//!
//! [`TailmetricConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TAILMETRIC_SENDER_ADDRESS=10.0.0.5` 형식)
//! 3. 설정 파일 (`tailmetric.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tailmetric_core::error::TailmetricError> {
//! use tailmetric_core::config::TailmetricConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TailmetricConfig::load("tailmetric.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TailmetricConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TailmetricError};

/// 폴링 주기 상한 (초)
const MAX_CHECKING_INTERVAL_SECS: u64 = 86_400;

/// tailmetric 통합 설정
///
/// `tailmetric.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailmetricConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 파일 수집 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// 메트릭 이름/템플릿 설정
    #[serde(default)]
    pub metric: MetricConfig,
    /// 전송 싱크 설정
    #[serde(default)]
    pub sender: SenderConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl TailmetricConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailmetricError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 읽습니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailmetricError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailmetricError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailmetricError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TailmetricError> {
        toml::from_str(toml_str).map_err(|e| {
            TailmetricError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TAILMETRIC_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TAILMETRIC_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILMETRIC_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "TAILMETRIC_GENERAL_PID_FILE");

        // Collector
        override_parsed(&mut self.collector.source, "TAILMETRIC_COLLECTOR_SOURCE");
        override_parsed(&mut self.collector.parser, "TAILMETRIC_COLLECTOR_PARSER");
        override_string(&mut self.collector.file_dir, "TAILMETRIC_COLLECTOR_FILE_DIR");
        override_string(
            &mut self.collector.file_pattern,
            "TAILMETRIC_COLLECTOR_FILE_PATTERN",
        );
        override_string(
            &mut self.collector.index_path,
            "TAILMETRIC_COLLECTOR_INDEX_PATH",
        );
        override_parsed(
            &mut self.collector.checking_interval_secs,
            "TAILMETRIC_COLLECTOR_CHECKING_INTERVAL_SECS",
        );
        override_parsed(
            &mut self.collector.max_lines_per_cycle,
            "TAILMETRIC_COLLECTOR_MAX_LINES_PER_CYCLE",
        );
        override_string(
            &mut self.collector.field_separator,
            "TAILMETRIC_COLLECTOR_FIELD_SEPARATOR",
        );
        override_parsed(
            &mut self.collector.correlation_max_age,
            "TAILMETRIC_COLLECTOR_CORRELATION_MAX_AGE",
        );
        override_string(
            &mut self.collector.correlation_start_token,
            "TAILMETRIC_COLLECTOR_CORRELATION_START_TOKEN",
        );
        override_string(
            &mut self.collector.correlation_end_token,
            "TAILMETRIC_COLLECTOR_CORRELATION_END_TOKEN",
        );

        // Metric
        override_string(&mut self.metric.name, "TAILMETRIC_METRIC_NAME");
        override_string(&mut self.metric.template, "TAILMETRIC_METRIC_TEMPLATE");

        // Sender
        override_parsed(&mut self.sender.kind, "TAILMETRIC_SENDER_KIND");
        override_string(&mut self.sender.address, "TAILMETRIC_SENDER_ADDRESS");
        override_parsed(&mut self.sender.port, "TAILMETRIC_SENDER_PORT");
        override_string(&mut self.sender.username, "TAILMETRIC_SENDER_USERNAME");
        override_string(&mut self.sender.password, "TAILMETRIC_SENDER_PASSWORD");
        override_parsed(
            &mut self.sender.timeout_secs,
            "TAILMETRIC_SENDER_TIMEOUT_SECS",
        );

        // Metrics
        override_parsed(&mut self.metrics.enabled, "TAILMETRIC_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "TAILMETRIC_METRICS_LISTEN_ADDR",
        );
        override_parsed(&mut self.metrics.port, "TAILMETRIC_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailmetricError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        require_non_blank("collector.file_dir", &self.collector.file_dir)?;
        require_non_blank("collector.file_pattern", &self.collector.file_pattern)?;
        require_non_blank("collector.index_path", &self.collector.index_path)?;
        require_non_blank("metric.template", &self.metric.template)?;

        if self.collector.checking_interval_secs == 0
            || self.collector.checking_interval_secs > MAX_CHECKING_INTERVAL_SECS
        {
            return Err(invalid(
                "collector.checking_interval_secs",
                format!("must be 1-{}", MAX_CHECKING_INTERVAL_SECS),
            ));
        }

        if self.collector.parser == ParserKind::Field && self.collector.field_separator.is_empty()
        {
            return Err(invalid(
                "collector.field_separator",
                "must not be empty for the field parser".to_owned(),
            ));
        }

        if self.collector.parser == ParserKind::Correlation {
            validate_correlation_tokens(
                &self.collector.correlation_start_token,
                &self.collector.correlation_end_token,
            )?;
        }

        // 패턴 파서는 라인에서 이름을 얻으므로 metric.name이 필요 없음
        if self.collector.parser != ParserKind::Pattern {
            require_non_blank("metric.name", &self.metric.name)?;
        }

        require_non_blank("sender.address", &self.sender.address)?;
        if self.sender.port == 0 {
            return Err(invalid("sender.port", "must not be 0".to_owned()));
        }
        if self.sender.timeout_secs == 0 {
            return Err(invalid(
                "sender.timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.sender.kind == SenderKind::Queue {
            require_non_blank("sender.username", &self.sender.username)?;
            require_non_blank("sender.password", &self.sender.password)?;
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> TailmetricError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 상관관계 상태 값 검증: 비어 있지 않고, `:`를 포함하지 않으며, 서로 달라야 함
fn validate_correlation_tokens(start: &str, end: &str) -> Result<(), TailmetricError> {
    for (field, token) in [
        ("collector.correlation_start_token", start),
        ("collector.correlation_end_token", end),
    ] {
        require_non_blank(field, token)?;
        if token.contains(':') {
            return Err(invalid(field, "must not contain ':'".to_owned()));
        }
    }
    if start == end {
        return Err(invalid(
            "collector.correlation_end_token",
            "must differ from correlation_start_token".to_owned(),
        ));
    }
    Ok(())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), TailmetricError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "value must be set".to_owned()));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 사용 안 함)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 후보 파일 선택 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceKind {
    /// `file_dir` 안의 단일 파일 `file_pattern`
    #[default]
    Fixed,
    /// `file_dir`를 나열해 이름이 `file_pattern`과 (대소문자 무시) 같은 파일들
    Pattern,
}

/// 라인 파서 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParserKind {
    /// 구분자 분할 파서 (`timestamp:value`)
    #[default]
    Field,
    /// 정규식 캡처 파서 (`name value timestamp`)
    Pattern,
    /// 시작/종료 이벤트 상관관계 파서 (`method:state:timestamp:key`)
    Correlation,
}

/// 메트릭 싱크 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SenderKind {
    /// 메시지 브로커 토픽 발행 (STOMP)
    Queue,
    /// TCP 소켓 라인 쓰기
    #[default]
    Socket,
}

macro_rules! kind_str_impls {
    ($ty:ident { $($variant:ident => $name:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $ty {
            /// 설정 파일에서 사용하는 이름
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name $(| $alias)* => Ok(Self::$variant),)+
                    other => Err(ConfigError::InvalidValue {
                        field: stringify!($ty).to_owned(),
                        reason: format!(
                            "unsupported value '{}', expected one of: {}",
                            other,
                            [$($name),+].join(", ")
                        ),
                    }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_owned()
            }
        }
    };
}

kind_str_impls!(SourceKind { Fixed => "fixed", Pattern => "pattern" });
kind_str_impls!(ParserKind {
    Field => "field" | "throughput",
    Pattern => "pattern" | "ce_traffic",
    Correlation => "correlation" | "fcr",
});
kind_str_impls!(SenderKind { Queue => "queue" | "jms", Socket => "socket" | "telnet" });

/// 로그 파일 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 후보 파일 선택 방식
    pub source: SourceKind,
    /// 라인 파서 종류
    pub parser: ParserKind,
    /// 로그 파일 디렉토리
    pub file_dir: String,
    /// 파일 이름 (pattern 모드에서는 대소문자 무시 비교)
    pub file_pattern: String,
    /// 읽기 위치 저장 파일 경로
    pub index_path: String,
    /// 사이클 실행 주기 (초)
    pub checking_interval_secs: u64,
    /// 파일당 사이클당 최대 읽기 라인 수 (0이면 제한 없음)
    pub max_lines_per_cycle: usize,
    /// field 파서의 필드 구분자
    pub field_separator: String,
    /// 상관관계 시작 이벤트 최대 보존 기간 (타임스탬프 단위, 0이면 제한 없음)
    pub correlation_max_age: u64,
    /// 상관관계 시작 이벤트 상태 값
    pub correlation_start_token: String,
    /// 상관관계 종료 이벤트 상태 값
    pub correlation_end_token: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Fixed,
            parser: ParserKind::Field,
            file_dir: "/var/log/tailmetric".to_owned(),
            file_pattern: "metrics.log".to_owned(),
            index_path: "/var/lib/tailmetric/file-index.properties".to_owned(),
            checking_interval_secs: 60,
            max_lines_per_cycle: 0,
            field_separator: ":".to_owned(),
            correlation_max_age: 0,
            correlation_start_token: "poczatek".to_owned(),
            correlation_end_token: "koniec".to_owned(),
        }
    }
}

/// 메트릭 이름/템플릿 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// 메트릭 이름 (field/correlation 파서)
    pub name: String,
    /// 전송 페이로드 템플릿
    ///
    /// `${metric.name}`, `${metric.value}`, `${metric.timestamp}` 치환
    pub template: String,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            name: "tailmetric_metric".to_owned(),
            template: "${metric.name} ${metric.value} ${metric.timestamp}".to_owned(),
        }
    }
}

/// 전송 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// 싱크 종류
    pub kind: SenderKind,
    /// 원격 호스트
    pub address: String,
    /// 원격 포트
    pub port: u16,
    /// 브로커 사용자 (queue 싱크)
    pub username: String,
    /// 브로커 비밀번호 (queue 싱크)
    pub password: String,
    /// 연결/쓰기 제한 시간 (초)
    pub timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            kind: SenderKind::Socket,
            address: "127.0.0.1".to_owned(),
            port: 2003,
            username: String::new(),
            password: String::new(),
            timeout_secs: 10,
        }
    }
}

impl SenderConfig {
    /// `host:port` 형식의 원격 주소
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Prometheus 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9102,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse value from env var, ignoring"
            ),
        }
    }
}
