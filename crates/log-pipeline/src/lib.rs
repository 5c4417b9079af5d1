#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`position`]: 읽기 위치 저장소 (key=value 파일, 원자적 커밋)
//! - [`selector`]: 후보 파일 선택 (고정 경로, 디렉토리 패턴)
//! - [`reader`]: 워터마크 이후 라인 구간 읽기
//! - [`parser`]: 라인 -> 메트릭 변환 (field, pattern, correlation)
//! - [`sink`]: 메트릭 전송 (STOMP 토픽, TCP 소켓) 및 페이로드 템플릿
//! - [`pipeline`]: 사이클 오케스트레이션
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileSelector -> IncrementalReader -> LineParser -> MetricSink -> PositionStore
//!      |                                                              |
//!      +----------------------- watermark ----------------------------+
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod position;
pub mod reader;

pub mod parser;
pub mod selector;
pub mod sink;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{CycleReport, CycleState, TailPipeline, TailPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 위치 저장소
pub use position::{PositionRecord, PositionStore};

// 선택/읽기
pub use reader::{IncrementalReader, NumberedLine};
pub use selector::{Candidate, FileSelector};

// 파서
pub use parser::{AnyLineParser, CorrelationParser, FieldParser, PatternParser};

// 싱크
pub use sink::{MetricSender, MetricTemplate, SocketSink, StompSink};
