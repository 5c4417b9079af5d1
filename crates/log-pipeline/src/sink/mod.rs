//! 메트릭 싱크 모듈 -- 메트릭 레코드를 외부 시스템으로 전달
//!
//! 각 싱크는 core의 [`MetricSink`] trait을 구현합니다.
//! 싱크는 시작 시 한 번 생성되어 모든 사이클에서 재사용되지만,
//! 연결은 전송마다 새로 열고 닫습니다.
//!
//! # 지원 싱크
//! - [`StompSink`]: 메시지 브로커 토픽 발행 (STOMP 1.2)
//! - [`SocketSink`]: TCP 소켓 라인 쓰기
//!
//! 두 싱크 모두 [`MetricTemplate`]으로 레코드를 텍스트 페이로드로 렌더링합니다.

pub mod queue;
pub mod socket;
pub mod template;

pub use queue::StompSink;
pub use socket::SocketSink;
pub use template::MetricTemplate;

use tailmetric_core::config::{SenderConfig, SenderKind};
use tailmetric_core::error::SinkError;
use tailmetric_core::pipeline::MetricSink;
use tailmetric_core::types::MetricRecord;

/// 설정으로 선택되는 싱크
#[derive(Debug, Clone)]
pub enum MetricSender {
    /// 메시지 브로커 토픽
    Queue(StompSink),
    /// TCP 소켓 라인
    Socket(SocketSink),
}

impl MetricSender {
    /// 설정에 맞는 싱크를 생성합니다.
    pub fn from_config(config: &SenderConfig, template: MetricTemplate) -> Self {
        match config.kind {
            SenderKind::Queue => Self::Queue(StompSink::new(config, template)),
            SenderKind::Socket => Self::Socket(SocketSink::new(config, template)),
        }
    }

    /// 대상 주소
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Queue(s) => s.endpoint(),
            Self::Socket(s) => s.endpoint(),
        }
    }
}

impl MetricSink for MetricSender {
    fn name(&self) -> &str {
        match self {
            Self::Queue(s) => s.name(),
            Self::Socket(s) => s.name(),
        }
    }

    async fn send(&self, record: &MetricRecord) -> Result<(), SinkError> {
        match self {
            Self::Queue(s) => s.send(record).await,
            Self::Socket(s) => s.send(record).await,
        }
    }
}
