//! 소켓 라인 싱크
//!
//! 전송마다 `host:port`에 TCP로 연결하여 렌더링된 페이로드와 줄바꿈을 쓰고,
//! flush 후 연결을 닫습니다. 연결부터 종료까지 전체가 `timeout_secs`로 제한됩니다.

use std::time::Duration;

use tailmetric_core::config::SenderConfig;
use tailmetric_core::error::SinkError;
use tailmetric_core::pipeline::MetricSink;
use tailmetric_core::types::MetricRecord;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::template::MetricTemplate;

/// 소켓 라인 싱크
#[derive(Debug, Clone)]
pub struct SocketSink {
    endpoint: String,
    template: MetricTemplate,
    timeout: Duration,
}

impl SocketSink {
    /// 새 싱크를 생성합니다.
    pub fn new(config: &SenderConfig, template: MetricTemplate) -> Self {
        Self {
            endpoint: config.endpoint(),
            template,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// 대상 주소
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn write_line(&self, payload: &str) -> Result<(), SinkError> {
        let mut stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| SinkError::Connect {
                addr: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let mut line = String::with_capacity(payload.len() + 1);
        line.push_str(payload);
        line.push('\n');

        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl MetricSink for SocketSink {
    fn name(&self) -> &str {
        "socket"
    }

    async fn send(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let payload = self.template.render(record);
        tracing::debug!(endpoint = %self.endpoint, payload = %payload, "writing metric line");

        timeout(self.timeout, self.write_line(&payload))
            .await
            .map_err(|_| SinkError::Timeout {
                addr: self.endpoint.clone(),
                secs: self.timeout.as_secs(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn sender_for(port: u16) -> SenderConfig {
        SenderConfig {
            address: "127.0.0.1".to_owned(),
            port,
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn writes_rendered_line() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        let sink = SocketSink::new(
            &sender_for(port),
            MetricTemplate::new("${metric.name} ${metric.value} ${metric.timestamp}"),
        );
        sink.send(&MetricRecord::new("throughput", 12.0, 1_420_070_400))
            .await
            .unwrap();

        assert_eq!(server.await.unwrap(), "throughput 12.0 1420070400\n");
    }

    #[tokio::test]
    async fn opens_one_connection_per_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let mut lines = Vec::new();
            for _ in 0..2 {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut received = String::new();
                stream.read_to_string(&mut received).await.unwrap();
                lines.push(received);
            }
            lines
        });

        let sink = SocketSink::new(&sender_for(port), MetricTemplate::new("${metric.value}"));
        sink.send(&MetricRecord::new("a", 1.0, 1)).await.unwrap();
        sink.send(&MetricRecord::new("a", 2.0, 2)).await.unwrap();

        assert_eq!(server.await.unwrap(), vec!["1.0\n", "2.0\n"]);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let sink = SocketSink::new(&sender_for(port), MetricTemplate::new("${metric.value}"));
        let err = sink.send(&MetricRecord::new("a", 1.0, 1)).await.unwrap_err();
        assert!(matches!(err, SinkError::Connect { .. }));
    }
}
