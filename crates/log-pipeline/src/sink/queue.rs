//! 메시지 큐 토픽 싱크 (STOMP 1.2)
//!
//! 전송마다 브로커에 연결하여 메트릭 이름의 토픽(`/topic/<name>`)에 렌더링된
//! 페이로드를 발행하고 연결을 닫습니다.
//!
//! # 교환 순서
//! ```text
//! client                         broker
//!   CONNECT (login, passcode) ->
//!                             <- CONNECTED | ERROR
//!   SEND (destination, receipt) ->
//!                             <- RECEIPT (receipt-id) | ERROR
//!   DISCONNECT ->
//! ```
//!
//! RECEIPT를 받은 시점에 전송 성공으로 간주합니다. 전체 교환은 `timeout_secs`로 제한됩니다.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tailmetric_core::config::SenderConfig;
use tailmetric_core::error::SinkError;
use tailmetric_core::pipeline::MetricSink;
use tailmetric_core::types::MetricRecord;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::template::MetricTemplate;

/// 토픽 destination 접두사
pub const TOPIC_PREFIX: &str = "/topic/";

/// 브로커에서 받을 수 있는 최대 프레임 크기
const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// STOMP 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Frame {
    pub(crate) fn new(command: &str) -> Self {
        Self {
            command: command.to_owned(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub(crate) fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_owned(), value.into()));
        self
    }

    pub(crate) fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 같은 키가 여러 번 나오면 첫 번째 값을 사용합니다.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn escapes_headers(&self) -> bool {
        self.command != "CONNECT" && self.command != "CONNECTED"
    }

    pub(crate) fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(64 + self.body.len());
        let escape = self.escapes_headers();

        out.put_slice(self.command.as_bytes());
        out.put_u8(b'\n');
        for (key, value) in &self.headers {
            if escape {
                out.put_slice(escape_header(key).as_bytes());
                out.put_u8(b':');
                out.put_slice(escape_header(value).as_bytes());
            } else {
                out.put_slice(key.as_bytes());
                out.put_u8(b':');
                out.put_slice(value.as_bytes());
            }
            out.put_u8(b'\n');
        }
        out.put_u8(b'\n');
        out.put_slice(&self.body);
        out.put_u8(0);
        out
    }

    /// 버퍼 앞부분에서 완성된 프레임 하나를 꺼냅니다.
    ///
    /// 데이터가 부족하면 `Ok(None)`이며 버퍼는 그대로입니다.
    pub(crate) fn decode(buf: &mut BytesMut) -> Result<Option<Self>, String> {
        // heart-beat EOL 건너뛰기
        while matches!(buf.first(), Some(b'\n' | b'\r')) {
            buf.advance(1);
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let mut lines = Vec::new();
        let mut pos = 0;
        let header_end = loop {
            let Some(offset) = buf[pos..].iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let mut line = &buf[pos..pos + offset];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            pos += offset + 1;
            if line.is_empty() {
                break pos;
            }
            lines.push(String::from_utf8_lossy(line).into_owned());
        };

        let mut lines = lines.into_iter();
        let command = lines.next().ok_or_else(|| "frame without command".to_owned())?;
        let escaped = command != "CONNECTED" && command != "CONNECT";

        let mut headers = Vec::new();
        for line in lines {
            let Some((key, value)) = line.split_once(':') else {
                return Err(format!("malformed header line: {line}"));
            };
            if escaped {
                headers.push((unescape_header(key), unescape_header(value)));
            } else {
                headers.push((key.to_owned(), value.to_owned()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| v.trim().parse::<usize>())
            .transpose()
            .map_err(|e| format!("invalid content-length: {e}"))?;

        let body_end = match content_length {
            Some(len) => {
                let end = header_end
                    .checked_add(len)
                    .filter(|&end| end < MAX_FRAME_SIZE)
                    .ok_or_else(|| format!("content-length {len} exceeds {MAX_FRAME_SIZE} bytes"))?;
                if buf.len() <= end {
                    return Ok(None);
                }
                if buf[end] != 0 {
                    return Err("frame body not terminated by NUL".to_owned());
                }
                end
            }
            None => match buf[header_end..].iter().position(|&b| b == 0) {
                Some(offset) => header_end + offset,
                None => return Ok(None),
            },
        };

        let mut frame = buf.split_to(body_end + 1);
        frame.truncate(body_end);
        let body = frame.split_off(header_end).freeze();

        Ok(Some(Self {
            command,
            headers,
            body,
        }))
    }
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// 스트림에서 프레임 하나를 읽습니다.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
    addr: &str,
) -> Result<Frame, SinkError> {
    loop {
        match Frame::decode(buf) {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => {}
            Err(reason) => {
                return Err(SinkError::Protocol {
                    addr: addr.to_owned(),
                    reason,
                });
            }
        }

        if buf.len() > MAX_FRAME_SIZE {
            return Err(SinkError::Protocol {
                addr: addr.to_owned(),
                reason: format!("frame exceeds {MAX_FRAME_SIZE} bytes"),
            });
        }

        let n = reader.read_buf(buf).await?;
        if n == 0 {
            return Err(SinkError::Protocol {
                addr: addr.to_owned(),
                reason: "connection closed by broker".to_owned(),
            });
        }
    }
}

/// STOMP 토픽 싱크
#[derive(Debug, Clone)]
pub struct StompSink {
    endpoint: String,
    host: String,
    login: String,
    passcode: String,
    template: MetricTemplate,
    timeout: Duration,
}

impl StompSink {
    /// 새 싱크를 생성합니다.
    pub fn new(config: &SenderConfig, template: MetricTemplate) -> Self {
        Self {
            endpoint: config.endpoint(),
            host: config.address.clone(),
            login: config.username.clone(),
            passcode: config.password.clone(),
            template,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// 대상 주소
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn rejected(&self, frame: &Frame) -> SinkError {
        let reason = frame
            .get("message")
            .map(str::to_owned)
            .unwrap_or_else(|| String::from_utf8_lossy(&frame.body).trim().to_owned());
        SinkError::Rejected {
            addr: self.endpoint.clone(),
            reason,
        }
    }

    fn unexpected(&self, expected: &str, frame: &Frame) -> SinkError {
        SinkError::Protocol {
            addr: self.endpoint.clone(),
            reason: format!("expected {expected}, got {}", frame.command),
        }
    }

    async fn publish(&self, destination: &str, payload: String) -> Result<(), SinkError> {
        let mut stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| SinkError::Connect {
                addr: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        let mut buf = BytesMut::with_capacity(4096);

        let connect = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", self.host.as_str())
            .header("login", self.login.as_str())
            .header("passcode", self.passcode.as_str())
            .header("heart-beat", "0,0");
        stream.write_all(&connect.encode()).await?;

        let reply = read_frame(&mut stream, &mut buf, &self.endpoint).await?;
        match reply.command.as_str() {
            "CONNECTED" => {}
            "ERROR" => return Err(self.rejected(&reply)),
            _ => return Err(self.unexpected("CONNECTED", &reply)),
        }

        let receipt = uuid::Uuid::new_v4().to_string();
        let body = Bytes::from(payload);
        let send = Frame::new("SEND")
            .header("destination", destination)
            .header("content-type", "text/plain;charset=utf-8")
            .header("content-length", body.len().to_string())
            .header("receipt", receipt.as_str())
            .body(body);
        stream.write_all(&send.encode()).await?;

        let reply = read_frame(&mut stream, &mut buf, &self.endpoint).await?;
        match reply.command.as_str() {
            "RECEIPT" if reply.get("receipt-id") == Some(receipt.as_str()) => {}
            "RECEIPT" => {
                return Err(SinkError::Protocol {
                    addr: self.endpoint.clone(),
                    reason: format!(
                        "receipt-id mismatch: expected {receipt}, got {}",
                        reply.get("receipt-id").unwrap_or("")
                    ),
                });
            }
            "ERROR" => return Err(self.rejected(&reply)),
            _ => return Err(self.unexpected("RECEIPT", &reply)),
        }

        // 이미 브로커가 수신을 확인했으므로 종료 과정의 실패는 전송 실패가 아님
        if let Err(e) = stream.write_all(&Frame::new("DISCONNECT").encode()).await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "disconnect frame not delivered");
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(endpoint = %self.endpoint, error = %e, "socket shutdown failed");
        }

        Ok(())
    }
}

impl MetricSink for StompSink {
    fn name(&self) -> &str {
        "queue"
    }

    async fn send(&self, record: &MetricRecord) -> Result<(), SinkError> {
        let destination = format!("{TOPIC_PREFIX}{}", record.name);
        let payload = self.template.render(record);
        tracing::debug!(
            endpoint = %self.endpoint,
            destination = %destination,
            payload = %payload,
            "publishing metric"
        );

        timeout(self.timeout, self.publish(&destination, payload))
            .await
            .map_err(|_| SinkError::Timeout {
                addr: self.endpoint.clone(),
                secs: self.timeout.as_secs(),
            })?
    }
}
