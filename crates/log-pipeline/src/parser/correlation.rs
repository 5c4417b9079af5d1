//! 시작/종료 이벤트 상관관계 파서
//!
//! `method:state:timestamp:key` 형식의 라인에서 같은 `(method, key)`의 시작 이벤트와
//! 종료 이벤트를 짝지어 소요 시간(종료 - 시작)을 메트릭으로 생성합니다.
//!
//! ```text
//! wyslijPlik:poczatek:1420070400:file-17
//! wyslijPlik:koniec:1420070412:file-17     -> value 12, timestamp 1420070412
//! ```
//!
//! 시작/종료 상태 값은 설정할 수 있으며 기본값은 `poczatek` / `koniec`입니다.
//!
//! # 상태
//! - 시작 이벤트는 `(method, key) -> 시작 타임스탬프`로 저장하며 같은 키가 다시 오면 덮어씀
//! - 종료 이벤트는 저장된 시작을 꺼내어 제거한 뒤 메트릭 하나를 생성
//! - 시작 없이 도착한 종료 이벤트는 아무것도 생성하지 않고 상태도 바꾸지 않음
//! - 상태는 프로세스 메모리에만 존재하며 재시작 시 사라짐
//! - 생성한 메트릭의 전송이 실패하면 [`rollback_last`](LineParser::rollback_last)로
//!   소비한 시작 이벤트를 되돌려, 종료 라인을 다시 읽을 때 같은 메트릭이 나오게 함
//!
//! # 만료
//! `max_age`가 0이 아니면 지금까지 관찰한 가장 큰 타임스탬프보다 `max_age` 이상
//! 오래된 시작 이벤트를 제거합니다. 기준 시각은 감소하지 않으므로, 미래 시각이
//! 잘못 기록된 라인 하나가 대기 중인 시작 이벤트를 모두 만료시킬 수 있습니다.

use std::collections::HashMap;

use tailmetric_core::metrics as m;
use tailmetric_core::pipeline::LineParser;
use tailmetric_core::types::MetricRecord;

use super::is_blank;

/// 기본 시작 이벤트 상태 값
pub const DEFAULT_START_MARKER: &str = "poczatek";

/// 기본 종료 이벤트 상태 값
pub const DEFAULT_END_MARKER: &str = "koniec";

const FIELD_COUNT: usize = 4;

/// 상관관계 파서
#[derive(Debug, Clone)]
pub struct CorrelationParser {
    metric_name: String,
    start_marker: String,
    end_marker: String,
    /// (method, key) -> 시작 타임스탬프
    pending: HashMap<(String, String), i64>,
    /// 직전 라인이 소비한 시작 이벤트
    last_consumed: Option<((String, String), i64)>,
    max_age: Option<i64>,
    latest_seen: Option<i64>,
    evicted: u64,
}

impl CorrelationParser {
    /// 새 파서를 생성합니다. 시작 이벤트 보존 기간 제한은 없습니다.
    pub fn new(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_owned(),
            start_marker: DEFAULT_START_MARKER.to_owned(),
            end_marker: DEFAULT_END_MARKER.to_owned(),
            pending: HashMap::new(),
            last_consumed: None,
            max_age: None,
            latest_seen: None,
            evicted: 0,
        }
    }

    /// 시작/종료 상태 값을 지정합니다.
    pub fn with_markers(mut self, start: &str, end: &str) -> Self {
        self.start_marker = start.to_owned();
        self.end_marker = end.to_owned();
        self
    }

    /// 시작 이벤트 최대 보존 기간을 설정합니다. 0이면 제한 없음.
    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = (max_age > 0).then(|| i64::try_from(max_age).unwrap_or(i64::MAX));
        self
    }

    /// 짝을 기다리는 시작 이벤트 수
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// 만료로 제거된 시작 이벤트 누적 수
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    fn observe(&mut self, timestamp: i64) {
        let latest = self.latest_seen.map_or(timestamp, |l| l.max(timestamp));
        self.latest_seen = Some(latest);

        let Some(max_age) = self.max_age else {
            return;
        };

        let before = self.pending.len();
        self.pending
            .retain(|_, start| latest.saturating_sub(*start) < max_age);
        let removed = (before - self.pending.len()) as u64;

        if removed > 0 {
            self.evicted += removed;
            metrics::counter!(m::CORRELATION_EVICTED_TOTAL).increment(removed);
            tracing::debug!(removed, latest, max_age, "evicted stale start events");
        }
    }
}

impl LineParser for CorrelationParser {
    fn format_name(&self) -> &str {
        "correlation"
    }

    fn parse_line(&mut self, line: &str) -> Option<MetricRecord> {
        self.last_consumed = None;

        if is_blank(line) {
            tracing::debug!("skipping blank line");
            return None;
        }

        let fields: Vec<&str> = line.trim().split(':').collect();
        if fields.len() != FIELD_COUNT {
            tracing::debug!(line, fields = fields.len(), "line does not match correlation layout");
            return None;
        }

        let (method, state, raw_timestamp, key) = (fields[0], fields[1], fields[2], fields[3]);
        if method.is_empty() || key.is_empty() {
            tracing::debug!(line, "missing method or correlation key");
            return None;
        }

        let timestamp = match raw_timestamp.trim().parse::<i64>() {
            Ok(ts) => ts,
            Err(e) => {
                tracing::debug!(line, error = %e, "unparseable event timestamp");
                return None;
            }
        };

        let pair = (method.to_owned(), key.to_owned());

        if state == self.start_marker {
            self.pending.insert(pair, timestamp);
            self.observe(timestamp);
            return None;
        }

        if state != self.end_marker {
            tracing::debug!(line, state, "unknown event state");
            return None;
        }

        let start = self.pending.remove(&pair);
        self.observe(timestamp);

        let Some(start) = start else {
            tracing::debug!(method, key, "end event without matching start");
            return None;
        };

        let duration = timestamp.saturating_sub(start);
        tracing::debug!(method, key, start, end = timestamp, duration, "paired events");
        self.last_consumed = Some((pair, start));
        Some(MetricRecord::new(&self.metric_name, duration as f64, timestamp))
    }

    fn rollback_last(&mut self) {
        if let Some((pair, start)) = self.last_consumed.take() {
            tracing::debug!(method = %pair.0, key = %pair.1, start, "restoring start event after failed send");
            self.pending.insert(pair, start);
        }
    }
}
