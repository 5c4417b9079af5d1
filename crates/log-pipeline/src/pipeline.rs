//! 사이클 오케스트레이션 -- 선택/읽기/파싱/전송/커밋의 전체 흐름을 관리합니다.
//!
//! [`TailPipeline`]은 한 번의 [`run_cycle`](TailPipeline::run_cycle) 호출마다
//! 후보 파일을 고르고, 워터마크 이후의 라인을 읽어 파싱한 뒤 메트릭을 전송하고
//! 위치를 커밋합니다.
//!
//! # 사이클 흐름
//! ```text
//! Idle -> Selecting -> Reading -> Sending <-> Committing -> Idle
//!            |            |          |            |
//!        FileSelector  Reader   LineParser    PositionStore
//!                                + MetricSink
//! ```
//!
//! # 커밋 규칙
//! - 전송에 성공한 라인마다 즉시 `(파일, 라인)`을 커밋
//! - 파일의 라인을 모두 소비하면 마지막으로 읽은 라인으로 한 번 더 커밋
//! - 전송이 한 번이라도 실패하면 그 파일의 이후 커밋을 모두 건너뜀
//!   (워터마크는 실패한 라인 직전에 머물고 다음 사이클에서 그 라인부터 재시도)
//!
//! `run_cycle`은 `&mut self`를 요구하므로 같은 파이프라인에서 두 사이클이 겹칠 수 없습니다.

use std::path::Path;
use std::time::Instant;

use tailmetric_core::metrics as m;
use tailmetric_core::pipeline::{LineParser, MetricSink};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::parser::AnyLineParser;
use crate::position::{PositionRecord, PositionStore};
use crate::reader::IncrementalReader;
use crate::selector::{Candidate, FileSelector};
use crate::sink::{MetricSender, MetricTemplate};

/// 사이클 진행 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleState {
    /// 사이클 대기 중
    #[default]
    Idle,
    /// 후보 파일 선택 중
    Selecting,
    /// 파일 읽기 중
    Reading,
    /// 파싱 및 전송 중
    Sending,
    /// 위치 커밋 중
    Committing,
}

impl CycleState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Reading => "reading",
            Self::Sending => "sending",
            Self::Committing => "committing",
        }
    }
}

/// 한 사이클의 처리 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 선택된 후보 파일 수
    pub candidates: usize,
    /// 읽은 라인 수
    pub lines_read: u64,
    /// 파싱으로 생성된 메트릭 수
    pub metrics_parsed: u64,
    /// 전송에 성공한 메트릭 수
    pub metrics_sent: u64,
    /// 전송에 실패한 메트릭 수
    pub send_failures: u64,
    /// 읽지 못한 파일 수
    pub read_failures: u64,
    /// 저장에 실패한 커밋 수
    pub commit_failures: u64,
    /// 끝까지 커밋된 파일 수
    pub files_completed: usize,
    /// 전송 실패로 워터마크가 멈춘 파일 수
    pub files_stalled: usize,
    /// 후보 선택 자체가 실패했는지 여부
    pub select_failed: bool,
}

impl CycleReport {
    /// 이번 사이클에서 아무 라인도 처리하지 않았는지 확인합니다.
    pub fn is_noop(&self) -> bool {
        self.candidates == 0 && self.lines_read == 0
    }
}

/// 로그 테일링 파이프라인
///
/// 위치 저장소와 상관관계 상태를 단독 소유합니다.
///
/// # 사용 예시
/// ```ignore
/// use tailmetric_log_pipeline::{PipelineConfig, TailPipelineBuilder};
///
/// let mut pipeline = TailPipelineBuilder::new()
///     .config(config)
///     .sink_from_config()
///     .build()
///     .await?;
///
/// let report = pipeline.run_cycle().await;
/// ```
pub struct TailPipeline<S: MetricSink> {
    config: PipelineConfig,
    selector: FileSelector,
    reader: IncrementalReader,
    parser: AnyLineParser,
    sink: S,
    position: PositionStore,
    state: CycleState,
    cycles: u64,
}

impl<S: MetricSink> TailPipeline<S> {
    /// 현재 사이클 상태
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// 현재 위치 레코드
    pub fn position(&self) -> &PositionRecord {
        self.position.record()
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 싱크
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 실행된 사이클 수
    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    /// 짝을 기다리는 상관관계 시작 이벤트 수
    pub fn pending_correlations(&self) -> usize {
        self.parser.pending_count()
    }

    /// 사이클 하나를 실행합니다.
    ///
    /// 복구 가능한 모든 실패는 로그와 [`CycleReport`]로만 보고되며 에러를 반환하지 않습니다.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();
        self.cycles += 1;

        self.state = CycleState::Selecting;
        let candidates = match self.selector.select(self.position.record(), &self.reader).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(selector = self.selector.kind(), error = %e, "candidate selection failed");
                report.select_failed = true;
                Vec::new()
            }
        };
        report.candidates = candidates.len();
        metrics::gauge!(m::CANDIDATE_FILES).set(candidates.len() as f64);

        for candidate in &candidates {
            self.process_file(candidate, &mut report).await;
        }

        self.state = CycleState::Idle;

        let elapsed = started.elapsed();
        metrics::counter!(m::CYCLES_TOTAL).increment(1);
        metrics::histogram!(m::CYCLE_DURATION_SECONDS).record(elapsed.as_secs_f64());
        metrics::gauge!(m::CORRELATION_PENDING).set(self.parser.pending_count() as f64);

        if report.is_noop() {
            tracing::debug!(cycle = self.cycles, "no new lines");
        } else {
            tracing::info!(
                cycle = self.cycles,
                candidates = report.candidates,
                lines_read = report.lines_read,
                metrics_sent = report.metrics_sent,
                send_failures = report.send_failures,
                read_failures = report.read_failures,
                duration_ms = elapsed.as_millis() as u64,
                "cycle completed"
            );
        }

        report
    }

    async fn process_file(&mut self, candidate: &Candidate, report: &mut CycleReport) {
        let path = candidate.path.as_path();

        self.state = CycleState::Reading;
        let end = self
            .reader
            .window_end(candidate.watermark, candidate.total_lines);
        let lines = match self
            .reader
            .read_range(path, candidate.watermark + 1, end)
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file for this cycle");
                report.read_failures += 1;
                metrics::counter!(m::READ_FAILURES_TOTAL).increment(1);
                return;
            }
        };

        report.lines_read += lines.len() as u64;
        metrics::counter!(m::LINES_READ_TOTAL).increment(lines.len() as u64);
        tracing::debug!(
            path = %path.display(),
            from = candidate.watermark + 1,
            count = lines.len(),
            "reading new lines"
        );

        let format = self.parser.format_name().to_owned();
        let mut stalled_at: Option<u64> = None;

        for line in &lines {
            self.state = CycleState::Sending;
            let Some(record) = self.parser.parse_line(&line.text) else {
                continue;
            };
            report.metrics_parsed += 1;
            metrics::counter!(m::METRICS_PARSED_TOTAL, m::LABEL_PARSER_FORMAT => format.clone())
                .increment(1);

            match self.sink.send(&record).await {
                Ok(()) => {
                    report.metrics_sent += 1;
                    metrics::counter!(
                        m::SENDS_TOTAL,
                        m::LABEL_SINK => self.sink.name().to_owned(),
                        m::LABEL_RESULT => "success"
                    )
                    .increment(1);

                    if stalled_at.is_none() {
                        self.commit(path, line.number, report).await;
                    }
                }
                Err(e) => {
                    report.send_failures += 1;
                    metrics::counter!(
                        m::SENDS_TOTAL,
                        m::LABEL_SINK => self.sink.name().to_owned(),
                        m::LABEL_RESULT => "failure"
                    )
                    .increment(1);
                    tracing::warn!(
                        path = %path.display(),
                        line = line.number,
                        sink = self.sink.name(),
                        metric = %record,
                        error = %e,
                        "metric send failed"
                    );
                    // 같은 라인을 다시 읽을 때 같은 레코드가 나오도록 파서 상태 복구
                    self.parser.rollback_last();
                    if stalled_at.is_none() {
                        stalled_at = Some(line.number);
                    }
                }
            }
        }

        match (stalled_at, lines.last()) {
            (Some(failed), _) => {
                report.files_stalled += 1;
                tracing::warn!(
                    path = %path.display(),
                    watermark = self.position.record().last_line,
                    retry_from = failed,
                    "watermark held before failed send"
                );
            }
            (None, Some(last)) => {
                self.commit(path, last.number, report).await;
                report.files_completed += 1;
            }
            (None, None) => {}
        }
    }

    async fn commit(&mut self, path: &Path, line: u64, report: &mut CycleReport) {
        self.state = CycleState::Committing;
        match self.position.commit(path, line).await {
            Ok(true) => {
                metrics::counter!(m::POSITION_COMMITS_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                metrics::gauge!(m::WATERMARK_LINE).set(self.position.record().last_line as f64);
            }
            Ok(false) => {}
            Err(e) => {
                report.commit_failures += 1;
                metrics::counter!(m::POSITION_COMMITS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                tracing::error!(path = %path.display(), line, error = %e, "position commit failed");
            }
        }
        self.state = CycleState::Sending;
    }
}

/// 파이프라인 빌더
///
/// 싱크 타입은 [`sink`](TailPipelineBuilder::sink)로 바꿀 수 있으며,
/// 기본값은 설정에서 만드는 [`MetricSender`]입니다.
pub struct TailPipelineBuilder<S = MetricSender> {
    config: PipelineConfig,
    sink: Option<S>,
}

impl TailPipelineBuilder<MetricSender> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            sink: None,
        }
    }

    /// 현재 설정의 `[sender]` 값으로 싱크를 생성합니다.
    pub fn sink_from_config(mut self) -> Self {
        let template = MetricTemplate::new(self.config.metric_template.as_str());
        self.sink = Some(MetricSender::from_config(&self.config.sender, template));
        self
    }
}

impl Default for TailPipelineBuilder<MetricSender> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MetricSink> TailPipelineBuilder<S> {
    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 싱크를 지정합니다.
    pub fn sink<T: MetricSink>(self, sink: T) -> TailPipelineBuilder<T> {
        TailPipelineBuilder {
            config: self.config,
            sink: Some(sink),
        }
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 위치 파일을 열거나 기본값으로 만들 수 없으면 에러입니다.
    pub async fn build(self) -> Result<TailPipeline<S>, LogPipelineError> {
        self.config.validate()?;

        let sink = self.sink.ok_or_else(|| LogPipelineError::Config {
            field: "sink".to_owned(),
            reason: "no metric sink configured".to_owned(),
        })?;

        let parser = AnyLineParser::from_config(&self.config)?;
        let selector = FileSelector::from_config(&self.config);
        let reader = IncrementalReader::new(self.config.line_cap());
        let position = PositionStore::open(&self.config.index_path).await?;

        tracing::info!(
            selector = selector.kind(),
            parser = parser.format_name(),
            sink = sink.name(),
            dir = %self.config.file_dir.display(),
            pattern = %self.config.file_pattern,
            "tail pipeline ready"
        );

        Ok(TailPipeline {
            config: self.config,
            selector,
            reader,
            parser,
            sink,
            position,
            state: CycleState::Idle,
            cycles: 0,
        })
    }
}
